//! Path parameters with JSON rejections.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// Same as `Path<T>`, but an undecodable segment (e.g. invalid UTF-8) is an `AppError`.
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "unusable path");
                if rejection.status().is_server_error() {
                    Err(AppError::Internal(rejection.body_text()))
                } else {
                    Err(AppError::BadRequest(rejection.body_text()))
                }
            }
        }
    }
}
