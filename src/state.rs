//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::origin::OriginChecker;
use crate::repository::ApiRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ApiRepository>,
    pub model: Arc<ResolvedModel>,
    pub origins: Arc<OriginChecker>,
}

impl AppState {
    pub fn new(repo: Arc<dyn ApiRepository>, model: ResolvedModel) -> Self {
        let origins = OriginChecker::new(model.allowed_origins.clone());
        AppState {
            repo,
            model: Arc::new(model),
            origins: Arc::new(origins),
        }
    }
}
