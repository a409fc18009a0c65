//! Origin allow-list: requests pass when their `Origin` header or their peer
//! address is listed. Same-origin requests (Origin equal to Host) always pass.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

#[derive(Clone, Debug, Default)]
pub struct OriginChecker {
    allowed: Vec<String>,
}

/// `https://Example.org/` -> `Example.org`
fn strip_origin(raw: &str) -> &str {
    let rest = ["https://", "http://"]
        .iter()
        .find_map(|scheme| {
            raw.get(..scheme.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
                .map(|_| &raw[scheme.len()..])
        })
        .unwrap_or(raw);
    rest.trim_matches('/')
}

fn without_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:3000
        return host
            .split_once(']')
            .map(|(h, _)| h.trim_start_matches('['))
            .unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((h, port)) if !h.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

impl OriginChecker {
    pub fn new(allowed: Vec<String>) -> Self {
        OriginChecker { allowed }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    fn is_allowed(&self, candidate: &str) -> bool {
        self.allowed.iter().any(|a| a == candidate)
    }

    /// True when the `Origin` header (scheme and slashes stripped) is allowed, with or without its port.
    pub fn check_origin_header(&self, headers: &HeaderMap) -> bool {
        let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let origin = strip_origin(origin);
        !origin.is_empty() && (self.is_allowed(origin) || self.is_allowed(without_port(origin)))
    }

    pub fn check_remote_ip(&self, remote: Option<SocketAddr>) -> bool {
        remote
            .map(|addr| self.is_allowed(&addr.ip().to_string()))
            .unwrap_or(false)
    }

    fn is_same_origin(headers: &HeaderMap) -> bool {
        let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
        let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
        match (origin, host) {
            (Some(o), Some(h)) => {
                let o = without_port(strip_origin(o));
                !o.is_empty() && o.eq_ignore_ascii_case(without_port(h.trim()))
            }
            _ => false,
        }
    }

    pub fn check_request(&self, headers: &HeaderMap, remote: Option<SocketAddr>) -> Result<(), AppError> {
        if self.check_origin_header(headers) || self.check_remote_ip(remote) || Self::is_same_origin(headers) {
            return Ok(());
        }
        tracing::warn!(
            origin = ?headers.get(header::ORIGIN),
            remote = ?remote,
            "origin rejected"
        );
        Err(AppError::Forbidden("Origin not allowed.".into()))
    }
}

/// Middleware guarding every entity route.
pub async fn check_origin(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.origins.check_request(req.headers(), remote)?;
    Ok(next.run(req).await)
}
