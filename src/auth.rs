use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::error::ApiError;
use crate::router::AppState;

/// Proof that the request carried the admin bearer token.
/// Add it as a handler argument to restrict the route to admins.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = bearer_token(header).ok_or(ApiError::Unauthorized)?;

        if tokens_match(token, &state.config.auth.admin_token) {
            Ok(AdminUser)
        } else {
            warn!(path = %parts.uri.path(), "Rejected request with invalid admin token");
            Err(ApiError::Forbidden)
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// Compares every byte so the time taken does not depend on where a mismatch is.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
