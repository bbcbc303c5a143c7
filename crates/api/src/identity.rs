//! Caller identity extractor.
//!
//! Authentication happens upstream: the gateway verifies the caller and
//! injects the identity as the `x-user-id` header. Handlers that take a
//! [`CallerIdentity`] reject requests where the header is missing.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// Header carrying the verified caller identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The already-authenticated caller.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| CallerIdentity {
                user_id: value.to_string(),
            })
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header"))
            })
    }
}
