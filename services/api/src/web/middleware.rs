//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes. Authentication happens upstream;
//! this layer only requires the caller's user id to be present and well formed.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::debug;
use uuid::Uuid;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, available to handlers as `Extension<UserId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Middleware that reads the `x-user-id` header and inserts the caller id.
///
/// If valid, inserts the user id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    // 1. Extract the header
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse the user id
    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| {
        debug!("Rejected malformed {} header", USER_ID_HEADER);
        StatusCode::UNAUTHORIZED
    })?;

    // 3. Insert it into request extensions and continue to the handler
    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
