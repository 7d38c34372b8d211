use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::config::hash_admin_key;
use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Visible characters of the admin key kept for the activity log.
const KEY_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct AdminContext {
    /// Leading characters of the presented key, never the full key.
    pub key_prefix: String,
}

/// Authenticate the admin from a bearer token.
///
/// Compares hashes in constant time so the configured key can't be probed
/// byte by byte.
fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminContext, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let presented = hash_admin_key(token);
    let expected = state.config.admin_key_hash.as_bytes();
    if !bool::from(presented.as_bytes().ct_eq(expected)) {
        tracing::debug!("admin authentication failed");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(AdminContext {
        key_prefix: token.chars().take(KEY_PREFIX_LEN).collect(),
    })
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ctx = authenticate_admin(&state, request.headers())?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
