mod license;
mod reset_request;
mod validate;

pub use license::*;
pub use reset_request::*;
pub use validate::*;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::rate_limit;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    maintenance: bool,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let settings = queries::get_settings(state.store.as_ref())?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        maintenance: settings.maintenance_mode,
    }))
}

/// Public routes, without rate limiting.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/validate", get(validate))
        .route("/api/register", get(register))
        .route("/api/license-info", get(license_info))
        .route("/api/request-hwid-reset", post(request_hwid_reset))
}

/// Public routes with per-IP rate limits. Requires the server to be started
/// with `into_make_service_with_connect_info`.
pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .layer(rate_limit::relaxed_layer(rate_limit.relaxed_rpm))
        .merge(api_routes().layer(rate_limit::standard_layer(rate_limit.standard_rpm)))
}
