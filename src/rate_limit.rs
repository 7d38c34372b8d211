//! Per-IP rate limiting for the public endpoints.
//!
//! License keys carry 64 random bits, so the limits exist to keep a
//! misbehaving client from hammering the store, not to stop key guessing.
//!
//! Tiers:
//! - Standard: /api/validate, /api/register, /api/license-info, /api/request-hwid-reset
//! - Relaxed: /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_STANDARD_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer allowing `requests_per_minute` per client IP.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let rpm = requests_per_minute.max(1);
    let period_secs = (60 / rpm as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs))
        .burst_size(rpm)
        .finish()
        .expect("non-zero period and burst always build");

    GovernorLayer::new(Arc::new(config))
}

/// Validation, registration and reset requests: each one touches the store.
pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Health checks.
pub fn relaxed_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
