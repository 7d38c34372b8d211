mod activity;
mod bans;
mod licenses;
mod requests;
mod settings;

pub use activity::*;
pub use bans::*;
pub use licenses::*;
pub use requests::*;
pub use settings::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Licenses
        .route("/admin/licenses", get(list_licenses).post(create_license))
        .route("/admin/licenses/bulk", post(bulk_create_licenses))
        .route("/admin/licenses/{key}", get(get_license).delete(delete_license))
        .route("/admin/licenses/{key}/reset-hwid", post(reset_license_hwid))
        // Reset requests
        .route("/admin/hwid-requests", get(list_hwid_requests))
        .route("/admin/hwid-requests/{id}/approve", post(approve_hwid_request))
        .route("/admin/hwid-requests/{id}/deny", post(deny_hwid_request))
        // Ban list
        .route("/admin/bans", get(list_bans).post(ban_hwid))
        .route("/admin/bans/{hwid}", axum::routing::delete(unban_hwid))
        // Settings and dashboard
        .route("/admin/settings", get(get_settings).put(update_settings))
        .route("/admin/activity", get(list_activity))
        .route("/admin/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
