use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Headroom over `max_upload_bytes` for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the axum router with all VicShield endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handler::health))
        .route("/files/upload", post(handler::upload_file))
        .route("/files/:hash", get(handler::get_file))
        .route("/contracts", get(handler::list_contracts))
        .route("/contracts/:hash", get(handler::get_contract))
        .route("/contracts/:hash/sign", post(handler::sign_contract))
        .route("/users/kyc", patch(handler::submit_kyc))
        .route("/users/:identity", get(handler::get_user))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
