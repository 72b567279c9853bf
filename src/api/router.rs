//! Intake API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::intake::IntakeService;

/// Build the intake API router.
pub fn intake_router(intake: Arc<IntakeService>) -> Router {
    build_router(ApiContext::new(intake))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/sessions/:id/start", post(endpoints::sessions::start))
        .route("/sessions/:id/photos", post(endpoints::sessions::upload_photo))
        .route("/sessions/:id/skip", post(endpoints::sessions::skip))
        .route("/sessions/:id/cancel", post(endpoints::sessions::cancel))
        .with_state(ctx);

    Router::new().nest("/api", api)
}
