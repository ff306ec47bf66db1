pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_user;
use rest::{
    delete_artifact_handler, generate_handler, get_artifact_handler, list_active_handler,
    list_artifacts_handler, publish_artifact_handler, update_artifact_handler,
};
use state::AppState;

/// Builds the artifact routes. Every route requires the caller's user id.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{kind}/generate-ai", post(generate_handler))
        .route(
            "/{kind}/{id}",
            get(get_artifact_handler)
                .put(update_artifact_handler)
                .delete(delete_artifact_handler),
        )
        .route("/{kind}/{id}/publish", put(publish_artifact_handler))
        .route("/{kind}/classroom/{classroom_id}", get(list_artifacts_handler))
        .route(
            "/{kind}/active/classroom/{classroom_id}",
            get(list_active_handler),
        )
        .layer(axum_middleware::from_fn(require_user))
        .with_state(state)
}
