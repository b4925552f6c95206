pub mod health;
pub mod notifications;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/notifications", post(notifications::create_notification))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read/type", post(notifications::mark_read_by_type))
        .route("/notifications/read/article", post(notifications::mark_read_by_article))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
