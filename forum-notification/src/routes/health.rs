use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use forum_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = match state.service.ping() {
        Ok(()) => HealthCheck {
            name: "store".into(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => HealthCheck {
            name: "store".into(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };

    Json(
        HealthResponse::healthy("forum-notification", env!("CARGO_PKG_VERSION"))
            .with_checks(vec![store]),
    )
}
