use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forum_shared::errors::{AppError, AppResult, ErrorCode};
use forum_shared::middleware::AdminUser;
use forum_shared::types::api::ApiResponse;
use forum_shared::types::auth::AuthUser;

use crate::models::{Notification, NotificationKind};
use crate::services::notification_service::MarkReadSummary;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    #[serde(default)]
    pub data_id: String,
    pub data_type: NotificationKind,
}

/// POST /notifications
/// Create a notification by hand (broadcasts, point adjustments). Admin only.
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CreateNotificationRequest>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = state
        .service
        .create_notification(&body.user_id, &body.data_id, body.data_type)?;

    tracing::info!(
        admin_id = %admin.id,
        notification_id = %notification.id,
        "notification created by admin"
    );

    Ok(Json(ApiResponse::ok(notification)))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = state.service.count_unread(&auth_user.id)?;

    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadByTypeRequest {
    pub data_type: NotificationKind,
}

/// POST /notifications/read/type
/// Mark every unread notification of one kind read for the authenticated user.
pub async fn mark_read_by_type(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(body): Json<MarkReadByTypeRequest>,
) -> AppResult<Json<ApiResponse<MarkReadSummary>>> {
    let summary = state.service.mark_read_by_type(&auth_user.id, body.data_type)?;

    Ok(Json(ApiResponse::ok(summary)))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadByArticleRequest {
    pub article_id: String,
    #[serde(default)]
    pub comment_ids: Vec<String>,
}

/// POST /notifications/read/article
/// Mark read the authenticated user's notifications about an article and its comments.
pub async fn mark_read_by_article(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(body): Json<MarkReadByArticleRequest>,
) -> AppResult<Json<ApiResponse<MarkReadSummary>>> {
    if body.article_id.trim().is_empty() {
        return Err(AppError::bad_request("article_id is required"));
    }

    let summary = state
        .service
        .mark_read_by_article(&auth_user.id, &body.article_id, &body.comment_ids)?;

    Ok(Json(ApiResponse::ok(summary)))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub changed: bool,
}

/// POST /notifications/:id/read
/// Mark a single notification read (only if it belongs to the user).
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MarkReadResponse>>> {
    let notification = state.service.find(id)?;
    if notification.user_id != auth_user.id {
        return Err(AppError::new(
            ErrorCode::NotificationNotFound,
            format!("notification {id} not found"),
        ));
    }

    let changed = state.service.mark_read(&notification)?;
    let response = MarkReadResponse { changed };

    if changed {
        Ok(Json(ApiResponse::ok(response)))
    } else {
        Ok(Json(ApiResponse::ok_with_message(response, "notification already read")))
    }
}
