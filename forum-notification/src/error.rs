use uuid::Uuid;

use forum_shared::errors::{AppError, ErrorCode};

use crate::models::NotificationKind;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("invalid notification: {0}")]
    Validation(String),

    /// Creating a notification failed; nothing was persisted.
    #[error("adds notification [type={kind}] failed")]
    Write {
        kind: NotificationKind,
        #[source]
        source: StoreError,
    },

    /// Flipping a notification to read failed.
    #[error("makes notification [id={id}] read failed")]
    Update {
        id: Uuid,
        #[source]
        source: StoreError,
    },

    /// Looking up the notifications to mark read failed.
    #[error("finds unread notifications failed")]
    Query {
        #[source]
        source: StoreError,
    },
}

pub type NotificationResult<T> = Result<T, NotificationError>;

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        let cause = std::error::Error::source(&err)
            .map(|e| e.to_string())
            .unwrap_or_default();

        match err {
            NotificationError::Validation(msg) => AppError::Validation(msg),
            NotificationError::Write { .. } => {
                tracing::error!(error = %err, cause = %cause, "notification write failed");
                AppError::new(ErrorCode::NotificationWriteFailed, err.to_string())
            }
            NotificationError::Update { source: StoreError::NotFound(id), .. } => AppError::new(
                ErrorCode::NotificationNotFound,
                format!("notification {id} not found"),
            ),
            NotificationError::Update { .. } | NotificationError::Query { .. } => {
                tracing::error!(error = %err, cause = %cause, "notification update failed");
                AppError::new(ErrorCode::NotificationUpdateFailed, err.to_string())
            }
        }
    }
}
