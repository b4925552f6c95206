use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `forum.{domain}.{action}`
/// Example: `forum.notification.reply`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Account events
    pub const NOTIFY_INVITECODE_USED: &str = "forum.notification.invitecode_used";
    pub const NOTIFY_FOLLOWING_USER: &str = "forum.notification.following_user";

    // Point ledger events
    pub const NOTIFY_POINT_CHARGE: &str = "forum.notification.point_charge";
    pub const NOTIFY_ABUSE_POINT_DEDUCT: &str = "forum.notification.abuse_point_deduct";
    pub const NOTIFY_POINT_EXCHANGE: &str = "forum.notification.point_exchange";
    pub const NOTIFY_POINT_TRANSFER: &str = "forum.notification.point_transfer";
    pub const NOTIFY_POINT_ARTICLE_REWARD: &str = "forum.notification.point_article_reward";
    pub const NOTIFY_POINT_ARTICLE_THANK: &str = "forum.notification.point_article_thank";
    pub const NOTIFY_POINT_COMMENT_THANK: &str = "forum.notification.point_comment_thank";

    // Content events
    pub const NOTIFY_BROADCAST: &str = "forum.notification.broadcast";
    pub const NOTIFY_ARTICLE: &str = "forum.notification.article";
    pub const NOTIFY_COMMENT: &str = "forum.notification.comment";
    pub const NOTIFY_AT: &str = "forum.notification.at";
    pub const NOTIFY_COMMENTED: &str = "forum.notification.commented";
    pub const NOTIFY_REPLY: &str = "forum.notification.reply";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    /// Recipient and referenced object of a notification-producing event.
    /// `data_id` is the article, comment, transfer record or invite code the
    /// event is about; events without one send an empty string or omit it.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct NotificationTarget {
        pub user_id: String,
        #[serde(default)]
        pub data_id: String,
    }
}
