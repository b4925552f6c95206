use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::notifications;

/// The event that produced a notification. The integer code is what the
/// `data_type` column stores, so existing codes must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Article,
    Comment,
    At,
    Commented,
    FollowingUser,
    PointCharge,
    PointTransfer,
    PointArticleReward,
    PointCommentThank,
    Broadcast,
    PointExchange,
    AbusePointDeduct,
    PointArticleThank,
    Reply,
    InvitecodeUsed,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 15] = [
        Self::Article,
        Self::Comment,
        Self::At,
        Self::Commented,
        Self::FollowingUser,
        Self::PointCharge,
        Self::PointTransfer,
        Self::PointArticleReward,
        Self::PointCommentThank,
        Self::Broadcast,
        Self::PointExchange,
        Self::AbusePointDeduct,
        Self::PointArticleThank,
        Self::Reply,
        Self::InvitecodeUsed,
    ];

    pub fn code(&self) -> i32 {
        match self {
            Self::Article => 0,
            Self::Comment => 1,
            Self::At => 2,
            Self::Commented => 3,
            Self::FollowingUser => 4,
            Self::PointCharge => 5,
            Self::PointTransfer => 6,
            Self::PointArticleReward => 7,
            Self::PointCommentThank => 8,
            Self::Broadcast => 9,
            Self::PointExchange => 10,
            Self::AbusePointDeduct => 11,
            Self::PointArticleThank => 12,
            Self::Reply => 13,
            Self::InvitecodeUsed => 14,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Comment => "comment",
            Self::At => "at",
            Self::Commented => "commented",
            Self::FollowingUser => "following_user",
            Self::PointCharge => "point_charge",
            Self::PointTransfer => "point_transfer",
            Self::PointArticleReward => "point_article_reward",
            Self::PointCommentThank => "point_comment_thank",
            Self::Broadcast => "broadcast",
            Self::PointExchange => "point_exchange",
            Self::AbusePointDeduct => "abuse_point_deduct",
            Self::PointArticleThank => "point_article_thank",
            Self::Reply => "reply",
            Self::InvitecodeUsed => "invitecode_used",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub data_id: String,
    pub data_type: i32,
    pub has_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// `None` for codes written by a newer deployment that this build does not know.
    pub fn kind(&self) -> Option<NotificationKind> {
        NotificationKind::from_code(self.data_type)
    }
}

/// A validated, not yet persisted notification. Always unread.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    user_id: String,
    data_id: String,
    data_type: i32,
    has_read: bool,
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        data_id: impl Into<String>,
        kind: NotificationKind,
    ) -> Result<Self, String> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err("notification recipient user_id is required".to_string());
        }

        Ok(Self {
            user_id,
            data_id: data_id.into(),
            data_type: kind.code(),
            has_read: false,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    pub fn data_type(&self) -> i32 {
        self.data_type
    }

    pub fn has_read(&self) -> bool {
        self.has_read
    }
}
