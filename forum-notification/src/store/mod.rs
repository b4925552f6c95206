//! Persistence collaborator for notifications.
//!
//! The service only talks to [`NotificationStore`]; PostgreSQL backs it in
//! production and [`MemoryNotificationStore`] in local development and tests.

use uuid::Uuid;

use crate::models::{NewNotification, Notification};

mod memory;
mod pg;

pub use memory::MemoryNotificationStore;
pub use pg::PgNotificationStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("notification {0} not found")]
    NotFound(Uuid),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    UserId,
    DataId,
    DataType,
    HasRead,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::UserId => "user_id",
            Field::DataId => "data_id",
            Field::DataType => "data_type",
            Field::HasRead => "has_read",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i32),
    Bool(bool),
}

/// Query filter over named notification fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(Field, Value),
    In(Field, Vec<Value>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn user_id(user_id: &str) -> Self {
        Filter::Eq(Field::UserId, Value::Text(user_id.to_string()))
    }

    pub fn unread() -> Self {
        Filter::Eq(Field::HasRead, Value::Bool(false))
    }

    pub fn data_type(code: i32) -> Self {
        Filter::Eq(Field::DataType, Value::Int(code))
    }

    pub fn data_id_in<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::In(
            Field::DataId,
            ids.into_iter().map(|id| Value::Text(id.into())).collect(),
        )
    }

    /// Evaluate the filter against a loaded record.
    pub fn matches(&self, notification: &Notification) -> StoreResult<bool> {
        match self {
            Filter::Eq(field, value) => field_equals(notification, *field, value),
            Filter::In(field, values) => {
                for value in values {
                    if field_equals(notification, *field, value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::And(filters) => {
                for filter in filters {
                    if !filter.matches(notification)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn field_equals(notification: &Notification, field: Field, value: &Value) -> StoreResult<bool> {
    match (field, value) {
        (Field::UserId, Value::Text(v)) => Ok(notification.user_id == *v),
        (Field::DataId, Value::Text(v)) => Ok(notification.data_id == *v),
        (Field::DataType, Value::Int(v)) => Ok(notification.data_type == *v),
        (Field::HasRead, Value::Bool(v)) => Ok(notification.has_read == *v),
        (field, value) => Err(mismatch(field, value)),
    }
}

pub(crate) fn mismatch(field: Field, value: &Value) -> StoreError {
    StoreError::InvalidFilter(format!("{} cannot be compared with {value:?}", field.name()))
}

/// Storage operations the notification service depends on. Each call is a
/// single atomic operation against the backing store.
pub trait NotificationStore: Send + Sync {
    fn get(&self, id: Uuid) -> StoreResult<Notification>;

    /// Persist a new record; the store assigns `id` and `created_at`.
    fn add(&self, notification: &NewNotification) -> StoreResult<Notification>;

    /// Write back the mutable state of `notification` (its read flag).
    fn update(&self, id: Uuid, notification: &Notification) -> StoreResult<()>;

    fn query(&self, filter: &Filter) -> StoreResult<Vec<Notification>>;

    /// Cheap liveness probe for health checks.
    fn ping(&self) -> StoreResult<()>;
}
