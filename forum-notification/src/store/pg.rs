use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use uuid::Uuid;

use forum_shared::clients::db::{DbConnection, DbPool};

use super::{mismatch, Field, Filter, NotificationStore, StoreError, StoreResult, Value};
use crate::models::{NewNotification, Notification};
use crate::schema::notifications;

type Condition = Box<dyn BoxableExpression<notifications::table, Pg, SqlType = Bool>>;

/// Notification storage on PostgreSQL through a diesel r2d2 pool.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<DbConnection> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            StoreError::Pool(e.to_string())
        })
    }
}

impl NotificationStore for PgNotificationStore {
    fn get(&self, id: Uuid) -> StoreResult<Notification> {
        let mut conn = self.conn()?;

        notifications::table
            .find(id)
            .select(Notification::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    fn add(&self, notification: &NewNotification) -> StoreResult<Notification> {
        let mut conn = self.conn()?;

        let created = diesel::insert_into(notifications::table)
            .values(notification)
            .returning(Notification::as_returning())
            .get_result(&mut conn)?;

        Ok(created)
    }

    fn update(&self, id: Uuid, notification: &Notification) -> StoreResult<()> {
        let mut conn = self.conn()?;

        let updated = diesel::update(notifications::table.find(id))
            .set(notifications::has_read.eq(notification.has_read))
            .execute(&mut conn)?;

        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn query(&self, filter: &Filter) -> StoreResult<Vec<Notification>> {
        let condition = condition(filter)?;
        let mut conn = self.conn()?;

        let rows = notifications::table
            .filter(condition)
            .select(Notification::as_select())
            .load(&mut conn)?;

        Ok(rows)
    }

    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

fn condition(filter: &Filter) -> StoreResult<Condition> {
    match filter {
        Filter::Eq(field, value) => eq_condition(*field, value),
        Filter::In(field, values) => in_condition(*field, values),
        Filter::And(filters) => {
            let mut conditions = filters.iter().map(condition);
            let first = match conditions.next() {
                Some(first) => first?,
                None => return Ok(Box::new(sql::<Bool>("TRUE"))),
            };
            conditions.try_fold(first, |acc, next| Ok(Box::new(acc.and(next?)) as Condition))
        }
    }
}

fn eq_condition(field: Field, value: &Value) -> StoreResult<Condition> {
    let condition: Condition = match (field, value) {
        (Field::UserId, Value::Text(v)) => Box::new(notifications::user_id.eq(v.clone())),
        (Field::DataId, Value::Text(v)) => Box::new(notifications::data_id.eq(v.clone())),
        (Field::DataType, Value::Int(v)) => Box::new(notifications::data_type.eq(*v)),
        (Field::HasRead, Value::Bool(v)) => Box::new(notifications::has_read.eq(*v)),
        (field, value) => return Err(mismatch(field, value)),
    };
    Ok(condition)
}

fn in_condition(field: Field, values: &[Value]) -> StoreResult<Condition> {
    let condition: Condition = match field {
        Field::UserId => Box::new(notifications::user_id.eq_any(texts(field, values)?)),
        Field::DataId => Box::new(notifications::data_id.eq_any(texts(field, values)?)),
        Field::DataType => {
            let codes = values
                .iter()
                .map(|v| match v {
                    Value::Int(code) => Ok(*code),
                    other => Err(mismatch(field, other)),
                })
                .collect::<StoreResult<Vec<i32>>>()?;
            Box::new(notifications::data_type.eq_any(codes))
        }
        Field::HasRead => {
            let flags = values
                .iter()
                .map(|v| match v {
                    Value::Bool(flag) => Ok(*flag),
                    other => Err(mismatch(field, other)),
                })
                .collect::<StoreResult<Vec<bool>>>()?;
            Box::new(notifications::has_read.eq_any(flags))
        }
    };
    Ok(condition)
}

fn texts(field: Field, values: &[Value]) -> StoreResult<Vec<String>> {
    values
        .iter()
        .map(|v| match v {
            Value::Text(text) => Ok(text.clone()),
            other => Err(mismatch(field, other)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    fn sql_for(filter: &Filter) -> String {
        let condition = condition(filter).unwrap();
        debug_query::<Pg, _>(&notifications::table.filter(condition).select(notifications::id)).to_string()
    }

    #[test]
    fn unread_by_type_filter_is_pushed_into_sql() {
        let filter = Filter::And(vec![Filter::user_id("u1"), Filter::unread(), Filter::data_type(13)]);
        let sql = sql_for(&filter);

        assert!(sql.contains("\"notifications\".\"user_id\" = $1"), "{sql}");
        assert!(sql.contains("\"notifications\".\"has_read\" = $2"), "{sql}");
        assert!(sql.contains("\"notifications\".\"data_type\" = $3"), "{sql}");
    }

    #[test]
    fn membership_uses_any() {
        let sql = sql_for(&Filter::data_id_in(["article-1", "comment-1"]));
        assert!(sql.contains("\"notifications\".\"data_id\" = ANY($1)"), "{sql}");
    }

    #[test]
    fn mismatched_membership_values_are_rejected() {
        let filter = Filter::In(Field::DataType, vec![Value::Text("13".into())]);
        assert!(matches!(condition(&filter), Err(StoreError::InvalidFilter(_))));
    }
}
