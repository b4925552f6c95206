use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::{Filter, NotificationStore, StoreError, StoreResult};
use crate::models::{NewNotification, Notification};

/// In-process notification storage. Records live for the lifetime of the
/// process and are kept in insertion order.
#[derive(Default)]
pub struct MemoryNotificationStore {
    records: Mutex<Vec<Notification>>,
    #[cfg(test)]
    faults: Mutex<Faults>,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    fail_writes: bool,
    fail_updates: std::collections::HashSet<Uuid>,
    fail_queries: bool,
    writes: usize,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> StoreResult<MutexGuard<'_, Vec<Notification>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("notification map lock poisoned".into()))
    }
}

#[cfg(test)]
impl MemoryNotificationStore {
    pub fn fail_writes(&self) {
        self.faults.lock().unwrap().fail_writes = true;
    }

    pub fn fail_update_of(&self, id: Uuid) {
        self.faults.lock().unwrap().fail_updates.insert(id);
    }

    pub fn fail_queries(&self) {
        self.faults.lock().unwrap().fail_queries = true;
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Number of successful `add` and `update` calls so far.
    pub fn write_count(&self) -> usize {
        self.faults.lock().unwrap().writes
    }

    fn check_write(&self) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap();
        if faults.fail_writes {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        faults.writes += 1;
        Ok(())
    }

    fn check_update(&self, id: Uuid) -> StoreResult<()> {
        if self.faults.lock().unwrap().fail_updates.contains(&id) {
            return Err(StoreError::Unavailable(format!("injected update failure for {id}")));
        }
        self.check_write()
    }

    fn check_query(&self) -> StoreResult<()> {
        if self.faults.lock().unwrap().fail_queries {
            return Err(StoreError::Unavailable("injected query failure".into()));
        }
        Ok(())
    }
}

impl NotificationStore for MemoryNotificationStore {
    fn get(&self, id: Uuid) -> StoreResult<Notification> {
        self.records()?
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn add(&self, notification: &NewNotification) -> StoreResult<Notification> {
        #[cfg(test)]
        self.check_write()?;

        let record = Notification {
            id: Uuid::now_v7(),
            user_id: notification.user_id().to_string(),
            data_id: notification.data_id().to_string(),
            data_type: notification.data_type(),
            has_read: notification.has_read(),
            created_at: Utc::now(),
        };

        self.records()?.push(record.clone());
        Ok(record)
    }

    fn update(&self, id: Uuid, notification: &Notification) -> StoreResult<()> {
        #[cfg(test)]
        self.check_update(id)?;

        let mut records = self.records()?;
        let stored = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        stored.has_read = notification.has_read;
        Ok(())
    }

    fn query(&self, filter: &Filter) -> StoreResult<Vec<Notification>> {
        #[cfg(test)]
        self.check_query()?;

        let records = self.records()?;
        let mut matched = Vec::new();
        for record in records.iter() {
            if filter.matches(record)? {
                matched.push(record.clone());
            }
        }
        Ok(matched)
    }

    fn ping(&self) -> StoreResult<()> {
        self.records().map(|_| ())
    }
}
