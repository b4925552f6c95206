use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NotificationError, NotificationResult};
use crate::models::{NewNotification, Notification, NotificationKind};
use crate::store::{Filter, NotificationStore, StoreResult};

/// What a batch read-marking does when one record cannot be updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailurePolicy {
    /// Log the failure and keep marking the remaining records.
    #[default]
    Continue,
    /// Stop at the first failure and return it.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkReadSummary {
    pub matched: usize,
    pub marked: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    policy: BatchFailurePolicy,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, policy: BatchFailurePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> BatchFailurePolicy {
        self.policy
    }

    pub fn ping(&self) -> StoreResult<()> {
        self.store.ping()
    }

    /// Record that an event of `kind` concerning `data_id` happened for `user_id`.
    /// Identical calls create distinct notifications.
    pub fn create_notification(
        &self,
        user_id: &str,
        data_id: &str,
        kind: NotificationKind,
    ) -> NotificationResult<Notification> {
        let new_notification =
            NewNotification::new(user_id, data_id, kind).map_err(NotificationError::Validation)?;

        let notification = self
            .store
            .add(&new_notification)
            .map_err(|source| NotificationError::Write { kind, source })?;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %user_id,
            kind = %kind,
            "notification created"
        );

        Ok(notification)
    }

    pub fn find(&self, id: Uuid) -> NotificationResult<Notification> {
        self.store
            .get(id)
            .map_err(|source| NotificationError::Update { id, source })
    }

    pub fn count_unread(&self, user_id: &str) -> NotificationResult<usize> {
        let filter = Filter::And(vec![Filter::user_id(user_id), Filter::unread()]);
        self.store
            .query(&filter)
            .map(|found| found.len())
            .map_err(|source| NotificationError::Query { source })
    }

    /// Mark one notification read. Returns `false` without touching the store
    /// when `notification` is already read.
    ///
    /// Failures are returned unlogged; whoever handles the error logs it.
    pub fn mark_read(&self, notification: &Notification) -> NotificationResult<bool> {
        if notification.has_read {
            return Ok(false);
        }

        let id = notification.id;
        let update = || -> StoreResult<()> {
            let mut record = self.store.get(id)?;
            record.has_read = true;
            self.store.update(id, &record)
        };

        update().map_err(|source| NotificationError::Update { id, source })?;

        tracing::debug!(
            notification_id = %id,
            user_id = %notification.user_id,
            kind = ?notification.kind(),
            "notification marked read"
        );
        Ok(true)
    }

    /// Mark read every unread notification of `kind` addressed to `user_id`.
    pub fn mark_read_by_type(
        &self,
        user_id: &str,
        kind: NotificationKind,
    ) -> NotificationResult<MarkReadSummary> {
        let filter = Filter::And(vec![
            Filter::user_id(user_id),
            Filter::unread(),
            Filter::data_type(kind.code()),
        ]);

        let summary = self.mark_matching_read(&filter)?;
        tracing::info!(
            user_id = %user_id,
            kind = %kind,
            matched = summary.matched,
            marked = summary.marked,
            failed = summary.failed,
            "marked notifications read by type"
        );
        Ok(summary)
    }

    /// Mark read every unread notification of `user_id` that references the
    /// article or any of the listed comments.
    pub fn mark_read_by_article(
        &self,
        user_id: &str,
        article_id: &str,
        comment_ids: &[String],
    ) -> NotificationResult<MarkReadSummary> {
        let data_ids: BTreeSet<&str> = comment_ids
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(article_id))
            .collect();

        let filter = Filter::And(vec![
            Filter::user_id(user_id),
            Filter::unread(),
            Filter::data_id_in(data_ids),
        ]);

        let summary = self.mark_matching_read(&filter)?;
        tracing::info!(
            user_id = %user_id,
            article_id = %article_id,
            comments = comment_ids.len(),
            matched = summary.matched,
            marked = summary.marked,
            failed = summary.failed,
            "marked notifications read by article"
        );
        Ok(summary)
    }

    fn mark_matching_read(&self, filter: &Filter) -> NotificationResult<MarkReadSummary> {
        let notifications = self
            .store
            .query(filter)
            .map_err(|source| NotificationError::Query { source })?;

        let mut summary = MarkReadSummary {
            matched: notifications.len(),
            ..Default::default()
        };

        for notification in &notifications {
            match self.mark_read(notification) {
                Ok(true) => summary.marked += 1,
                Ok(false) => {}
                Err(e) => match self.policy {
                    BatchFailurePolicy::Continue => {
                        summary.failed += 1;
                        tracing::warn!(
                            error = %e,
                            notification_id = %notification.id,
                            "skipping notification that could not be marked read"
                        );
                    }
                    BatchFailurePolicy::Abort => return Err(e),
                },
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryNotificationStore, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts WARN and ERROR events.
    #[derive(Clone, Default)]
    struct FailureEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for FailureEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn failure_events<R>(f: impl FnOnce() -> R) -> (R, usize) {
        let counter = FailureEvents::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, counter.0.load(Ordering::SeqCst))
    }

    fn setup(policy: BatchFailurePolicy) -> (Arc<MemoryNotificationStore>, NotificationService) {
        let store = Arc::new(MemoryNotificationStore::new());
        let service = NotificationService::new(store.clone(), policy);
        (store, service)
    }

    fn unread_for(store: &MemoryNotificationStore, user_id: &str) -> Vec<Notification> {
        store
            .query(&Filter::And(vec![Filter::user_id(user_id), Filter::unread()]))
            .unwrap()
    }

    #[test]
    fn create_preserves_fields_and_starts_unread() {
        let (store, service) = setup(BatchFailurePolicy::Continue);

        for kind in NotificationKind::ALL {
            let created = service.create_notification("u1", "data-1", kind).unwrap();
            let stored = store.get(created.id).unwrap();

            assert!(!stored.has_read);
            assert_eq!(stored.user_id, "u1");
            assert_eq!(stored.data_id, "data-1");
            assert_eq!(stored.kind(), Some(kind));
        }
    }

    #[test]
    fn identical_creates_are_not_deduplicated() {
        let (store, service) = setup(BatchFailurePolicy::Continue);

        let first = service.create_notification("u1", "article-1", NotificationKind::At).unwrap();
        let second = service.create_notification("u1", "article-1", NotificationKind::At).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn create_rejects_blank_recipient() {
        let (store, service) = setup(BatchFailurePolicy::Continue);

        let err = service.create_notification(" ", "x", NotificationKind::Reply).unwrap_err();

        assert!(matches!(err, NotificationError::Validation(_)));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn create_failure_is_a_write_error() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        store.fail_writes();

        let err = service
            .create_notification("u1", "code-1", NotificationKind::InvitecodeUsed)
            .unwrap_err();

        assert!(matches!(
            err,
            NotificationError::Write { kind: NotificationKind::InvitecodeUsed, .. }
        ));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn marking_unread_flips_only_the_flag() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let created = service.create_notification("u1", "comment-1", NotificationKind::Reply).unwrap();

        assert!(service.mark_read(&created).unwrap());

        let stored = store.get(created.id).unwrap();
        assert_eq!(stored, Notification { has_read: true, ..created });
    }

    #[test]
    fn marking_already_read_is_a_no_op_without_writes() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let created = service.create_notification("u1", "comment-1", NotificationKind::Reply).unwrap();
        service.mark_read(&created).unwrap();
        let read = store.get(created.id).unwrap();
        let writes = store.write_count();

        assert!(!service.mark_read(&read).unwrap());
        assert_eq!(store.write_count(), writes);
        assert_eq!(store.get(created.id).unwrap(), read);
    }

    #[test]
    fn marking_stale_copy_does_not_revert_anything() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let stale = service.create_notification("u1", "comment-1", NotificationKind::Reply).unwrap();
        service.mark_read(&stale).unwrap();

        // A second caller still holding the unread copy.
        assert!(service.mark_read(&stale).unwrap());
        assert!(store.get(stale.id).unwrap().has_read);
    }

    #[test]
    fn single_mark_surfaces_update_error() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let created = service.create_notification("u1", "comment-1", NotificationKind::Reply).unwrap();
        store.fail_update_of(created.id);

        let err = service.mark_read(&created).unwrap_err();

        assert!(matches!(err, NotificationError::Update { id, .. } if id == created.id));
        assert!(!store.get(created.id).unwrap().has_read);
    }

    #[test]
    fn single_mark_of_missing_record_is_update_not_found() {
        let (_, service) = setup(BatchFailurePolicy::Continue);
        let other = Arc::new(MemoryNotificationStore::new());
        let ghost = NotificationService::new(other, BatchFailurePolicy::Continue)
            .create_notification("u1", "a", NotificationKind::At)
            .unwrap();

        let err = service.mark_read(&ghost).unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Update { source: StoreError::NotFound(_), .. }
        ));
    }

    #[test]
    fn batch_by_type_touches_only_that_user_and_type() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        for user in ["u1", "u2"] {
            service.create_notification(user, "c1", NotificationKind::Commented).unwrap();
            service.create_notification(user, "c2", NotificationKind::Commented).unwrap();
            service.create_notification(user, "a1", NotificationKind::At).unwrap();
        }

        let summary = service.mark_read_by_type("u1", NotificationKind::Commented).unwrap();

        assert_eq!(summary, MarkReadSummary { matched: 2, marked: 2, failed: 0 });
        let u1_unread = unread_for(&store, "u1");
        assert_eq!(u1_unread.len(), 1);
        assert_eq!(u1_unread[0].kind(), Some(NotificationKind::At));
        assert_eq!(unread_for(&store, "u2").len(), 3);
    }

    #[test]
    fn batch_by_article_matches_article_and_listed_comments() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        for data_id in ["article-1", "comment-1", "comment-2", "comment-3"] {
            service.create_notification("u1", data_id, NotificationKind::Commented).unwrap();
        }
        service.create_notification("u2", "comment-1", NotificationKind::Reply).unwrap();

        let summary = service
            .mark_read_by_article("u1", "article-1", &["comment-1".into(), "comment-2".into()])
            .unwrap();

        assert_eq!(summary.marked, 3);
        let remaining = unread_for(&store, "u1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].data_id, "comment-3");
        assert_eq!(unread_for(&store, "u2").len(), 1);
    }

    #[test]
    fn batch_by_article_with_no_comments_still_matches_article() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        service.create_notification("u1", "article-1", NotificationKind::At).unwrap();

        let summary = service.mark_read_by_article("u1", "article-1", &[]).unwrap();

        assert_eq!(summary.marked, 1);
        assert!(unread_for(&store, "u1").is_empty());
    }

    #[test]
    fn batch_marking_is_idempotent() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        service.create_notification("u1", "c1", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "c2", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "article-1", NotificationKind::Commented).unwrap();

        service.mark_read_by_type("u1", NotificationKind::Reply).unwrap();
        let after_once = store.query(&Filter::user_id("u1")).unwrap();
        let again = service.mark_read_by_type("u1", NotificationKind::Reply).unwrap();
        assert_eq!(again, MarkReadSummary::default());
        assert_eq!(store.query(&Filter::user_id("u1")).unwrap(), after_once);

        service.mark_read_by_article("u1", "article-1", &[]).unwrap();
        let after_once = store.query(&Filter::user_id("u1")).unwrap();
        service.mark_read_by_article("u1", "article-1", &[]).unwrap();
        assert_eq!(store.query(&Filter::user_id("u1")).unwrap(), after_once);
    }

    #[test]
    fn continue_policy_marks_the_rest_after_a_failure() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let first = service.create_notification("u1", "c1", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "c2", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "c3", NotificationKind::Reply).unwrap();
        store.fail_update_of(first.id);

        let summary = service.mark_read_by_type("u1", NotificationKind::Reply).unwrap();

        assert_eq!(summary, MarkReadSummary { matched: 3, marked: 2, failed: 1 });
        let remaining = unread_for(&store, "u1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);
    }

    #[test]
    fn skipped_record_is_logged_once() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        let first = service.create_notification("u1", "c1", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "c2", NotificationKind::Reply).unwrap();
        store.fail_update_of(first.id);

        let (summary, logged) = failure_events(|| service.mark_read_by_type("u1", NotificationKind::Reply));

        assert_eq!(summary.unwrap().failed, 1);
        assert_eq!(logged, 1);
    }

    #[test]
    fn returned_failures_are_left_to_the_caller_to_log() {
        let (store, service) = setup(BatchFailurePolicy::Abort);
        let first = service.create_notification("u1", "c1", NotificationKind::Reply).unwrap();
        store.fail_update_of(first.id);

        let (single, single_logged) = failure_events(|| service.mark_read(&first));
        let (batch, batch_logged) = failure_events(|| service.mark_read_by_type("u1", NotificationKind::Reply));
        store.fail_writes();
        let (create, create_logged) =
            failure_events(|| service.create_notification("u1", "c2", NotificationKind::Reply));

        assert!(single.is_err() && batch.is_err() && create.is_err());
        assert_eq!((single_logged, batch_logged, create_logged), (0, 0, 0));
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let (store, service) = setup(BatchFailurePolicy::Abort);
        let first = service.create_notification("u1", "c1", NotificationKind::Reply).unwrap();
        service.create_notification("u1", "c2", NotificationKind::Reply).unwrap();
        store.fail_update_of(first.id);

        let err = service.mark_read_by_type("u1", NotificationKind::Reply).unwrap_err();

        assert!(matches!(err, NotificationError::Update { id, .. } if id == first.id));
        // Records are visited in creation order, so the second one was never reached.
        assert_eq!(unread_for(&store, "u1").len(), 2);
    }

    #[test]
    fn query_failure_is_reported() {
        let (store, service) = setup(BatchFailurePolicy::Continue);
        store.fail_queries();

        let err = service.mark_read_by_type("u1", NotificationKind::Reply).unwrap_err();
        assert!(matches!(err, NotificationError::Query { .. }));
    }

    #[test]
    fn unread_count_ignores_read_and_other_users() {
        let (_, service) = setup(BatchFailurePolicy::Continue);
        let read = service.create_notification("u1", "a", NotificationKind::At).unwrap();
        service.create_notification("u1", "b", NotificationKind::At).unwrap();
        service.create_notification("u2", "c", NotificationKind::At).unwrap();
        service.mark_read(&read).unwrap();

        assert_eq!(service.count_unread("u1").unwrap(), 1);
    }
}
