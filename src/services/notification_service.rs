use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{Notification, NotificationKind, NotificationQuery};

/// Notifications kept per user before the oldest ones are dropped
const MAX_NOTIFICATIONS_PER_USER: usize = 200;

/// In-memory notification inbox.
///
/// Delivery is simulated: with a non-zero delay the notification lands in the
/// inbox from a spawned task once the delay has elapsed.
#[derive(Debug, Clone)]
pub struct NotificationService {
    inboxes: Arc<RwLock<HashMap<Uuid, Vec<Notification>>>>,
    delivery_delay: Duration,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl NotificationService {
    pub fn new(delivery_delay: Duration) -> Self {
        Self {
            inboxes: Arc::new(RwLock::new(HashMap::new())),
            delivery_delay,
        }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            data,
            created_at: Utc::now(),
            read_at: None,
        };

        tracing::info!(
            notification_id = %notification.id,
            user_id = %user_id,
            kind = ?kind,
            "queued notification"
        );

        if self.delivery_delay.is_zero() {
            self.deliver(notification.clone()).await;
        } else {
            let service = self.clone();
            let pending = notification.clone();
            tokio::spawn(async move {
                tokio::time::sleep(service.delivery_delay).await;
                service.deliver(pending).await;
            });
        }

        notification
    }

    async fn deliver(&self, notification: Notification) {
        let mut inboxes = self.inboxes.write().await;
        let inbox = inboxes.entry(notification.user_id).or_default();
        inbox.push(notification);

        if inbox.len() > MAX_NOTIFICATIONS_PER_USER {
            let overflow = inbox.len() - MAX_NOTIFICATIONS_PER_USER;
            inbox.drain(..overflow);
        }
    }

    /// Newest first
    pub async fn list(&self, user_id: Uuid, query: &NotificationQuery) -> Vec<Notification> {
        let inboxes = self.inboxes.read().await;
        let Some(inbox) = inboxes.get(&user_id) else {
            return Vec::new();
        };

        inbox
            .iter()
            .rev()
            .filter(|n| !query.unread_only || !n.is_read())
            .take(query.limit.unwrap_or(50).min(MAX_NOTIFICATIONS_PER_USER))
            .cloned()
            .collect()
    }

    pub async fn unread_count(&self, user_id: Uuid) -> usize {
        let inboxes = self.inboxes.read().await;
        inboxes
            .get(&user_id)
            .map(|inbox| inbox.iter().filter(|n| !n.is_read()).count())
            .unwrap_or(0)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        let mut inboxes = self.inboxes.write().await;
        let notification = inboxes
            .get_mut(&user_id)
            .and_then(|inbox| inbox.iter_mut().find(|n| n.id == notification_id))
            .ok_or(AppError::NotFound("Notification"))?;

        if notification.read_at.is_none() {
            notification.read_at = Some(Utc::now());
        }

        Ok(notification.clone())
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_read(&self, user_id: Uuid) -> usize {
        let mut inboxes = self.inboxes.write().await;
        let now = Utc::now();

        let Some(inbox) = inboxes.get_mut(&user_id) else {
            return 0;
        };

        let mut changed = 0;
        for notification in inbox.iter_mut().filter(|n| n.read_at.is_none()) {
            notification.read_at = Some(now);
            changed += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_notify_and_list_newest_first() {
        let service = NotificationService::default();
        let user_id = Uuid::new_v4();

        service
            .notify(user_id, NotificationKind::WorkoutAssigned, "First", "one", None)
            .await;
        service
            .notify(user_id, NotificationKind::WorkoutCompleted, "Second", "two", None)
            .await;

        let listed = service.list(user_id, &NotificationQuery::default()).await;
        let titles: Vec<_> = listed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
        assert_eq!(service.unread_count(user_id).await, 2);
    }

    #[tokio::test]
    async fn test_inboxes_are_per_user() {
        let service = NotificationService::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        service
            .notify(alice, NotificationKind::ReviewReceived, "Review", "5 stars", None)
            .await;

        assert!(service.list(bob, &NotificationQuery::default()).await.is_empty());
        assert_eq!(service.unread_count(bob).await, 0);
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_filter() {
        let service = NotificationService::default();
        let user_id = Uuid::new_v4();

        let first = service
            .notify(user_id, NotificationKind::QuoteReceived, "Quote", "new quote", None)
            .await;
        service
            .notify(user_id, NotificationKind::QuoteReceived, "Quote", "another", None)
            .await;

        let read = service.mark_read(user_id, first.id).await.unwrap();
        assert!(read.is_read());

        let unread = service
            .list(user_id, &NotificationQuery { unread_only: true, limit: None })
            .await;
        assert_eq!(unread.len(), 1);
        assert_ne!(unread[0].id, first.id);

        assert_eq!(service.mark_all_read(user_id).await, 1);
        assert_eq!(service.unread_count(user_id).await, 0);
    }

    #[tokio::test]
    async fn test_mark_read_other_users_notification_is_not_found() {
        let service = NotificationService::default();
        let owner = Uuid::new_v4();

        let notification = service
            .notify(owner, NotificationKind::StudentLinked, "Linked", "hi", None)
            .await;

        let result = service.mark_read(Uuid::new_v4(), notification.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delayed_delivery() {
        let service = NotificationService::new(Duration::from_millis(20));
        let user_id = Uuid::new_v4();

        service
            .notify(user_id, NotificationKind::AppointmentRequested, "Booking", "new", None)
            .await;
        assert_eq!(service.unread_count(user_id).await, 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.unread_count(user_id).await, 1);
    }

    #[tokio::test]
    async fn test_inbox_is_capped() {
        let service = NotificationService::default();
        let user_id = Uuid::new_v4();

        for i in 0..(MAX_NOTIFICATIONS_PER_USER + 5) {
            service
                .notify(user_id, NotificationKind::WorkoutAssigned, format!("n{i}"), "", None)
                .await;
        }

        assert_eq!(service.unread_count(user_id).await, MAX_NOTIFICATIONS_PER_USER);
        let newest = service.list(user_id, &NotificationQuery { unread_only: false, limit: Some(1) }).await;
        assert_eq!(newest[0].title, format!("n{}", MAX_NOTIFICATIONS_PER_USER + 4));
    }
}
