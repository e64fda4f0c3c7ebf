use crate::ids::NotificationId;
use std::time::Duration;
use tokio::time::Instant;

/// Default display duration of a notification
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(4000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// A transient user-facing message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub expires_at: Instant,
}

/// Ordered, self-expiring list of notifications.
///
/// Uses `tokio::time::Instant` so expiry follows the paused clock in tests.
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    entries: Vec<Notification>,
    ttl: Duration,
}

impl NotificationQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Vec::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) -> NotificationId {
        self.push_at(message, severity, Instant::now())
    }

    pub fn push_at(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        now: Instant,
    ) -> NotificationId {
        let id = NotificationId::generate();
        let message = message.into();
        tracing::debug!("Notification ({:?}): {}", severity, message);
        self.entries.push(Notification {
            id: id.clone(),
            message,
            severity,
            expires_at: now + self.ttl,
        });
        id
    }

    /// Remove a notification before it expires
    pub fn dismiss(&mut self, id: &NotificationId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| &n.id != id);
        self.entries.len() != before
    }

    /// Drop every notification whose display time has passed
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|n| n.expires_at > now);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.entries.last()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut queue = NotificationQueue::default();
        queue.push("first", Severity::Info);
        queue.push("second", Severity::Success);

        let messages: Vec<&str> = queue.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(queue.latest().unwrap().severity, Severity::Success);
    }

    #[test]
    fn test_expire_after_ttl() {
        let mut queue = NotificationQueue::new(Duration::from_secs(4));
        let start = Instant::now();
        queue.push_at("old", Severity::Info, start);
        queue.push_at("new", Severity::Info, start + Duration::from_secs(2));

        assert_eq!(queue.expire(start + Duration::from_millis(3999)), 0);
        assert_eq!(queue.expire(start + Duration::from_secs(4)), 1);
        assert_eq!(queue.latest().unwrap().message, "new");
        assert_eq!(queue.expire(start + Duration::from_secs(6)), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dismiss() {
        let mut queue = NotificationQueue::default();
        let id = queue.push("bye", Severity::Error);

        assert!(queue.dismiss(&id));
        assert!(!queue.dismiss(&id));
        assert!(queue.is_empty());
    }
}
