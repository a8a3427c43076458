//! Debounced user notifications
//!
//! Rapid profile changes would otherwise stack balloons on top of each other.
//! [`NotificationDebouncer`] keeps a single pending slot: every `queue` call
//! overwrites it and pushes the deadline out again, and only the last payload
//! in a burst is ever shown.

use std::time::{Duration, Instant};
use tracing::debug;

/// Reference debounce delay
pub const DEFAULT_NOTIFICATION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Info)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Warning)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Error)
    }
}

/// Where due notifications end up
pub trait NotificationSink {
    /// When false, due notifications are dropped instead of shown
    fn notifications_enabled(&self) -> bool;
    fn show(&mut self, notification: &Notification);
}

#[derive(Debug)]
struct Pending {
    notification: Notification,
    deadline: Instant,
}

/// Last-write-wins buffer with a cancellable deadline
#[derive(Debug)]
pub struct NotificationDebouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl NotificationDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace whatever is pending and restart the delay from `now`
    pub fn queue(&mut self, notification: Notification, now: Instant) {
        if let Some(ref superseded) = self.pending {
            debug!("Superseding pending notification '{}'", superseded.notification.title);
        }
        self.pending = Some(Pending {
            notification,
            deadline: now + self.delay,
        });
    }

    /// Timer callback. Once the deadline has passed the slot is emptied, and
    /// the payload is shown if the sink allows it. Returns true if something
    /// was shown.
    pub fn tick(&mut self, now: Instant, sink: &mut dyn NotificationSink) -> bool {
        let due = matches!(self.pending, Some(ref p) if p.deadline <= now);
        if !due {
            return false;
        }

        let Some(Pending { notification, .. }) = self.pending.take() else {
            return false;
        };

        if sink.notifications_enabled() {
            sink.show(&notification);
            true
        } else {
            debug!("Notifications disabled, dropping '{}'", notification.title);
            false
        }
    }

    /// When the timer should next fire
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn pending(&self) -> Option<&Notification> {
        self.pending.as_ref().map(|p| &p.notification)
    }

    /// Stop the timer and discard the pending payload
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl Default for NotificationDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_nothing_before_deadline() {
        let start = Instant::now();
        let mut debouncer = NotificationDebouncer::default();
        let mut sink = RecordingSink::enabled();

        debouncer.queue(Notification::info("Profile Changed", "one"), start);
        assert!(!debouncer.tick(start + ms(499), &mut sink));
        assert!(sink.shown.is_empty());
        assert!(debouncer.pending().is_some());

        assert!(debouncer.tick(start + ms(500), &mut sink));
        assert_eq!(sink.shown.len(), 1);
        assert!(debouncer.pending().is_none());
    }

    #[test]
    fn test_burst_emits_only_last() {
        let start = Instant::now();
        let mut debouncer = NotificationDebouncer::new(ms(500));
        let mut sink = RecordingSink::enabled();

        debouncer.queue(Notification::info("A", "first"), start);
        debouncer.queue(Notification::info("B", "second"), start + ms(200));
        debouncer.queue(Notification::error("C", "third"), start + ms(400));

        // The first deadline has passed but the restarts pushed it out
        assert!(!debouncer.tick(start + ms(600), &mut sink));
        assert_eq!(debouncer.next_deadline(), Some(start + ms(900)));

        assert!(debouncer.tick(start + ms(900), &mut sink));
        assert!(!debouncer.tick(start + ms(2000), &mut sink));
        assert_eq!(sink.shown, vec![Notification::error("C", "third")]);
    }

    #[test]
    fn test_disabled_sink_still_clears_slot() {
        let start = Instant::now();
        let mut debouncer = NotificationDebouncer::default();
        let mut sink = RecordingSink::disabled();

        debouncer.queue(Notification::info("Profile Changed", "hidden"), start);
        assert!(!debouncer.tick(start + ms(500), &mut sink));
        assert!(sink.shown.is_empty());
        assert!(debouncer.pending().is_none());
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_cancel_discards_pending() {
        let start = Instant::now();
        let mut debouncer = NotificationDebouncer::default();
        let mut sink = RecordingSink::enabled();

        debouncer.queue(Notification::info("Profile Changed", "gone"), start);
        debouncer.cancel();
        assert!(!debouncer.tick(start + ms(1000), &mut sink));
        assert!(sink.shown.is_empty());
    }

    #[test]
    fn test_tick_without_pending_is_noop() {
        let mut debouncer = NotificationDebouncer::default();
        let mut sink = RecordingSink::enabled();
        assert!(!debouncer.tick(Instant::now(), &mut sink));
    }
}
