//! Transient status messages.
//!
//! At most one notification is visible. Showing a new one replaces the old
//! one together with its dismissal deadline.

use std::time::{Duration, Instant};

/// How long a notification stays visible.
pub const NOTIFICATION_WINDOW: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone)]
struct Shown {
    seq: u64,
    notification: Notification,
    dismiss_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    current: Option<Shown>,
    next_seq: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `text`, replacing whatever was visible. Returns a sequence number
    /// that `clear_if` can later use to target exactly this notification.
    pub fn show(&mut self, text: impl Into<String>, kind: NotificationKind, now: Instant) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.current = Some(Shown {
            seq,
            notification: Notification {
                text: text.into(),
                kind,
            },
            dismiss_at: now + NOTIFICATION_WINDOW,
        });
        seq
    }

    pub fn current(&self, now: Instant) -> Option<&Notification> {
        self.current
            .as_ref()
            .filter(|shown| now < shown.dismiss_at)
            .map(|shown| &shown.notification)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|shown| shown.dismiss_at)
    }

    pub fn tick(&mut self, now: Instant) {
        if self.next_deadline().is_some_and(|at| at <= now) {
            self.current = None;
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Clear only if notification `seq` is still the one showing.
    pub fn clear_if(&mut self, seq: u64) {
        if self.current.as_ref().is_some_and(|shown| shown.seq == seq) {
            self.current = None;
        }
    }
}
