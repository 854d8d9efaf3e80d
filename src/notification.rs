//! User-visible notices
//!
//! Recoverable failures (open errors, mode conflicts, missing recent files)
//! end up here instead of propagating. The UI drains the queue and shows
//! each message however it likes.

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Error)
    }
}

/// Pending notices, oldest first.
#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => info!("Notice: {}", notification.message),
            NotificationLevel::Warning | NotificationLevel::Error => {
                warn!("Notice: {}", notification.message)
            }
        }
        self.notifications.push(notification);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.show(Notification::info(message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.show(Notification::warning(message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(Notification::error(message));
    }

    /// Take every pending notice, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}
