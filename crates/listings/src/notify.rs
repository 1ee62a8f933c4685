//! User-facing notifications raised by the listing view.
//!
//! Rendering belongs to the front end: a toast library, a dialog, or a log
//! line. The view only says what happened and how loudly.

/// How a notification is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Transient confirmation.
    Success,
    /// Transient warning; the user can correct and retry.
    Warning,
    /// Blocking alert the user must dismiss.
    Alert,
}

/// Notifications the listing view can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A product was created.
    Added,
    /// A delete was requested.
    Deleted,
    /// Submit was attempted with no category chosen.
    CategoryNotSelected,
    /// More images were picked than a product can hold.
    TooManyImages,
}

impl Notification {
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Added | Self::Deleted => Level::Success,
            Self::CategoryNotSelected => Level::Warning,
            Self::TooManyImages => Level::Alert,
        }
    }

    /// Text shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Deleted => "Deleted",
            Self::CategoryNotSelected => "Please select an category option",
            Self::TooManyImages => "You can only upload a maximum of 3 images.",
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Receives notifications from the view.
///
/// Called synchronously from view operations; implementations should return
/// quickly and hand slow work to a task.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log, one level per severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message();
        match notification.level() {
            Level::Success => tracing::info!(notification = %message, "Notification"),
            Level::Warning => tracing::warn!(notification = %message, "Notification"),
            Level::Alert => tracing::error!(notification = %message, "Alert"),
        }
    }
}
