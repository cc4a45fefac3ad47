//! Structured notifications and change signals emitted by the stores.
//!
//! The engine never presents UI itself. It emits [`Notification`]s and lets
//! the surrounding application decide how to render them.

use serde::{Deserialize, Serialize};

/// Notification level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational warning, e.g. local storage could not be written.
    Soft,
    /// The user should know an operation did not go through.
    Warning,
    /// Something the user asked for was undone or destroyed.
    Destructive,
}

/// Failure taxonomy shared by errors and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    RemoteSync,
    Storage,
    ImageResolution,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::RemoteSync => write!(f, "remote_sync"),
            Self::Storage => write!(f, "storage"),
            Self::ImageResolution => write!(f, "image_resolution"),
        }
    }
}

/// A user-facing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Set on error notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorKind>,
}

impl Notification {
    /// Create an informational notification.
    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
            severity: None,
            cause: None,
        }
    }

    /// Create a success notification.
    #[must_use]
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            ..Self::info(title, message)
        }
    }

    /// Create an error notification with the given cause.
    ///
    /// Storage failures default to [`Severity::Soft`], everything else to
    /// [`Severity::Warning`].
    #[must_use]
    pub fn error(cause: ErrorKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        let severity = match cause {
            ErrorKind::Storage => Severity::Soft,
            _ => Severity::Warning,
        };
        Self {
            level: NoticeLevel::Error,
            severity: Some(severity),
            cause: Some(cause),
            ..Self::info(title, message)
        }
    }

    /// Override the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// The three durable collections owned by the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Cart,
    Favorites,
}

impl Collection {
    /// Durable storage key for this collection.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Cart => "cart",
            Self::Favorites => "favorites",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_key())
    }
}
