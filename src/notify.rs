use std::path::PathBuf;

use thiserror::Error;

use crate::models::reminder::Reminder;

pub mod json;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification '{id}' was rejected: {reason}")]
    Rejected { id: String, reason: String },

    #[error("Failed to read scheduled notifications from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scheduled notifications file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write scheduled notifications to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize scheduled notifications: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
}

impl From<crate::storage::atomic::WriteError> for NotifyError {
    fn from(e: crate::storage::atomic::WriteError) -> Self {
        NotifyError::SaveFailed {
            path: e.path,
            source: e.source,
        }
    }
}

/// Delivery side of reminders (the OS notification service on a device)
pub trait Notifier {
    /// Schedules a reminder, replacing any scheduled one with the same id
    fn schedule(&self, reminder: &Reminder) -> Result<(), NotifyError>;
    fn cancel_all(&self) -> Result<(), NotifyError>;
    fn cancel(&self, id: &str) -> Result<(), NotifyError>;
    fn scheduled(&self) -> Result<Vec<Reminder>, NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn schedule(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        (**self).schedule(reminder)
    }

    fn cancel_all(&self) -> Result<(), NotifyError> {
        (**self).cancel_all()
    }

    fn cancel(&self, id: &str) -> Result<(), NotifyError> {
        (**self).cancel(id)
    }

    fn scheduled(&self) -> Result<Vec<Reminder>, NotifyError> {
        (**self).scheduled()
    }
}
