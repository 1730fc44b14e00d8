use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::to_string_pretty;

use crate::{
    models::reminder::Reminder,
    notify::{Notifier, NotifyError},
    storage::atomic::{FileLock, replace_file},
};

#[derive(Serialize, Deserialize, Default)]
struct Outbox {
    scheduled: BTreeMap<String, Reminder>,
}

/// Keeps the scheduled set in a JSON file, for hosts without a notification
/// service of their own.
pub struct JsonFileNotifier {
    path: PathBuf,
}

impl JsonFileNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<Outbox, NotifyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| NotifyError::Corrupt {
                path: self.path.clone(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Outbox::default()),
            Err(e) => Err(NotifyError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn update(&self, change: impl FnOnce(&mut Outbox)) -> Result<(), NotifyError> {
        let lock = FileLock::acquire(&self.path)?;

        let mut outbox = self.load()?;
        change(&mut outbox);

        let json =
            to_string_pretty(&outbox).map_err(|e| NotifyError::SerializeFailed { source: e })?;
        replace_file(&self.path, &json)?;
        lock.unlock()?;
        Ok(())
    }
}

impl Notifier for JsonFileNotifier {
    fn schedule(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        if reminder.id.trim().is_empty() {
            return Err(NotifyError::Rejected {
                id: reminder.id.clone(),
                reason: String::from("empty identifier"),
            });
        }
        self.update(|outbox| {
            outbox
                .scheduled
                .insert(reminder.id.clone(), reminder.clone());
        })
    }

    fn cancel_all(&self) -> Result<(), NotifyError> {
        self.update(|outbox| outbox.scheduled.clear())
    }

    fn cancel(&self, id: &str) -> Result<(), NotifyError> {
        self.update(|outbox| {
            outbox.scheduled.remove(id);
        })
    }

    /// Scheduled reminders, earliest trigger first
    fn scheduled(&self) -> Result<Vec<Reminder>, NotifyError> {
        let mut reminders: Vec<Reminder> = self.load()?.scheduled.into_values().collect();
        reminders.sort_by(|a, b| a.trigger_at.cmp(&b.trigger_at).then(a.id.cmp(&b.id)));
        Ok(reminders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        reminder::{EntityKind, ReminderEdge, ReminderPayload},
        schedule::EntityId,
    };
    use jiff::Timestamp;
    use tempfile::tempdir;

    fn reminder(id: &str, trigger: &str) -> Reminder {
        Reminder {
            id: id.to_string(),
            edge: ReminderEdge::Start,
            entity: EntityKind::Project,
            title: String::from("Project starting soon"),
            body: String::from("Thesis starts in 15 minutes"),
            trigger_at: trigger.parse::<Timestamp>().unwrap(),
            payload: ReminderPayload {
                project_id: EntityId::from("1"),
                phase_id: None,
                phase_index: None,
                kind: String::from("project-start"),
            },
        }
    }

    #[test]
    fn test_schedule_and_list_in_trigger_order() {
        let dir = tempdir().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("scheduled.json"));

        notifier.schedule(&reminder("b", "2025-03-02T10:00:00Z")).unwrap();
        notifier.schedule(&reminder("a", "2025-03-01T10:00:00Z")).unwrap();

        let ids: Vec<String> = notifier.scheduled().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_same_id_replaces() {
        let dir = tempdir().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("scheduled.json"));

        notifier.schedule(&reminder("a", "2025-03-01T10:00:00Z")).unwrap();
        notifier.schedule(&reminder("a", "2025-03-05T10:00:00Z")).unwrap();

        let scheduled = notifier.scheduled().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(
            scheduled[0].trigger_at,
            "2025-03-05T10:00:00Z".parse::<Timestamp>().unwrap()
        );
    }

    #[test]
    fn test_cancel_and_cancel_all() {
        let dir = tempdir().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("scheduled.json"));

        notifier.schedule(&reminder("a", "2025-03-01T10:00:00Z")).unwrap();
        notifier.schedule(&reminder("b", "2025-03-02T10:00:00Z")).unwrap();

        notifier.cancel("a").unwrap();
        assert_eq!(notifier.scheduled().unwrap().len(), 1);

        notifier.cancel_all().unwrap();
        assert!(notifier.scheduled().unwrap().is_empty());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let dir = tempdir().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("scheduled.json"));
        assert!(matches!(
            notifier.schedule(&reminder(" ", "2025-03-01T10:00:00Z")),
            Err(NotifyError::Rejected { .. })
        ));
    }

    #[test]
    fn test_corrupt_outbox() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scheduled.json");
        std::fs::write(&path, "[").unwrap();
        let notifier = JsonFileNotifier::new(path);
        assert!(matches!(
            notifier.scheduled(),
            Err(NotifyError::Corrupt { .. })
        ));
    }
}
