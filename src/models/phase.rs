use jiff::Timestamp;

use crate::models::schedule::{EntityId, Schedule};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phase {
    /// Identifier, only present once the backend has stored the phase
    pub id: Option<EntityId>,
    /// Title of the phase
    pub title: String,
    /// Notes attached to the phase
    pub comment: Option<String>,
    /// Sub-timeframe inside the parent project
    pub schedule: Schedule,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
}

impl Phase {
    pub fn new(title: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            title: title.into(),
            schedule,
            ..Phase::default()
        }
    }

    /// Key used in reminder identifiers: the backend id, or `#` and the
    /// 1-based position for phases that were never stored. The `#` keeps
    /// positions apart from numeric ids.
    pub fn local_key(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => format!("#{}", index + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_key_never_matches_a_stored_id() {
        let stored = Phase {
            id: Some(EntityId::from("2")),
            ..Phase::new("Stored", Schedule::default())
        };
        let local = Phase::new("Local", Schedule::default());

        assert_eq!(stored.local_key(0), "2");
        assert_eq!(local.local_key(1), "#2");
    }
}
