use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::models::schedule::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderEdge {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Phase,
}

impl fmt::Display for ReminderEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderEdge::Start => f.write_str("start"),
            ReminderEdge::End => f.write_str("end"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => f.write_str("project"),
            EntityKind::Phase => f.write_str("phase"),
        }
    }
}

/// Data attached to a notification so a tap can open the right screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub project_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<EntityId>,
    /// Position of the phase inside its project, for phases without an id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_index: Option<usize>,
    /// `project-start`, `phase-end`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Stable identifier, used to replace or cancel the notification
    pub id: String,
    pub edge: ReminderEdge,
    pub entity: EntityKind,
    pub title: String,
    pub body: String,
    /// When the notification fires
    pub trigger_at: Timestamp,
    pub payload: ReminderPayload,
}

/// Which moment of an edge an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStage {
    /// The lead time before the event has been reached
    Upcoming,
    /// The event itself has been reached
    Reached,
}

/// An alert that has already fired for an open project or phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueAlert {
    pub edge: ReminderEdge,
    pub stage: AlertStage,
    pub entity: EntityKind,
    pub title: String,
    pub body: String,
    pub fired_at: Timestamp,
    pub payload: ReminderPayload,
}
