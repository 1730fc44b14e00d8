use jiff::Timestamp;

use crate::models::{
    phase::Phase,
    schedule::{EntityId, Schedule},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    /// Backend identifier of the project
    pub id: EntityId,
    /// Title of the project
    pub title: String,
    /// Free-form description
    pub description: Option<String>,
    /// Category picked on creation (school, business, health, ...)
    pub category: Option<String>,
    /// Timeframe of the project
    pub schedule: Schedule,
    /// Whether the user marked the project as done
    pub completed: bool,
    /// When the project was marked as done
    pub completed_at: Option<Timestamp>,
    /// Ordered phases owned by the project
    pub phases: Vec<Phase>,
}

impl Project {
    pub fn new(id: impl Into<EntityId>, title: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            schedule,
            ..Project::default()
        }
    }

    pub fn active_phases(&self) -> impl Iterator<Item = (usize, &Phase)> {
        self.phases
            .iter()
            .enumerate()
            .filter(|(_, phase)| !phase.completed)
    }

    pub fn completed_phase_count(&self) -> usize {
        self.phases.iter().filter(|p| p.completed).count()
    }
}
