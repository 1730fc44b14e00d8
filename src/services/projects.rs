use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::{CompletionCascade, Config},
    engine::Engine,
    models::{phase::Phase, project::Project},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateProjectError {
    #[error("Project title cannot be empty")]
    EmptyTitle,

    #[error("Project needs at least one phase")]
    NoPhases,

    #[error("Project needs a start date and an end date")]
    MissingDates,

    #[error("Start date cannot be after end date.")]
    EndBeforeStart,

    #[error("Phase {0} has no name")]
    EmptyPhaseTitle(usize),

    #[error("Phase '{0}' needs a start date and an end date")]
    PhaseMissingDates(String),

    #[error("Phase '{0}': Phase start cannot be after phase end.")]
    PhaseStartAfterEnd(String),

    #[error("Phase '{0}': Phase must be within project timeframe.")]
    PhaseOutsideProject(String),
}

/// Checks the rules a project must satisfy before it is submitted.
///
/// Bounds are compared as instants: a start without a time of day is
/// midnight, an end without one is the configured end of day.
pub fn validate_new_project(engine: &Engine, project: &Project) -> Result<(), ValidateProjectError> {
    if project.title.trim().is_empty() {
        return Err(ValidateProjectError::EmptyTitle);
    }
    if project.phases.is_empty() {
        return Err(ValidateProjectError::NoPhases);
    }

    let (Some(start), Some(end)) = (
        engine.start_instant(&project.schedule.start),
        engine.end_instant(&project.schedule.end),
    ) else {
        return Err(ValidateProjectError::MissingDates);
    };
    if start > end {
        return Err(ValidateProjectError::EndBeforeStart);
    }

    for (index, phase) in project.phases.iter().enumerate() {
        if phase.title.trim().is_empty() {
            return Err(ValidateProjectError::EmptyPhaseTitle(index + 1));
        }

        let (Some(phase_start), Some(phase_end)) = (
            engine.start_instant(&phase.schedule.start),
            engine.end_instant(&phase.schedule.end),
        ) else {
            return Err(ValidateProjectError::PhaseMissingDates(phase.title.clone()));
        };

        if phase_start < start || phase_end > end {
            return Err(ValidateProjectError::PhaseOutsideProject(phase.title.clone()));
        }
        if phase_start > phase_end {
            return Err(ValidateProjectError::PhaseStartAfterEnd(phase.title.clone()));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// False when the project was already done
    pub newly_completed: bool,
    /// Phases completed along with the project
    pub cascaded_phases: usize,
    pub reward_points: u32,
}

/// Marks a project as done. The first completion time is kept on repeated calls.
pub fn complete_project(project: &mut Project, now: Timestamp, config: &Config) -> CompletionOutcome {
    let newly_completed = !project.completed;
    project.completed = true;
    project.completed_at.get_or_insert(now);

    let cascaded_phases = match config.completion_cascade {
        CompletionCascade::LeavePhases => 0,
        CompletionCascade::CompletePhases => project
            .phases
            .iter_mut()
            .map(|phase| mark_phase_done(phase, now))
            .filter(|changed| *changed)
            .count(),
    };

    let reward_points = if newly_completed {
        config.completion_reward_points
    } else {
        0
    };

    if newly_completed {
        info!(project = %project.id, cascaded_phases, reward_points, "project completed");
    } else {
        debug!(project = %project.id, "project was already completed");
    }

    CompletionOutcome {
        newly_completed,
        cascaded_phases,
        reward_points,
    }
}

/// Returns true if the project was completed before
pub fn reopen_project(project: &mut Project) -> bool {
    let was_completed = project.completed;
    project.completed = false;
    project.completed_at = None;
    if was_completed {
        info!(project = %project.id, "project reopened");
    }
    was_completed
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompletePhaseError {
    #[error("Project '{project}' has no phase {position}")]
    PhaseNotFound { project: String, position: usize },
}

/// Completes the phase at `index` (0-based). Returns whether this call changed it.
pub fn complete_phase(
    project: &mut Project,
    index: usize,
    now: Timestamp,
) -> Result<bool, CompletePhaseError> {
    let project_id = project.id.to_string();
    let phase = project
        .phases
        .get_mut(index)
        .ok_or(CompletePhaseError::PhaseNotFound {
            project: project_id.clone(),
            position: index + 1,
        })?;

    let changed = mark_phase_done(phase, now);
    if changed {
        info!(project = %project_id, phase = %phase.title, "phase completed");
    }
    Ok(changed)
}

fn mark_phase_done(phase: &mut Phase, now: Timestamp) -> bool {
    let changed = !phase.completed;
    phase.completed = true;
    phase.completed_at.get_or_insert(now);
    changed
}
