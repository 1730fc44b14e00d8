use jiff::Timestamp;
use tracing::debug;

use crate::{
    engine::Engine,
    models::{phase::Phase, project::Project},
};

/// Highest value shown for a project that has not been marked as done
pub const UNCONFIRMED_CEILING: f64 = 99.0;

struct PhaseWindow {
    start: Timestamp,
    end: Timestamp,
    completed: bool,
}

impl Engine {
    /// Completion percentage of a project, between 0 and 100.
    ///
    /// Completed projects are always at 100 and projects without phases at 0.
    /// When every phase carries dates the value is weighted by phase duration
    /// and by how much of each open phase has elapsed at `now`; otherwise it is
    /// the share of completed phases.
    pub fn project_progress(&self, project: &Project, now: Timestamp) -> f64 {
        if project.completed {
            return 100.0;
        }
        if project.phases.is_empty() {
            return 0.0;
        }

        let raw = match self.phase_windows(&project.phases) {
            Some(windows) => time_weighted(&windows, now),
            None => count_based(&project.phases),
        };

        if self.clamp_unconfirmed && raw >= 100.0 {
            debug!(project = %project.id, "all work done but project not confirmed, holding at 99%");
            return UNCONFIRMED_CEILING;
        }
        raw
    }

    /// Progress rounded for display. 99.6% of an unconfirmed project still reads 99.
    pub fn project_progress_percent(&self, project: &Project, now: Timestamp) -> u8 {
        let percent = self.project_progress(project, now).round() as u8;
        if self.clamp_unconfirmed && !project.completed {
            percent.min(UNCONFIRMED_CEILING as u8)
        } else {
            percent
        }
    }

    /// `None` when at least one phase lacks dates. Phases with unreadable
    /// dates still count as scheduled but get an empty window.
    fn phase_windows(&self, phases: &[Phase]) -> Option<Vec<PhaseWindow>> {
        phases
            .iter()
            .map(|phase| {
                if phase.schedule.malformed {
                    return Some(None);
                }
                let start = self.start_instant(&phase.schedule.start)?;
                let end = self.end_instant(&phase.schedule.end)?;
                Some(Some(PhaseWindow {
                    start,
                    end,
                    completed: phase.completed,
                }))
            })
            .collect::<Option<Vec<_>>>()
            .map(|windows| windows.into_iter().flatten().collect())
    }
}

fn time_weighted(windows: &[PhaseWindow], now: Timestamp) -> f64 {
    let mut total: i64 = 0;
    let mut done: i64 = 0;

    for window in windows {
        let start = window.start.as_millisecond();
        let duration = (window.end.as_millisecond() - start).max(0);

        let contribution = if window.completed {
            duration
        } else if now >= window.start {
            (now.min(window.end).as_millisecond() - start).clamp(0, duration)
        } else {
            0
        };

        total += duration;
        done += contribution;
    }

    if total == 0 {
        return 0.0;
    }
    done as f64 / total as f64 * 100.0
}

fn count_based(phases: &[Phase]) -> f64 {
    let completed = phases.iter().filter(|p| p.completed).count();
    completed as f64 / phases.len() as f64 * 100.0
}
