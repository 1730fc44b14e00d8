use std::cmp::Ordering;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    engine::Engine,
    models::{phase::Phase, project::Project, schedule::Schedule},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionClass {
    Early,
    OnTime,
    Late,
    InProgress,
}

/// Anything that can be marked as done against a deadline
pub trait Completable {
    fn is_completed(&self) -> bool;
    fn completed_at(&self) -> Option<Timestamp>;
    fn schedule(&self) -> &Schedule;
    fn label(&self) -> String;
}

impl Completable for Project {
    fn is_completed(&self) -> bool {
        self.completed
    }

    fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn label(&self) -> String {
        format!("project {}", self.id)
    }
}

impl Completable for Phase {
    fn is_completed(&self) -> bool {
        self.completed
    }

    fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn label(&self) -> String {
        format!("phase '{}'", self.title)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub early: usize,
    pub on_time: usize,
    pub late: usize,
    pub in_progress: usize,
    pub total: usize,
}

impl CompletionStats {
    pub fn record(&mut self, class: CompletionClass) {
        match class {
            CompletionClass::Early => self.early += 1,
            CompletionClass::OnTime => self.on_time += 1,
            CompletionClass::Late => self.late += 1,
            CompletionClass::InProgress => self.in_progress += 1,
        }
        self.total += 1;
    }

    pub fn count(&self, class: CompletionClass) -> usize {
        match class {
            CompletionClass::Early => self.early,
            CompletionClass::OnTime => self.on_time,
            CompletionClass::Late => self.late,
            CompletionClass::InProgress => self.in_progress,
        }
    }

    /// Rounded share of `count` in the total; 0 for an empty collection
    pub fn percentage(&self, count: usize) -> u32 {
        rounded_share(count, self.total)
    }

    pub fn percentage_of(&self, class: CompletionClass) -> u32 {
        self.percentage(self.count(class))
    }
}

impl Engine {
    pub fn classify(&self, item: &impl Completable) -> CompletionClass {
        if !item.is_completed() {
            return CompletionClass::InProgress;
        }

        let completed_at = item.completed_at();
        let deadline = self.end_instant(&item.schedule().end);
        let (Some(completed_at), Some(deadline)) = (completed_at, deadline) else {
            warn!(
                item = %item.label(),
                has_completed_at = completed_at.is_some(),
                has_deadline = deadline.is_some(),
                fallback = ?self.missing_completed_at,
                "completed item cannot be compared with its deadline"
            );
            return self.missing_completed_at;
        };

        match completed_at.cmp(&deadline) {
            Ordering::Less => CompletionClass::Early,
            Ordering::Equal => CompletionClass::OnTime,
            Ordering::Greater => CompletionClass::Late,
        }
    }

    pub fn aggregate_stats<'a, T>(&self, items: impl IntoIterator<Item = &'a T>) -> CompletionStats
    where
        T: Completable + 'a,
    {
        items
            .into_iter()
            .fold(CompletionStats::default(), |mut stats, item| {
                stats.record(self.classify(item));
                stats
            })
    }

    /// Statistics over the phases of every project
    pub fn phase_stats(&self, projects: &[Project]) -> CompletionStats {
        self.aggregate_stats(projects.iter().flat_map(|p| p.phases.iter()))
    }
}

/// Share of projects marked as done, as shown on the dashboard progress bar
pub fn overall_completion_rate(projects: &[Project]) -> u32 {
    let completed = projects.iter().filter(|p| p.completed).count();
    rounded_share(completed, projects.len())
}

fn rounded_share(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}
