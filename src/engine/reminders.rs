use std::collections::HashSet;

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    engine::Engine,
    models::{
        phase::Phase,
        project::Project,
        reminder::{AlertStage, DueAlert, EntityKind, Reminder, ReminderEdge, ReminderPayload},
        schedule::Moment,
    },
};

/// What a reminder points at
enum Target<'a> {
    Project(&'a Project),
    Phase {
        project: &'a Project,
        phase: &'a Phase,
        index: usize,
    },
}

impl Target<'_> {
    fn kind(&self) -> EntityKind {
        match self {
            Target::Project(_) => EntityKind::Project,
            Target::Phase { .. } => EntityKind::Phase,
        }
    }

    fn id(&self, edge: ReminderEdge) -> String {
        match self {
            Target::Project(project) => format!("project-{}-{}", edge, project.id),
            Target::Phase {
                project,
                phase,
                index,
            } => format!("phase-{}-{}-{}", edge, project.id, phase.local_key(*index)),
        }
    }

    fn payload(&self, edge: ReminderEdge) -> ReminderPayload {
        let kind = format!("{}-{}", self.kind(), edge);
        match self {
            Target::Project(project) => ReminderPayload {
                project_id: project.id.clone(),
                phase_id: None,
                phase_index: None,
                kind,
            },
            Target::Phase {
                project,
                phase,
                index,
            } => ReminderPayload {
                project_id: project.id.clone(),
                phase_id: phase.id.clone(),
                phase_index: Some(*index),
                kind,
            },
        }
    }

    fn text(&self, edge: ReminderEdge, lead_minutes: i64) -> (String, String) {
        let verb = match edge {
            ReminderEdge::Start => "starts",
            ReminderEdge::End => "ends",
        };
        let state = match edge {
            ReminderEdge::Start => "starting soon",
            ReminderEdge::End => "ending soon",
        };
        match self {
            Target::Project(project) => (
                format!("Project {}", state),
                format!("{} {} in {} minutes", project.title, verb, lead_minutes),
            ),
            Target::Phase { project, phase, .. } => (
                format!("Phase {}", state),
                format!(
                    "Phase \"{}\" of {} {} in {} minutes",
                    phase.title, project.title, verb, lead_minutes
                ),
            ),
        }
    }

    fn alert_text(&self, edge: ReminderEdge, stage: AlertStage, lead_minutes: i64) -> (String, String) {
        let (kind, name) = match self {
            Target::Project(project) => ("Project", project.title.clone()),
            Target::Phase { phase, .. } => ("Phase", format!("\"{}\"", phase.title)),
        };
        let (title, what) = match (edge, stage) {
            (ReminderEdge::Start, AlertStage::Upcoming) => {
                ("Start Reminder", format!("starts in {} minutes", lead_minutes))
            }
            (ReminderEdge::Start, AlertStage::Reached) => ("Started", String::from("has started")),
            (ReminderEdge::End, AlertStage::Upcoming) => (
                "Deadline Reminder",
                format!("deadline is in {} minutes", lead_minutes),
            ),
            (ReminderEdge::End, AlertStage::Reached) => {
                ("Deadline Reached", String::from("deadline has passed"))
            }
        };
        (format!("{} {}", kind, title), format!("{} {} {}", kind, name, what))
    }
}

struct Batch {
    now: Timestamp,
    seen: HashSet<String>,
    reminders: Vec<Reminder>,
}

impl Engine {
    /// Reminders to schedule for every open project and open phase.
    ///
    /// A reminder fires `lead` minutes before a start or end that has both a
    /// date and a time; reminders whose trigger is not after `now` are left
    /// out. Phases of a completed project get nothing.
    pub fn reminders(&self, projects: &[Project], now: Timestamp) -> Vec<Reminder> {
        let mut batch = Batch {
            now,
            seen: HashSet::new(),
            reminders: Vec::new(),
        };

        for project in projects.iter().filter(|p| !p.completed) {
            if project.schedule.malformed {
                debug!(project = %project.id, "skipping reminders for project with unreadable dates");
            } else {
                let target = Target::Project(project);
                self.push(&mut batch, &target, ReminderEdge::Start, &project.schedule.start);
                self.push(&mut batch, &target, ReminderEdge::End, &project.schedule.end);
            }

            for (index, phase) in project.active_phases() {
                if phase.schedule.malformed {
                    debug!(project = %project.id, phase = index + 1, "skipping reminders for phase with unreadable dates");
                    continue;
                }
                let target = Target::Phase {
                    project,
                    phase,
                    index,
                };
                self.push(&mut batch, &target, ReminderEdge::Start, &phase.schedule.start);
                self.push(&mut batch, &target, ReminderEdge::End, &phase.schedule.end);
            }
        }

        debug!(count = batch.reminders.len(), "computed reminders");
        batch.reminders
    }

    /// Alerts that have already fired at `now` for open projects and open
    /// phases: one when the lead time before a start or end is reached and
    /// one at the event itself. Both bounds include `now`.
    pub fn due_alerts(&self, projects: &[Project], now: Timestamp) -> Vec<DueAlert> {
        let mut alerts = Vec::new();

        for project in projects.iter().filter(|p| !p.completed) {
            if !project.schedule.malformed {
                let target = Target::Project(project);
                self.push_due(&mut alerts, &target, ReminderEdge::Start, &project.schedule.start, now);
                self.push_due(&mut alerts, &target, ReminderEdge::End, &project.schedule.end, now);
            }

            for (index, phase) in project.active_phases() {
                if phase.schedule.malformed {
                    continue;
                }
                let target = Target::Phase {
                    project,
                    phase,
                    index,
                };
                self.push_due(&mut alerts, &target, ReminderEdge::Start, &phase.schedule.start, now);
                self.push_due(&mut alerts, &target, ReminderEdge::End, &phase.schedule.end, now);
            }
        }

        debug!(count = alerts.len(), "computed due alerts");
        alerts
    }

    fn push_due(
        &self,
        alerts: &mut Vec<DueAlert>,
        target: &Target<'_>,
        edge: ReminderEdge,
        moment: &Moment,
        now: Timestamp,
    ) {
        let Some(event_at) = self.exact_instant(moment) else {
            return;
        };
        let warned_at = event_at.checked_sub(self.lead).unwrap_or(event_at);

        for (stage, fired_at) in [
            (AlertStage::Upcoming, warned_at),
            (AlertStage::Reached, event_at),
        ] {
            if fired_at > now {
                continue;
            }
            let (title, body) = target.alert_text(edge, stage, self.lead_minutes());
            alerts.push(DueAlert {
                edge,
                stage,
                entity: target.kind(),
                title,
                body,
                fired_at,
                payload: target.payload(edge),
            });
        }
    }

    fn push(&self, batch: &mut Batch, target: &Target<'_>, edge: ReminderEdge, moment: &Moment) {
        let Some(event_at) = self.exact_instant(moment) else {
            return;
        };
        let Ok(trigger_at) = event_at.checked_sub(self.lead) else {
            return;
        };
        if trigger_at <= batch.now {
            return;
        }

        let id = target.id(edge);
        if !batch.seen.insert(id.clone()) {
            warn!(reminder = %id, "duplicate reminder id, keeping the first one");
            return;
        }

        let (title, body) = target.text(edge, self.lead_minutes());
        batch.reminders.push(Reminder {
            id,
            edge,
            entity: target.kind(),
            title,
            body,
            trigger_at,
            payload: target.payload(edge),
        });
    }
}
