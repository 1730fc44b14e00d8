//! Schema boundary between the backend JSON and the domain types.
//!
//! Structural problems (missing ids or titles, wrong types, `phases` that is
//! not a list) fail the whole payload with a [`SchemaError`]. Date and time
//! strings that cannot be read are dropped with a warning and the owning
//! schedule is flagged as malformed, so a single bad value never hides the
//! rest of the project list.

use jiff::{
    Timestamp,
    civil::{Date, DateTime, Time},
    tz::TimeZone,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    phase::Phase,
    project::Project,
    schedule::{EntityId, Moment, Schedule},
};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Expected a list of projects, found {0}")]
    NotAList(&'static str),

    #[error("Project #{index} is malformed: {source}")]
    Project {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project #{0} has an empty id")]
    EmptyId(usize),

    #[error("Project '{project}': phase #{index} is malformed: {source}")]
    Phase {
        project: EntityId,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project '{0}' is not in the project list")]
    UnknownProject(EntityId),

    #[error("Project '{project}': phases must be a list, found {found}")]
    PhasesNotAList {
        project: EntityId,
        found: &'static str,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

impl From<WireId> for EntityId {
    fn from(value: WireId) -> Self {
        match value {
            WireId::Number(n) => EntityId::from(n),
            WireId::Text(s) => EntityId::new(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProject {
    id: WireId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    phases: Value,
}

#[derive(Debug, Deserialize)]
struct WirePhase {
    #[serde(default)]
    id: Option<WireId>,
    #[serde(alias = "name")]
    title: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<String>,
}

/// Accepts a bare list or a paginated `{"results": [...]}` body
pub fn parse_projects(payload: &Value) -> Result<Vec<Project>, SchemaError> {
    let mut payload = payload;
    if let Value::Object(obj) = payload {
        payload = obj
            .get("results")
            .or_else(|| obj.get("projects"))
            .ok_or(SchemaError::NotAList("an object"))?;
    }
    let Value::Array(items) = payload else {
        return Err(SchemaError::NotAList(kind_of(payload)));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let wire = WireProject::deserialize(item)
                .map_err(|e| SchemaError::Project { index, source: e })?;
            project_from_wire(index, wire)
        })
        .collect()
}

/// Writes the completion state of `project` back into a body accepted by
/// [`parse_projects`]. Other fields are left as they are.
pub fn patch_completion(payload: &mut Value, project: &Project) -> Result<(), SchemaError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(obj) => {
            let key = if obj.contains_key("results") {
                "results"
            } else {
                "projects"
            };
            match obj.get_mut(key) {
                Some(Value::Array(items)) => items,
                Some(other) => return Err(SchemaError::NotAList(kind_of(other))),
                None => return Err(SchemaError::NotAList("an object")),
            }
        }
        other => return Err(SchemaError::NotAList(kind_of(other))),
    };

    let item = items
        .iter_mut()
        .find(|item| {
            item.get("id")
                .cloned()
                .and_then(|id| WireId::deserialize(id).ok())
                .map(EntityId::from)
                .as_ref()
                == Some(&project.id)
        })
        .ok_or_else(|| SchemaError::UnknownProject(project.id.clone()))?;

    write_completion(item, project.completed, project.completed_at);
    if let Some(Value::Array(phases)) = item.get_mut("phases") {
        for (value, phase) in phases.iter_mut().zip(&project.phases) {
            write_completion(value, phase.completed, phase.completed_at);
        }
    }
    Ok(())
}

fn write_completion(value: &mut Value, completed: bool, completed_at: Option<Timestamp>) {
    if let Value::Object(obj) = value {
        obj.insert(String::from("completed"), Value::Bool(completed));
        obj.insert(
            String::from("completed_at"),
            completed_at.map_or(Value::Null, |ts| Value::String(ts.to_string())),
        );
    }
}

fn project_from_wire(index: usize, wire: WireProject) -> Result<Project, SchemaError> {
    let id = EntityId::from(wire.id);
    if id.as_str().trim().is_empty() {
        return Err(SchemaError::EmptyId(index));
    }

    let owner = format!("project {}", id);
    let mut fields = FieldReader::new(&owner);
    let schedule = fields.schedule(
        wire.start_date,
        wire.start_time,
        wire.end_date,
        wire.end_time,
    );
    let completed_at = fields.completed_at(wire.completed_at);

    let phase_values: &[Value] = match &wire.phases {
        Value::Null => &[],
        Value::Array(values) => values,
        Value::Object(obj) if obj.is_empty() => &[],
        other => {
            return Err(SchemaError::PhasesNotAList {
                project: id,
                found: kind_of(other),
            });
        }
    };

    let phases = phase_values
        .iter()
        .enumerate()
        .map(|(phase_index, value)| phase_from_wire(&id, phase_index, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Project {
        description: non_blank(wire.description),
        category: non_blank(wire.category),
        completed: wire.completed,
        completed_at,
        phases,
        ..Project::new(id, wire.title, schedule)
    })
}

fn phase_from_wire(project: &EntityId, index: usize, value: &Value) -> Result<Phase, SchemaError> {
    let wire = WirePhase::deserialize(value).map_err(|e| SchemaError::Phase {
        project: project.clone(),
        index,
        source: e,
    })?;

    let owner = format!("project {} phase #{}", project, index + 1);
    let mut fields = FieldReader::new(&owner);
    let schedule = fields.schedule(
        wire.start_date,
        wire.start_time,
        wire.end_date,
        wire.end_time,
    );
    let completed_at = fields.completed_at(wire.completed_at);

    Ok(Phase {
        id: wire
            .id
            .map(EntityId::from)
            .filter(|id| !id.as_str().trim().is_empty()),
        comment: non_blank(wire.comment),
        completed: wire.completed,
        completed_at,
        ..Phase::new(wire.title, schedule)
    })
}

/// Reads the loosely formatted date/time strings of one entity
struct FieldReader<'a> {
    owner: &'a str,
    malformed: bool,
}

impl<'a> FieldReader<'a> {
    fn new(owner: &'a str) -> Self {
        Self {
            owner,
            malformed: false,
        }
    }

    fn schedule(
        &mut self,
        start_date: Option<String>,
        start_time: Option<String>,
        end_date: Option<String>,
        end_time: Option<String>,
    ) -> Schedule {
        let start = Moment {
            date: self.date("start_date", start_date),
            time: self.time("start_time", start_time),
        };
        let end = Moment {
            date: self.date("end_date", end_date),
            time: self.time("end_time", end_time),
        };
        Schedule {
            malformed: self.malformed,
            ..Schedule::new(start, end)
        }
    }

    fn date(&mut self, field: &'static str, raw: Option<String>) -> Option<Date> {
        let raw = non_blank(raw)?;
        let parsed = raw
            .parse::<Date>()
            .ok()
            .or_else(|| raw.parse::<DateTime>().ok().map(|dt| dt.date()));
        if parsed.is_none() {
            warn!(owner = self.owner, field, value = %raw, "ignoring unreadable date");
            self.malformed = true;
        }
        parsed
    }

    fn time(&mut self, field: &'static str, raw: Option<String>) -> Option<Time> {
        let raw = non_blank(raw)?;
        let parsed = raw
            .parse::<Time>()
            .ok()
            .or_else(|| Time::strptime("%H:%M", &raw).ok());
        if parsed.is_none() {
            warn!(owner = self.owner, field, value = %raw, "ignoring unreadable time");
            self.malformed = true;
        }
        parsed
    }

    /// Offset-less values come from the backend clock, which runs on UTC
    fn completed_at(&mut self, raw: Option<String>) -> Option<Timestamp> {
        let raw = non_blank(raw)?;
        if let Ok(ts) = raw.parse::<Timestamp>() {
            return Some(ts);
        }
        let parsed = raw
            .parse::<DateTime>()
            .ok()
            .or_else(|| DateTime::strptime("%Y-%m-%d %H:%M", &raw).ok())
            .and_then(|dt| dt.to_zoned(TimeZone::UTC).ok())
            .map(|zoned| zoned.timestamp());
        if parsed.is_none() {
            warn!(owner = self.owner, value = %raw, "ignoring unreadable completed_at");
        }
        parsed
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
