use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::Serialize;

use crate::{
    engine::{Engine, classify::CompletionClass},
    models::project::Project,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarMark {
    OnTime,
    Late,
    InProgress,
}

impl CalendarMark {
    pub fn color(&self) -> &'static str {
        match self {
            CalendarMark::OnTime => "#10b981",
            CalendarMark::Late => "#ef4444",
            CalendarMark::InProgress => "#6366f1",
        }
    }
}

impl Engine {
    /// One mark per project end date. Projects sharing an end date overwrite
    /// each other in list order, the last one wins.
    pub fn calendar_marks(&self, projects: &[Project]) -> BTreeMap<Date, CalendarMark> {
        let mut marks = BTreeMap::new();

        for project in projects {
            let Some(end_date) = project.schedule.end.date else {
                continue;
            };

            let mark = match self.classify(project) {
                CompletionClass::InProgress => CalendarMark::InProgress,
                CompletionClass::Late => CalendarMark::Late,
                CompletionClass::Early | CompletionClass::OnTime => CalendarMark::OnTime,
            };
            marks.insert(end_date, mark);
        }

        marks
    }
}
