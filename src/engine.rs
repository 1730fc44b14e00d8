//! Progress & reminder computations over a snapshot of projects.
//!
//! Everything here is a pure function of its inputs: the engine never
//! touches storage or the notification service.

use jiff::{
    SignedDuration, Timestamp,
    civil::{DateTime, Time},
    tz::TimeZone,
};

use crate::{
    config::{Config, ConfigError},
    engine::classify::CompletionClass,
    models::schedule::Moment,
};

pub mod calendar;
pub mod classify;
pub mod progress;
pub mod reminders;

#[derive(Debug, Clone)]
pub struct Engine {
    time_zone: TimeZone,
    end_of_day: Time,
    lead: SignedDuration,
    clamp_unconfirmed: bool,
    missing_completed_at: CompletionClass,
}

impl Engine {
    pub fn from_config(config: &Config) -> Result<Engine, ConfigError> {
        let mut engine = Engine::with_time_zone(config.time_zone()?)
            .clamp_unconfirmed(config.clamp_unconfirmed_completion)
            .missing_completed_at(config.missing_completed_at);
        engine.end_of_day = config.end_of_day()?;
        engine.lead = SignedDuration::from_mins(config.lead_minutes()?);
        Ok(engine)
    }

    /// Default settings in the given zone
    pub fn with_time_zone(time_zone: TimeZone) -> Engine {
        Engine {
            time_zone,
            end_of_day: Time::constant(23, 59, 0, 0),
            lead: SignedDuration::from_mins(15),
            clamp_unconfirmed: true,
            missing_completed_at: CompletionClass::OnTime,
        }
    }

    pub fn clamp_unconfirmed(mut self, clamp: bool) -> Engine {
        self.clamp_unconfirmed = clamp;
        self
    }

    pub fn missing_completed_at(mut self, class: CompletionClass) -> Engine {
        self.missing_completed_at = class;
        self
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.time_zone
    }

    pub fn lead_minutes(&self) -> i64 {
        self.lead.as_mins()
    }

    /// Start instant; a missing time of day means midnight
    pub fn start_instant(&self, moment: &Moment) -> Option<Timestamp> {
        self.instant(moment.datetime_or(Time::midnight()))
    }

    /// End instant; a missing time of day means the configured end of day
    pub fn end_instant(&self, moment: &Moment) -> Option<Timestamp> {
        self.instant(moment.datetime_or(self.end_of_day))
    }

    /// Instant of a moment with both date and time
    pub fn exact_instant(&self, moment: &Moment) -> Option<Timestamp> {
        self.instant(moment.exact())
    }

    fn instant(&self, datetime: Option<DateTime>) -> Option<Timestamp> {
        datetime
            .and_then(|dt| dt.to_zoned(self.time_zone.clone()).ok())
            .map(|zoned| zoned.timestamp())
    }
}
