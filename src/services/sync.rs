//! Refresh cycle: fetch the project list, fall back to the cached copy, and
//! replace the scheduled reminders with a freshly computed batch.
//!
//! Every refresh takes a ticket from a monotonic counter. A refresh whose
//! ticket is older than one that has already been applied is dropped, so
//! overlapping refreshes settle on the newest request rather than on the
//! slowest one.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use clap::ValueEnum;
use jiff::{SignedDuration, Timestamp};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    engine::Engine,
    models::{project::Project, wire::parse_projects},
    notify::{Notifier, NotifyError},
    source::ProjectSource,
    storage::{KeyValueStore, StorageError},
};

const LAST_BACKGROUND_KEY: &str = "@last_background_refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RefreshTrigger {
    /// The app came to the foreground
    AppActive,
    /// Periodic timer while the app is open
    Interval,
    /// Best-effort refresh while the app is in the background
    Background,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTrigger::AppActive => write!(f, "app-active"),
            RefreshTrigger::Interval => write!(f, "interval"),
            RefreshTrigger::Background => write!(f, "background"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Fresh,
    Cache,
    Unavailable,
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotOrigin::Fresh => write!(f, "fresh"),
            SnapshotOrigin::Cache => write!(f, "cache"),
            SnapshotOrigin::Unavailable => write!(f, "none"),
        }
    }
}

/// A validated project list and where it came from
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub origin: SnapshotOrigin,
    pub projects: Vec<Project>,
}

impl Snapshot {
    fn unavailable() -> Self {
        Self {
            origin: SnapshotOrigin::Unavailable,
            projects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub trigger: RefreshTrigger,
    pub origin: SnapshotOrigin,
    /// Ticket of this refresh; 0 when it was throttled before taking one
    pub generation: u64,
    pub projects: usize,
    pub scheduled: usize,
    pub failed: usize,
    /// A newer refresh was applied first, nothing was touched
    pub stale: bool,
    /// Background refresh skipped because the previous one is too recent
    pub throttled: bool,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to clear previously scheduled reminders: {0}")]
    CancelFailed(#[source] NotifyError),
}

pub struct ReminderSync<S, K, N> {
    engine: Engine,
    source: S,
    cache: K,
    notifier: N,
    cache_key: String,
    background_min_interval: SignedDuration,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl<S, K, N> ReminderSync<S, K, N>
where
    S: ProjectSource,
    K: KeyValueStore,
    N: Notifier,
{
    pub fn new(engine: Engine, source: S, cache: K, notifier: N, config: &Config) -> Self {
        let min_secs = i64::try_from(config.background_min_interval_secs).unwrap_or(i64::MAX);
        Self {
            engine,
            source,
            cache,
            notifier,
            cache_key: config.cache_key.clone(),
            background_min_interval: SignedDuration::from_secs(min_secs),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Fresh list when the source answers with a valid body, else the cached
    /// one. A valid body replaces the cached copy.
    pub fn snapshot(&self) -> Snapshot {
        match self.source.fetch() {
            Ok(body) => match parse_projects(&body) {
                Ok(projects) => {
                    debug!(count = projects.len(), "fetched projects");
                    if let Err(e) = self.cache.set(&self.cache_key, body) {
                        warn!(error = %e, "failed to cache projects");
                    }
                    return Snapshot {
                        origin: SnapshotOrigin::Fresh,
                        projects,
                    };
                }
                Err(e) => warn!(error = %e, "rejected project list from source, using cache"),
            },
            Err(e) => warn!(error = %e, "project source unavailable, using cache"),
        }

        self.cached_snapshot()
    }

    fn cached_snapshot(&self) -> Snapshot {
        let body = match self.cache.get(&self.cache_key) {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!(key = %self.cache_key, "no cached projects");
                return Snapshot::unavailable();
            }
            Err(e) => {
                warn!(error = %e, "failed to read cached projects");
                return Snapshot::unavailable();
            }
        };

        match parse_projects(&body) {
            Ok(projects) => Snapshot {
                origin: SnapshotOrigin::Cache,
                projects,
            },
            Err(e) => {
                warn!(error = %e, "cached projects are unreadable");
                Snapshot::unavailable()
            }
        }
    }

    /// Replaces the scheduled reminders with those of `snapshot`, unless a
    /// newer ticket got there first.
    ///
    /// Without any snapshot the scheduled reminders are kept as they are
    /// rather than cleared, so an offline refresh loses nothing.
    pub fn apply(
        &self,
        ticket: Ticket,
        trigger: RefreshTrigger,
        snapshot: Snapshot,
        now: Timestamp,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            trigger,
            origin: snapshot.origin,
            generation: ticket.0,
            projects: snapshot.projects.len(),
            scheduled: 0,
            failed: 0,
            stale: false,
            throttled: false,
        };

        let newest = self.applied.fetch_max(ticket.0, Ordering::SeqCst);
        if newest > ticket.0 {
            debug!(generation = ticket.0, newest, "discarding stale refresh");
            report.stale = true;
            return Ok(report);
        }

        if snapshot.origin == SnapshotOrigin::Unavailable {
            info!(%trigger, "no projects available, leaving reminders untouched");
            return Ok(report);
        }

        let reminders = self.engine.reminders(&snapshot.projects, now);
        self.notifier
            .cancel_all()
            .map_err(SyncError::CancelFailed)?;

        for reminder in &reminders {
            match self.notifier.schedule(reminder) {
                Ok(()) => report.scheduled += 1,
                Err(e) => {
                    error!(reminder = %reminder.id, error = %e, "failed to schedule reminder");
                    report.failed += 1;
                }
            }
        }

        info!(
            %trigger,
            origin = %report.origin,
            generation = report.generation,
            scheduled = report.scheduled,
            failed = report.failed,
            "reminders refreshed"
        );
        Ok(report)
    }

    pub fn refresh(&self, trigger: RefreshTrigger, now: Timestamp) -> Result<SyncReport, SyncError> {
        if trigger == RefreshTrigger::Background && !self.background_due(now) {
            debug!("background refresh throttled");
            return Ok(SyncReport {
                trigger,
                origin: SnapshotOrigin::Unavailable,
                generation: 0,
                projects: 0,
                scheduled: 0,
                failed: 0,
                stale: false,
                throttled: true,
            });
        }

        let ticket = self.begin();
        let snapshot = self.snapshot();
        let report = self.apply(ticket, trigger, snapshot, now)?;

        if trigger == RefreshTrigger::Background && !report.stale {
            if let Err(e) = self
                .cache
                .set(LAST_BACKGROUND_KEY, Value::String(now.to_string()))
            {
                warn!(error = %e, "failed to record background refresh");
            }
        }

        Ok(report)
    }

    /// Drops the cached project list
    pub fn forget_cache(&self) -> Result<(), StorageError> {
        self.cache.remove(&self.cache_key)?;
        info!(key = %self.cache_key, "cached projects removed");
        Ok(())
    }

    fn background_due(&self, now: Timestamp) -> bool {
        let last = match self.cache.get(LAST_BACKGROUND_KEY) {
            Ok(value) => value
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<Timestamp>().ok()),
            Err(e) => {
                warn!(error = %e, "failed to read last background refresh");
                None
            }
        };

        match last {
            Some(last) => now.duration_since(last) >= self.background_min_interval,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::fixtures::{at, engine},
        notify::recording::RecordingNotifier,
        source::scripted::ScriptedSource,
        storage::memory::MemoryStore,
    };
    use jiff::civil::{date, time};
    use serde_json::json;

    fn payload(title: &str) -> Value {
        json!([{
            "id": 1,
            "title": title,
            "start_date": "2025-03-02",
            "start_time": "09:00",
            "end_date": "2025-03-09",
            "end_time": "17:00",
            "phases": [{
                "id": 11,
                "title": "Research",
                "start_date": "2025-03-02",
                "start_time": "09:00",
                "end_date": "2025-03-04",
                "end_time": "17:00"
            }]
        }])
    }

    fn now() -> Timestamp {
        at(date(2025, 3, 1), time(0, 0, 0, 0))
    }

    fn scheduled_ids(notifier: &RecordingNotifier) -> Vec<String> {
        notifier.scheduled.lock().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_fresh_refresh_schedules_and_caches() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let report = sync.refresh(RefreshTrigger::AppActive, now()).unwrap();

        assert_eq!(report.origin, SnapshotOrigin::Fresh);
        assert_eq!(report.projects, 1);
        assert_eq!(report.scheduled, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(
            store.get("@user_projects_cache").unwrap(),
            Some(payload("Thesis"))
        );
    }

    #[test]
    fn test_snapshot_alone_refreshes_cache() {
        let store = MemoryStore::default();
        store.set("@user_projects_cache", payload("Old")).unwrap();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("New")), None]),
            &store,
            &notifier,
            &Config::default(),
        );

        let fresh = sync.snapshot();
        assert_eq!(fresh.origin, SnapshotOrigin::Fresh);
        assert_eq!(
            store.get("@user_projects_cache").unwrap(),
            Some(payload("New"))
        );
        assert!(scheduled_ids(&notifier).is_empty());

        let offline = sync.snapshot();
        assert_eq!(offline.origin, SnapshotOrigin::Cache);
        assert_eq!(offline.projects[0].title, "New");
    }

    #[test]
    fn test_fetch_failure_uses_cache() {
        let store = MemoryStore::default();
        store.set("@user_projects_cache", payload("Cached")).unwrap();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![None]),
            &store,
            &notifier,
            &Config::default(),
        );

        let report = sync.refresh(RefreshTrigger::Interval, now()).unwrap();

        assert_eq!(report.origin, SnapshotOrigin::Cache);
        assert_eq!(report.scheduled, 4);
        assert!(
            notifier
                .scheduled
                .lock()
                .unwrap()
                .values()
                .any(|r| r.body.contains("Cached"))
        );
    }

    #[test]
    fn test_invalid_body_uses_cache_and_keeps_it() {
        let store = MemoryStore::default();
        store.set("@user_projects_cache", payload("Cached")).unwrap();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(json!({"detail": "Server error"}))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let report = sync.refresh(RefreshTrigger::Interval, now()).unwrap();

        assert_eq!(report.origin, SnapshotOrigin::Cache);
        assert_eq!(
            store.get("@user_projects_cache").unwrap(),
            Some(payload("Cached"))
        );
    }

    #[test]
    fn test_no_cache_schedules_nothing() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![None]),
            &store,
            &notifier,
            &Config::default(),
        );

        let report = sync.refresh(RefreshTrigger::AppActive, now()).unwrap();

        assert_eq!(report.origin, SnapshotOrigin::Unavailable);
        assert_eq!(report.scheduled, 0);
        assert_eq!(*notifier.cancel_all_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_failed_reminder_does_not_stop_batch() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier {
            reject: vec![String::from("project-start-1")],
            ..RecordingNotifier::default()
        };
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let report = sync.refresh(RefreshTrigger::AppActive, now()).unwrap();

        assert_eq!(report.scheduled, 3);
        assert_eq!(report.failed, 1);
        assert!(!scheduled_ids(&notifier).contains(&String::from("project-start-1")));
    }

    #[test]
    fn test_repeated_refreshes_do_not_duplicate() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis")), Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        sync.refresh(RefreshTrigger::AppActive, now()).unwrap();
        let first = scheduled_ids(&notifier);
        sync.refresh(RefreshTrigger::Interval, now()).unwrap();

        assert_eq!(scheduled_ids(&notifier), first);
        assert_eq!(first.len(), 4);
        assert_eq!(*notifier.cancel_all_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_older_ticket_is_discarded() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Old")), Some(payload("New"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let older = sync.begin();
        let newer = sync.begin();
        let old_snapshot = sync.snapshot();
        let new_snapshot = sync.snapshot();

        let applied = sync
            .apply(newer, RefreshTrigger::Interval, new_snapshot, now())
            .unwrap();
        assert!(!applied.stale);

        let late = sync
            .apply(older, RefreshTrigger::AppActive, old_snapshot, now())
            .unwrap();
        assert!(late.stale);
        assert_eq!(late.scheduled, 0);

        assert_eq!(
            store.get("@user_projects_cache").unwrap(),
            Some(payload("New"))
        );
        assert!(
            notifier
                .scheduled
                .lock()
                .unwrap()
                .values()
                .all(|r| !r.body.contains("Old"))
        );
    }

    #[test]
    fn test_cancel_failure_aborts() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier {
            fail_cancel: true,
            ..RecordingNotifier::default()
        };
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        assert!(matches!(
            sync.refresh(RefreshTrigger::AppActive, now()),
            Err(SyncError::CancelFailed(_))
        ));
        assert!(scheduled_ids(&notifier).is_empty());
    }

    #[test]
    fn test_background_refresh_is_throttled() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis")), Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let first = sync.refresh(RefreshTrigger::Background, now()).unwrap();
        assert!(!first.throttled);

        let soon = now() + SignedDuration::from_mins(5);
        let second = sync.refresh(RefreshTrigger::Background, soon).unwrap();
        assert!(second.throttled);
        assert_eq!(second.generation, 0);

        let later = now() + SignedDuration::from_mins(16);
        let third = sync.refresh(RefreshTrigger::Background, later).unwrap();
        assert!(!third.throttled);
        assert_eq!(third.origin, SnapshotOrigin::Fresh);
    }

    #[test]
    fn test_forget_cache() {
        let store = MemoryStore::default();
        store.set("@user_projects_cache", payload("Cached")).unwrap();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![]),
            &store,
            &notifier,
            &Config::default(),
        );

        sync.forget_cache().unwrap();
        assert_eq!(store.get("@user_projects_cache").unwrap(), None);
    }

    #[test]
    fn test_overlapping_refreshes_from_threads() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        let sync = ReminderSync::new(
            engine(),
            ScriptedSource::new(vec![Some(payload("Thesis")), Some(payload("Thesis"))]),
            &store,
            &notifier,
            &Config::default(),
        );

        let sync = &sync;
        let reports: Vec<SyncReport> = std::thread::scope(|scope| {
            let handles = [RefreshTrigger::AppActive, RefreshTrigger::Interval]
                .map(|trigger| scope.spawn(move || sync.refresh(trigger, now()).unwrap()));
            handles.map(|h| h.join().unwrap()).into_iter().collect()
        });

        let applied = reports.iter().filter(|r| !r.stale).count();
        assert!(applied >= 1);
        assert_eq!(scheduled_ids(&notifier).len(), 4);
    }
}
