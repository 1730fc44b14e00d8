use std::{path::PathBuf, thread};

use clap::{Parser, Subcommand};
use colored::*;
use jiff::Timestamp;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    engine::{Engine, classify::overall_completion_rate},
    models::wire::{parse_projects, patch_completion},
    notify::{Notifier, json::JsonFileNotifier},
    services::{
        projects::{complete_phase, complete_project, reopen_project, validate_new_project},
        sync::{RefreshTrigger, ReminderSync, Snapshot, SnapshotOrigin},
    },
    source::{JsonFileSource, ProjectSource},
    storage::json::JsonFileStore,
};

mod config;
mod engine;
mod models;
mod notify;
mod services;
mod source;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "lms",
    about = "Project progress and deadline reminders for the Life Management System"
)]
struct Cli {
    /// Exported project list (a `/projects/` response body)
    #[arg(long, global = true, env = "LMS_PROJECTS")]
    projects: Option<PathBuf>,

    /// Directory for the cache and the scheduled reminders
    #[arg(long, global = true, env = "LMS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, env = "LMS_CONFIG")]
    config: Option<PathBuf>,

    /// Use this instant as the current time (e.g. "2025-03-01T09:00:00Z")
    #[arg(long, global = true)]
    now: Option<Timestamp>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the progress of every project
    Progress,

    /// Show early / on-time / late statistics
    Stats,

    /// Show project end dates marked by outcome
    Calendar,

    /// List upcoming reminders
    Reminders {
        /// Show what is currently scheduled instead of recomputing
        #[arg(long)]
        scheduled: bool,
    },

    /// List alerts that have already fired for open projects and phases
    Alerts,

    /// Check every project against the creation rules
    Check,

    /// Cancel one scheduled reminder
    Dismiss {
        /// Reminder id (see `lms reminders --scheduled`)
        id: String,
    },

    /// Mark a project, or one of its phases, as done
    Done {
        /// Project id
        project: String,

        /// Phase position (1-based)
        #[arg(short, long)]
        phase: Option<usize>,
    },

    /// Mark a project as not done
    Reopen {
        /// Project id
        project: String,
    },

    /// Refresh the project list and reschedule reminders
    Sync {
        #[arg(short, long, value_enum, default_value_t = RefreshTrigger::AppActive)]
        trigger: RefreshTrigger,

        /// Drop the cached project list first
        #[arg(long)]
        forget_cache: bool,
    },

    /// Keep reminders up to date, refreshing on the configured interval
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        iterations: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("LMS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exits when neither the source nor the cache has projects
fn require_projects(snapshot: Snapshot) -> Snapshot {
    if snapshot.origin == SnapshotOrigin::Unavailable {
        eprintln!("Error: No project data available");
        eprintln!("\nExport your project list and pass it with --projects, or run `lms sync` once online.");
        std::process::exit(1);
    }
    if snapshot.origin == SnapshotOrigin::Cache {
        println!("{}", "  (showing cached projects)".dimmed());
    }
    snapshot
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let engine = match Engine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lms")
    });

    // Create data directory if it doesn't exist
    std::fs::create_dir_all(&data_dir).unwrap_or_else(|e| {
        eprintln!("Error: Failed to create data directory: {}", e);
        std::process::exit(1);
    });

    let projects_path = cli
        .projects
        .clone()
        .unwrap_or_else(|| data_dir.join("projects.json"));
    let source = JsonFileSource::new(projects_path);
    let store = JsonFileStore::new(data_dir.join("store.json"));
    let notifier = JsonFileNotifier::new(data_dir.join("scheduled.json"));
    let sync = ReminderSync::new(engine, &source, &store, &notifier, &config);

    let now = cli.now.unwrap_or_else(Timestamp::now);
    let today = now.to_zoned(sync.engine().time_zone().clone()).date();

    match cli.command.unwrap_or(Commands::Progress) {
        Commands::Progress => {
            let snapshot = require_projects(sync.snapshot());
            let engine = sync.engine();

            if snapshot.projects.is_empty() {
                println!("No projects yet");
                return;
            }

            ui::render_view_header("Projects", snapshot.projects.len(), "project");
            for project in &snapshot.projects {
                ui::render_progress_line(
                    project,
                    engine.project_progress_percent(project, now),
                    engine.classify(project),
                );
            }
            println!(
                "\n  {} {}%",
                "Overall completion:".bold(),
                overall_completion_rate(&snapshot.projects)
            );
        }
        Commands::Stats => {
            let snapshot = require_projects(sync.snapshot());
            let engine = sync.engine();

            ui::render_stats("Projects", &engine.aggregate_stats(&snapshot.projects));
            ui::render_stats("Phases", &engine.phase_stats(&snapshot.projects));
        }
        Commands::Calendar => {
            let snapshot = require_projects(sync.snapshot());
            let marks = sync.engine().calendar_marks(&snapshot.projects);

            if marks.is_empty() {
                println!("No dated projects");
            } else {
                ui::render_view_header("Deadlines", marks.len(), "date");
                ui::render_calendar(&marks);
            }
        }
        Commands::Reminders { scheduled } => {
            let reminders = if scheduled {
                match notifier.scheduled() {
                    Ok(reminders) => reminders,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                let snapshot = require_projects(sync.snapshot());
                sync.engine().reminders(&snapshot.projects, now)
            };

            if reminders.is_empty() {
                println!("No upcoming reminders");
            } else {
                ui::render_view_header("Reminders", reminders.len(), "reminder");
                for reminder in &reminders {
                    ui::render_reminder_line(reminder, sync.engine().time_zone(), today);
                }
            }
        }
        Commands::Alerts => {
            let snapshot = require_projects(sync.snapshot());
            let alerts = sync.engine().due_alerts(&snapshot.projects, now);

            if alerts.is_empty() {
                println!("No alerts");
            } else {
                ui::render_view_header("Alerts", alerts.len(), "alert");
                for alert in &alerts {
                    ui::render_alert_line(alert, sync.engine().time_zone(), today);
                }
            }
        }
        Commands::Check => {
            let snapshot = require_projects(sync.snapshot());
            ui::render_view_header("Project check", snapshot.projects.len(), "project");

            let mut invalid = 0;
            for project in &snapshot.projects {
                let result = validate_new_project(sync.engine(), project);
                if result.is_err() {
                    invalid += 1;
                }
                ui::render_validation(project, &result);
            }

            if invalid > 0 {
                eprintln!("\n{} of {} projects break the rules", invalid, snapshot.projects.len());
                std::process::exit(1);
            }
        }
        Commands::Dismiss { id } => match notifier.cancel(&id) {
            Ok(()) => println!("{} Dismissed {}", "✓".green(), id),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Done { project, phase } => {
            let mut body = match source.fetch() {
                Ok(body) => body,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut projects = match parse_projects(&body) {
                Ok(projects) => projects,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            let Some(target) = projects.iter_mut().find(|p| p.id.as_str() == project) else {
                eprintln!("Error: Project '{}' not found", project);
                std::process::exit(1);
            };

            match phase {
                Some(0) => {
                    eprintln!("Error: Phase positions start at 1");
                    std::process::exit(1);
                }
                Some(position) => match complete_phase(target, position - 1, now) {
                    Ok(true) => println!(
                        "{} Completed phase {} of '{}'",
                        "✓".green(),
                        position,
                        target.title
                    ),
                    Ok(false) => println!("Phase {} of '{}' is already done", position, target.title),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                },
                None => {
                    let outcome = complete_project(target, now, &config);
                    if outcome.newly_completed {
                        println!(
                            "{} Completed '{}' (+{} points)",
                            "✓".green(),
                            target.title,
                            outcome.reward_points
                        );
                        if outcome.cascaded_phases > 0 {
                            println!("  {} open phases completed with it", outcome.cascaded_phases);
                        }
                    } else {
                        println!("'{}' is already done", target.title);
                    }
                }
            }

            if let Err(e) = patch_completion(&mut body, target) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            if let Err(e) = source.save(&body) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            match sync.refresh(RefreshTrigger::AppActive, now) {
                Ok(report) => ui::render_sync_report(&report),
                Err(e) => error!(error = %e, "reminders were not refreshed"),
            }
        }
        Commands::Reopen { project } => {
            let mut body = match source.fetch() {
                Ok(body) => body,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut projects = match parse_projects(&body) {
                Ok(projects) => projects,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            let Some(target) = projects.iter_mut().find(|p| p.id.as_str() == project) else {
                eprintln!("Error: Project '{}' not found", project);
                std::process::exit(1);
            };

            if !reopen_project(target) {
                println!("'{}' is not done", target.title);
                return;
            }

            if let Err(e) = patch_completion(&mut body, target) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            if let Err(e) = source.save(&body) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            println!("{} Reopened '{}'", "✓".green(), target.title);

            match sync.refresh(RefreshTrigger::AppActive, now) {
                Ok(report) => ui::render_sync_report(&report),
                Err(e) => error!(error = %e, "reminders were not refreshed"),
            }
        }
        Commands::Sync {
            trigger,
            forget_cache,
        } => {
            if forget_cache {
                if let Err(e) = sync.forget_cache() {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }

            match sync.refresh(trigger, now) {
                Ok(report) => ui::render_sync_report(&report),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch { iterations } => {
            let interval = match config.refresh_interval() {
                Ok(interval) => interval,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut trigger = RefreshTrigger::AppActive;
            let mut runs = 0;

            loop {
                let now = cli.now.unwrap_or_else(Timestamp::now);
                match sync.refresh(trigger, now) {
                    Ok(report) => ui::render_sync_report(&report),
                    Err(e) => error!(error = %e, "refresh failed"),
                }

                runs += 1;
                if iterations.is_some_and(|limit| runs >= limit) {
                    break;
                }
                trigger = RefreshTrigger::Interval;
                thread::sleep(interval);
            }
        }
    }
}
