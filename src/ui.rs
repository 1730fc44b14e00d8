use std::collections::BTreeMap;

use colored::*;
use jiff::{Timestamp, civil::Date, tz::TimeZone};

use crate::{
    engine::{
        calendar::CalendarMark,
        classify::{CompletionClass, CompletionStats},
    },
    models::{
        project::Project,
        reminder::{AlertStage, DueAlert, Reminder},
    },
    services::{
        projects::ValidateProjectError,
        sync::{SnapshotOrigin, SyncReport},
    },
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize, noun: &str) {
    let word = if count == 1 {
        noun.to_string()
    } else {
        format!("{}s", noun)
    };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, word);
}

/// Render a section header (e.g., "March 2025", "Phases")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Glyph for a completion class
pub fn get_class_glyph(class: CompletionClass) -> ColoredString {
    match class {
        CompletionClass::Early => "✓".green(),
        CompletionClass::OnTime => "✓".green(),
        CompletionClass::Late => "●".red(),
        CompletionClass::InProgress => "○".normal(),
    }
}

/// Fixed-width bar, e.g. "████████░░"
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = (usize::from(percent.min(100)) * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// One project: glyph and title on the left, bar and percentage right-aligned
pub fn render_progress_line(project: &Project, percent: u8, class: CompletionClass) {
    let terminal_width = get_terminal_width();
    let glyph = get_class_glyph(class);
    let left_section = if project.phases.is_empty() {
        format!("  {}  {}", project.id, project.title)
    } else {
        format!(
            "  {}  {}  ({}/{} phases)",
            project.id,
            project.title,
            project.completed_phase_count(),
            project.phases.len()
        )
    };

    let styled_left = if project.completed {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let bar_width = 20;
    let bar = progress_bar(percent, bar_width);
    let styled_bar = match class {
        CompletionClass::Late => bar.red(),
        CompletionClass::Early | CompletionClass::OnTime => bar.green(),
        CompletionClass::InProgress => bar.blue(),
    };
    let right_section = format!("{:>3}%", percent);

    let left_visible_len = left_section.chars().count() + 3;
    let right_visible_len = bar_width + 2 + right_section.len();
    let total_content = left_visible_len + right_visible_len;

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!(
            "{} {}{}{}  {}",
            styled_left,
            glyph,
            " ".repeat(padding),
            styled_bar,
            right_section
        );
    } else {
        // Not enough space for right alignment
        println!("{} {}  {}  {}", styled_left, glyph, styled_bar, right_section);
    }
}

/// Render the four buckets with their share of the total
pub fn render_stats(title: &str, stats: &CompletionStats) {
    render_section_header(title);
    if stats.total == 0 {
        println!("  {}", "Nothing to count yet".dimmed());
        return;
    }

    let rows = [
        ("Early", CompletionClass::Early),
        ("On time", CompletionClass::OnTime),
        ("Late", CompletionClass::Late),
        ("In progress", CompletionClass::InProgress),
    ];
    for (label, class) in rows {
        let count = stats.count(class);
        let line = format!(
            "  {:<12} {:>4}  {:>3}%",
            label,
            count,
            stats.percentage_of(class)
        );
        if count == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }
    println!("  {:<12} {:>4}", "Total".bold(), stats.total);
}

fn mark_dot(mark: CalendarMark) -> ColoredString {
    let (r, g, b) = hex_to_rgb(mark.color());
    "●".truecolor(r, g, b)
}

fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let channel = |range: std::ops::Range<usize>| {
        hex.trim_start_matches('#')
            .get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    (channel(0..2), channel(2..4), channel(4..6))
}

fn mark_label(mark: CalendarMark) -> &'static str {
    match mark {
        CalendarMark::OnTime => "on time",
        CalendarMark::Late => "late",
        CalendarMark::InProgress => "in progress",
    }
}

/// Marked end dates grouped by month
pub fn render_calendar(marks: &BTreeMap<Date, CalendarMark>) {
    let mut current_month: Option<(i16, i8)> = None;
    for (date, mark) in marks {
        let month = (date.year(), date.month());
        if current_month != Some(month) {
            render_section_header(&date.strftime("%B %Y").to_string());
            current_month = Some(month);
        }
        println!(
            "  {}  {}  {}",
            date.strftime("%a %d"),
            mark_dot(*mark),
            mark_label(*mark).dimmed()
        );
    }
}

/// Format a trigger time relative to `today` (e.g., "Today 08:45", "Mon, Mar 03 08:45")
pub fn format_trigger(trigger_at: Timestamp, time_zone: &TimeZone, today: Date) -> String {
    let zoned = trigger_at.to_zoned(time_zone.clone());
    let date = zoned.date();
    let clock = zoned.strftime("%H:%M");

    if date == today {
        format!("Today {}", clock)
    } else if today.tomorrow().ok() == Some(date) {
        format!("Tomorrow {}", clock)
    } else {
        format!("{} {}", date.strftime("%a, %b %d"), clock)
    }
}

pub fn render_reminder_line(reminder: &Reminder, time_zone: &TimeZone, today: Date) {
    println!(
        "  {:<18}  {}",
        format_trigger(reminder.trigger_at, time_zone, today).cyan(),
        reminder.title.bold()
    );
    println!("  {:<18}  {}", "", reminder.body.dimmed());
}

pub fn render_alert_line(alert: &DueAlert, time_zone: &TimeZone, today: Date) {
    let marker = match alert.stage {
        AlertStage::Upcoming => "!".yellow(),
        AlertStage::Reached => "●".red(),
    };
    println!(
        "  {} {:<18}  {}",
        marker,
        format_trigger(alert.fired_at, time_zone, today).dimmed(),
        alert.body
    );
}

pub fn render_sync_report(report: &SyncReport) {
    if report.throttled {
        println!(
            "{} background refresh skipped, the last one is too recent",
            "·".dimmed()
        );
        return;
    }
    if report.stale {
        println!(
            "{} refresh #{} was overtaken by a newer one",
            "·".dimmed(),
            report.generation
        );
        return;
    }

    let origin = match report.origin {
        SnapshotOrigin::Fresh => "fresh".green(),
        SnapshotOrigin::Cache => "cached".yellow(),
        SnapshotOrigin::Unavailable => "no".red(),
    };
    println!(
        "{} {} ({} data, {} projects): {} reminders scheduled",
        "✓".green(),
        report.trigger,
        origin,
        report.projects,
        report.scheduled
    );
    if report.failed > 0 {
        println!(
            "{} {} reminders could not be scheduled",
            "!".red(),
            report.failed
        );
    }
}

pub fn render_validation(project: &Project, result: &Result<(), ValidateProjectError>) {
    match result {
        Ok(()) => println!("  {}  {}  {}", "✓".green(), project.id, project.title),
        Err(e) => println!(
            "  {}  {}  {}  {}",
            "●".red(),
            project.id,
            project.title.bold(),
            e.to_string().red()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_progress_bar_widths() {
        assert_eq!(progress_bar(0, 10), "░░░░░░░░░░");
        assert_eq!(progress_bar(50, 10), "█████░░░░░");
        assert_eq!(progress_bar(100, 10), "██████████");
        assert_eq!(progress_bar(99, 10), "██████████");
    }

    #[test]
    fn test_format_trigger_relative_days() {
        let today = date(2025, 3, 1);
        let tz = TimeZone::UTC;
        let at = |s: &str| s.parse::<Timestamp>().unwrap();

        assert_eq!(format_trigger(at("2025-03-01T08:45:00Z"), &tz, today), "Today 08:45");
        assert_eq!(format_trigger(at("2025-03-02T16:45:00Z"), &tz, today), "Tomorrow 16:45");
        assert_eq!(
            format_trigger(at("2025-03-03T08:45:00Z"), &tz, today),
            "Mon, Mar 03 08:45"
        );
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#10b981"), (0x10, 0xb9, 0x81));
        assert_eq!(hex_to_rgb("bogus"), (0, 0, 0));
    }
}
