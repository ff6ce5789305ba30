//! Terminal formatting helpers and due-date input parsing.
//!
//! Everything here is presentation: turning tasks into table rows, dates
//! into "in 3d" / "2d late", and human input like "next friday" into an
//! ISO date the API accepts.

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::fields::SortKey;
use crate::task::Task;
use crate::wire::parse_timestamp;

/// Normalise a tag by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalise each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

/// Parse human-readable due date input relative to the local date.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday", "next monday", "this friday", ...
/// - "weekend", "eow" / "end of week", "eom" / "end of month"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD"
pub fn parse_due_input(s: &str) -> Option<NaiveDate> {
    parse_due_input_from(s, Local::now().date_naive())
}

pub fn parse_due_input_from(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(start_end_of_week(today).1),
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 { (today.year() + 1, 1) } else { (today.year(), today.month() + 1) };
            return NaiveDate::from_ymd_opt(year, month, 1).map(|d| d - Duration::days(1));
        }
        "this weekend" | "weekend" => {
            let days_until_saturday = (5 + 7 - today.weekday().num_days_from_monday()) % 7;
            return Some(today + Duration::days(days_until_saturday as i64));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        let split = rest.char_indices().last().map_or(0, |(i, _)| i);
        let (num, unit) = rest.split_at(split);
        if let Ok(n) = num.trim().parse::<i64>() {
            match unit {
                "d" => return Some(today + Duration::days(n)),
                "w" => return Some(today + Duration::weeks(n)),
                // Approximate: 30 days per month
                "m" => return Some(today + Duration::days(n * 30)),
                _ => {}
            }
        }
    }

    const WEEKDAYS: [(&str, &str, u32); 7] = [
        ("monday", "mon", 0),
        ("tuesday", "tue", 1),
        ("wednesday", "wed", 2),
        ("thursday", "thu", 3),
        ("friday", "fri", 4),
        ("saturday", "sat", 5),
        ("sunday", "sun", 6),
    ];
    let (next_week, day) = match s.strip_prefix("next ") {
        Some(d) => (true, d),
        None => (false, s.strip_prefix("this ").unwrap_or(&s)),
    };
    if let Some(&(_, _, target)) = WEEKDAYS.iter().find(|(long, short, _)| day == *long || day == *short) {
        let current = today.weekday().num_days_from_monday();
        let ahead = (target + 7 - current) % 7;
        let ahead = if next_week { ahead + 7 } else { ahead };
        return Some(today + Duration::days(ahead as i64));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Monday and Sunday of the ISO week containing `today`.
pub fn start_end_of_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<&str>, today: NaiveDate) -> String {
    let Some(raw) = due else {
        return "-".into();
    };
    let Some(d) = parse_timestamp(raw).map(|dt| dt.date_naive()) else {
        return raw.to_string();
    };
    let days = (d - today).num_days();
    match days {
        0 => "today".into(),
        1 => "tomorrow".into(),
        n if n > 1 => format!("in {n}d"),
        n => format!("{}d late", -n),
    }
}

/// Truncate a string to a maximum width, adding an ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Order a list for printing. `SortKey::Source` leaves it untouched.
pub fn sort_tasks(tasks: &mut [&Task], key: SortKey) {
    match key {
        SortKey::Source => {}
        SortKey::Due => tasks.sort_by_key(|t| {
            // Undated tasks go last.
            (t.due_date.as_deref().and_then(parse_timestamp).is_none(), t.due_date.as_deref().and_then(parse_timestamp))
        }),
        SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
        SortKey::Created => tasks.sort_by_key(|t| std::cmp::Reverse(parse_timestamp(&t.created_at))),
    }
}

/// Print tasks as a fixed-width table.
///
/// `project_name` maps a project id to what the Project column shows.
pub fn print_task_table(tasks: &[&Task], project_name: &dyn Fn(&str) -> String) {
    println!(
        "{:<6} {:<12} {:<8} {:<10} {:<14} {:<10} {}",
        "ID", "Status", "Pri", "Due", "Project", "Assignee", "Title [tags]"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let tags = if t.tags.is_empty() { String::new() } else { format!(" [{}]", t.tags.join(",")) };
        println!(
            "{:<6} {:<12} {:<8} {:<10} {:<14} {:<10} {}{}",
            truncate(&t.id, 6),
            t.status.label(),
            t.priority.label(),
            format_due_relative(t.due_date.as_deref(), today),
            truncate(&project_name(&t.project_id), 14),
            truncate(t.assignee.as_deref().unwrap_or("-"), 10),
            t.title,
            tags
        );
    }
}

/// A text progress bar, e.g. `[#####-----]` for 50%.
pub fn bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
