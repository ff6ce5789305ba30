//! Read-only projections behind the dashboard and the board.

use std::cmp::Reverse;

use crate::fields::{Priority, Status};
use crate::task::Task;
use crate::wire::parse_timestamp;

/// How many tasks the "recent" list shows.
pub const RECENT_COUNT: usize = 5;

/// `part / total` as a percentage; zero when `total` is zero.
pub fn completion_rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DashboardStats {
    pub total: usize,
    pub done: usize,
    pub in_progress: usize,
    pub projects: usize,
    /// Percent of tasks done, 0.0 for an empty collection.
    pub completion_rate: f64,
}

impl DashboardStats {
    pub fn compute(tasks: &[Task], project_count: usize) -> Self {
        let done = tasks.iter().filter(|t| t.status == Status::Done).count();
        let in_progress = tasks.iter().filter(|t| t.status == Status::InProgress).count();
        Self {
            total: tasks.len(),
            done,
            in_progress,
            projects: project_count,
            completion_rate: completion_rate(done, tasks.len()),
        }
    }
}

/// Tasks per status, in board order.
pub fn status_counts(tasks: &[Task]) -> [(Status, usize); 4] {
    Status::ALL.map(|s| (s, tasks.iter().filter(|t| t.status == s).count()))
}

/// Tasks per priority, low to urgent.
pub fn priority_counts(tasks: &[Task]) -> [(Priority, usize); 4] {
    Priority::ALL.map(|p| (p, tasks.iter().filter(|t| t.priority == p).count()))
}

/// One board column.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub status: Status,
    pub tasks: Vec<&'a Task>,
}

/// Partition tasks into the four status columns, keeping input order
/// inside each column.
pub fn kanban_columns<'a, I>(tasks: I) -> Vec<Column<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut columns: Vec<Column<'a>> =
        Status::ALL.iter().map(|&status| Column { status, tasks: Vec::new() }).collect();
    for task in tasks {
        if let Some(col) = columns.iter_mut().find(|c| c.status == task.status) {
            col.tasks.push(task);
        }
    }
    columns
}

/// The newest tasks by creation time, at most [`RECENT_COUNT`].
///
/// Works on a copy; the input order is untouched. Unparseable timestamps
/// sort last.
pub fn recent_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by_key(|t| Reverse(parse_timestamp(&t.created_at)));
    sorted.truncate(RECENT_COUNT);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: Status, priority: Priority, created: &str) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": id, "title": format!("t{id}"), "status": status, "priority": priority,
            "projectId": "1", "createdAt": created
        }))
        .unwrap()
    }

    fn sample() -> Vec<Task> {
        vec![
            task("1", Status::Todo, Priority::High, "2024-01-01"),
            task("2", Status::Done, Priority::Low, "2024-02-01"),
        ]
    }

    #[test]
    fn test_completion_rate_half() {
        let stats = DashboardStats::compute(&sample(), 2);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.in_progress, 0);
        assert_eq!(stats.completion_rate, 50.0);
    }

    #[test]
    fn test_completion_rate_empty_is_zero() {
        let stats = DashboardStats::compute(&[], 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(!stats.completion_rate.is_nan());
    }

    #[test]
    fn test_kanban_columns_fixed_order() {
        let mut tasks = sample();
        tasks.push(task("3", Status::Todo, Priority::Low, "2024-03-01"));
        let cols = kanban_columns(&tasks);
        assert_eq!(cols.iter().map(|c| c.status).collect::<Vec<_>>(), Status::ALL.to_vec());
        let todo: Vec<&str> = cols[0].tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(todo, vec!["1", "3"]);
        assert!(cols[1].tasks.is_empty());
        assert!(cols[2].tasks.is_empty());
        assert_eq!(cols[3].tasks.len(), 1);
    }

    #[test]
    fn test_recent_tasks_newest_first_capped() {
        let tasks: Vec<Task> = (1..=7)
            .map(|d| task(&d.to_string(), Status::Todo, Priority::Low, &format!("2024-01-0{d}T10:00:00Z")))
            .collect();
        let recent = recent_tasks(&tasks);
        let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "6", "5", "4", "3"]);
        assert_eq!(tasks[0].id, "1");
    }

    #[test]
    fn test_recent_tasks_orders_same_day_by_time() {
        let tasks = vec![
            task("morning", Status::Todo, Priority::Low, "2024-01-01T09:00:00"),
            task("evening", Status::Todo, Priority::Low, "2024-01-01T18:00:00"),
        ];
        let ids: Vec<&str> = recent_tasks(&tasks).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["evening", "morning"]);
    }

    #[test]
    fn test_counts() {
        let tasks = sample();
        assert_eq!(status_counts(&tasks)[3], (Status::Done, 1));
        assert_eq!(priority_counts(&tasks)[2], (Priority::High, 1));
    }
}
