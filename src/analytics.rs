//! Project analytics.
//!
//! The API computes these under `analytics/projects/{id}`. Backends that
//! lack those routes get the same report computed from the task list.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::fields::{Priority, Status};
use crate::gateway::client::{Gateway, Query};
use crate::stats::completion_rate;
use crate::store::decode;
use crate::task::Task;
use crate::wire::parse_timestamp;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskAnalytics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    /// Hours from creation to the last update of finished tasks.
    pub avg_completion_time: f64,
    pub tasks_overdue: usize,
    pub tasks_by_status: Vec<StatusStats>,
    pub tasks_by_priority: Vec<PriorityStats>,
    pub tasks_by_assignee: Vec<AssigneeStats>,
    pub weekly_trend: Vec<WeeklyTrend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusStats {
    pub status: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityStats {
    pub priority: String,
    pub count: usize,
    pub avg_completion_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssigneeStats {
    pub assignee_id: String,
    pub assignee_name: String,
    pub tasks_assigned: usize,
    pub tasks_completed: usize,
    pub completion_rate: f64,
    pub avg_completion_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyTrend {
    pub week: String,
    pub created: usize,
    pub completed: usize,
    pub in_progress: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamProductivity {
    pub user_id: String,
    pub user_name: String,
    pub tasks_completed: usize,
    pub avg_completion_time: f64,
    pub current_workload: usize,
    pub productivity_score: f64,
    pub trend: String,
}

/// Headline numbers for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetrics {
    pub project_id: String,
    pub project_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    pub average_completion_time: f64,
    /// `good`, `warning` or `critical`.
    pub health: String,
}

impl ProjectMetrics {
    /// Summary of a computed report. A project is critical when more than a
    /// quarter of its tasks are overdue and in warning with any overdue.
    pub fn from_report(project_id: &str, project_name: &str, report: &TaskAnalytics) -> Self {
        let health = if report.tasks_overdue * 4 > report.total_tasks {
            "critical"
        } else if report.tasks_overdue > 0 {
            "warning"
        } else {
            "good"
        };
        Self {
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
            total_tasks: report.total_tasks,
            completed_tasks: report.completed_tasks,
            completion_rate: report.completion_rate,
            average_completion_time: report.avg_completion_time,
            health: health.to_string(),
        }
    }
}

/// Read-only client for the analytics routes.
pub struct Analytics {
    gateway: Arc<dyn Gateway>,
}

impl Analytics {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Server report for a project, or one computed from its tasks if the
    /// backend has no analytics routes.
    pub fn project(&self, project_id: &str, today: NaiveDate) -> Result<TaskAnalytics> {
        match self.gateway.get(&format!("analytics/projects/{project_id}"), &Query::new()) {
            Ok(v) => decode(v),
            Err(e) if e.is_not_found() => {
                debug!(project_id, "no analytics route, computing locally");
                let tasks = self.project_tasks(project_id)?;
                Ok(TaskAnalytics::from_tasks(&tasks, today))
            }
            Err(e) => Err(e),
        }
    }

    pub fn team_productivity(&self, project_id: &str) -> Result<Vec<TeamProductivity>> {
        match self
            .gateway
            .get(&format!("analytics/projects/{project_id}/team-productivity"), &Query::new())
        {
            Ok(v) => decode(v),
            Err(e) if e.is_not_found() => {
                let tasks = self.project_tasks(project_id)?;
                Ok(team_from_tasks(&tasks))
            }
            Err(e) => Err(e),
        }
    }

    pub fn metrics(&self, project_id: &str, project_name: &str, today: NaiveDate) -> Result<ProjectMetrics> {
        match self.gateway.get(&format!("analytics/projects/{project_id}/metrics"), &Query::new()) {
            Ok(v) => decode(v),
            Err(e) if e.is_not_found() => {
                let tasks = self.project_tasks(project_id)?;
                let report = TaskAnalytics::from_tasks(&tasks, today);
                Ok(ProjectMetrics::from_report(project_id, project_name, &report))
            }
            Err(e) => Err(e),
        }
    }

    /// Raw `completion-trend` series; the shape is server defined.
    pub fn completion_trend(&self, project_id: &str, days: u32) -> Result<Value> {
        self.gateway.get(
            &format!("analytics/projects/{project_id}/completion-trend"),
            &Query::new().with("days", days.to_string()),
        )
    }

    fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        decode(self.gateway.get("tasks", &Query::new().with("projectId", project_id))?)
    }
}

/// Hours between creation and last update, for finished tasks only.
fn completion_hours(task: &Task) -> Option<f64> {
    if task.status != Status::Done {
        return None;
    }
    let start = parse_timestamp(&task.created_at)?;
    let end = parse_timestamp(task.updated_at.as_deref()?)?;
    Some((end - start).num_minutes().max(0) as f64 / 60.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.status != Status::Done
        && task
            .due_date
            .as_deref()
            .and_then(parse_timestamp)
            .map(|due| due.date_naive() < today)
            .unwrap_or(false)
}

impl TaskAnalytics {
    pub fn from_tasks(tasks: &[Task], today: NaiveDate) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.status == Status::Done).count();

        let tasks_by_status = Status::ALL
            .iter()
            .map(|s| {
                let count = tasks.iter().filter(|t| t.status == *s).count();
                StatusStats { status: s.as_str().to_string(), count, percentage: completion_rate(count, total) }
            })
            .collect();

        let tasks_by_priority = Priority::ALL
            .iter()
            .map(|p| {
                let of_priority: Vec<&Task> = tasks.iter().filter(|t| t.priority == *p).collect();
                PriorityStats {
                    priority: p.as_str().to_string(),
                    count: of_priority.len(),
                    avg_completion_time: mean(of_priority.iter().filter_map(|t| completion_hours(t))),
                }
            })
            .collect();

        let mut by_assignee: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
        for t in tasks {
            if let Some(a) = t.assignee.as_deref() {
                by_assignee.entry(a).or_default().push(t);
            }
        }
        let tasks_by_assignee = by_assignee
            .into_iter()
            .map(|(id, list)| {
                let done = list.iter().filter(|t| t.status == Status::Done).count();
                AssigneeStats {
                    assignee_id: id.to_string(),
                    assignee_name: id.to_string(),
                    tasks_assigned: list.len(),
                    tasks_completed: done,
                    completion_rate: completion_rate(done, list.len()),
                    avg_completion_time: mean(list.iter().filter_map(|t| completion_hours(t))),
                }
            })
            .collect();

        let mut weeks: BTreeMap<String, WeeklyTrend> = BTreeMap::new();
        for t in tasks {
            let Some(created) = parse_timestamp(&t.created_at) else { continue };
            let iso = created.iso_week();
            let week = format!("{}-W{:02}", iso.year(), iso.week());
            let entry = weeks.entry(week.clone()).or_insert_with(|| WeeklyTrend { week, ..WeeklyTrend::default() });
            entry.created += 1;
            match t.status {
                Status::Done => entry.completed += 1,
                Status::InProgress => entry.in_progress += 1,
                _ => {}
            }
        }

        TaskAnalytics {
            total_tasks: total,
            completed_tasks: completed,
            completion_rate: completion_rate(completed, total),
            avg_completion_time: mean(tasks.iter().filter_map(completion_hours)),
            tasks_overdue: tasks.iter().filter(|t| is_overdue(t, today)).count(),
            tasks_by_status,
            tasks_by_priority,
            tasks_by_assignee,
            weekly_trend: weeks.into_values().collect(),
        }
    }
}

/// Per-assignee workload summary from a task list.
pub fn team_from_tasks(tasks: &[Task]) -> Vec<TeamProductivity> {
    let mut by_user: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
    for t in tasks {
        if let Some(a) = t.assignee.as_deref() {
            by_user.entry(a).or_default().push(t);
        }
    }
    by_user
        .into_iter()
        .map(|(id, list)| {
            let done = list.iter().filter(|t| t.status == Status::Done).count();
            TeamProductivity {
                user_id: id.to_string(),
                user_name: id.to_string(),
                tasks_completed: done,
                avg_completion_time: mean(list.iter().filter_map(|t| completion_hours(t))),
                current_workload: list.len() - done,
                productivity_score: completion_rate(done, list.len()),
                trend: "stable".to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;

    fn gateway() -> Arc<dyn Gateway> {
        Arc::new(LocalGateway::in_memory(json!({
            "tasks": [
                {"id": 1, "title": "a", "status": "done", "priority": "high", "projectId": "1",
                 "assignee": "1", "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-02T00:00:00Z"},
                {"id": 2, "title": "b", "status": "in-progress", "priority": "low", "projectId": "1",
                 "assignee": "2", "createdAt": "2024-01-03T00:00:00Z", "dueDate": "2024-01-05"},
                {"id": 3, "title": "c", "status": "todo", "priority": "low", "projectId": "1",
                 "createdAt": "2024-01-10T00:00:00Z", "dueDate": "2024-03-01"},
                {"id": 4, "title": "d", "status": "todo", "priority": "low", "projectId": "2",
                 "createdAt": "2024-01-10T00:00:00Z"}
            ]
        })))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    #[test]
    fn test_local_fallback_report() {
        let report = Analytics::new(gateway()).project("1", today()).unwrap();
        assert_eq!(report.total_tasks, 3);
        assert_eq!(report.completed_tasks, 1);
        assert!((report.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.avg_completion_time, 24.0);
        assert_eq!(report.tasks_overdue, 1);
        assert_eq!(report.tasks_by_status.len(), 4);
        assert_eq!(report.tasks_by_assignee.len(), 2);
        assert_eq!(report.weekly_trend.len(), 2);
    }

    #[test]
    fn test_empty_project_has_zero_rates() {
        let report = TaskAnalytics::from_tasks(&[], today());
        assert_eq!(report.completion_rate, 0.0);
        assert_eq!(report.avg_completion_time, 0.0);
        assert!(report.tasks_by_status.iter().all(|s| s.percentage == 0.0));
    }

    #[test]
    fn test_metrics_health_from_overdue_share() {
        let m = Analytics::new(gateway()).metrics("1", "Website", today()).unwrap();
        assert_eq!(m.project_name, "Website");
        assert_eq!(m.total_tasks, 3);
        // One of three tasks overdue.
        assert_eq!(m.health, "critical");

        let calm = TaskAnalytics { total_tasks: 10, tasks_overdue: 1, ..TaskAnalytics::default() };
        assert_eq!(ProjectMetrics::from_report("2", "x", &calm).health, "warning");
    }

    #[test]
    fn test_team_from_tasks_counts_workload() {
        let team = Analytics::new(gateway()).team_productivity("1").unwrap();
        assert_eq!(team.len(), 2);
        assert_eq!(team[0].user_id, "1");
        assert_eq!(team[0].tasks_completed, 1);
        assert_eq!(team[1].current_workload, 1);
    }
}
