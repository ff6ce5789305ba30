//! Client-side task search and filtering.
//!
//! [`SearchEngine`] holds the full task collection and the active
//! [`FilterCriteria`], and derives the filtered view from the two. The view
//! is a pure function of its inputs: a stable, order preserving filter that
//! never fails. Unknown status strings, malformed dates and dangling
//! references simply match nothing.
//!
//! ```text
//!   set_tasks ──► Signal<Vec<Task>> ──┐
//!                                     ├──► filtered_view() (memoized)
//!   update_filters ► Signal<Criteria>─┘
//! ```
//!
//! The memo is keyed by the version pair of the two signals, so any change
//! to either input is picked up by the next read without explicit
//! invalidation.

use std::cell::RefCell;

use crate::gateway::client::Query;
use crate::signal::{Signal, SubscriptionId};
use crate::task::Task;

/// Active search constraints. Empty text means "no constraint".
///
/// Fields hold unvalidated text so that a status or priority typed by the
/// user is compared as-is instead of being rejected up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub query: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project_id: Option<String>,
    pub assignee: Option<String>,
    /// Inclusive lower bound on `createdAt`, as an ISO date or timestamp.
    pub date_from: Option<String>,
    /// Inclusive upper bound on `createdAt`.
    pub date_to: Option<String>,
}

fn set(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.active_count() == 0
    }

    /// Number of set constraints, not counting the free-text query.
    pub fn active_count(&self) -> usize {
        [&self.status, &self.priority, &self.project_id, &self.assignee, &self.date_from, &self.date_to]
            .into_iter()
            .filter(|f| set(f).is_some())
            .count()
    }

    /// Gateway parameters for the equivalent server-side search.
    ///
    /// Date bounds have no server equivalent and are left for the caller to
    /// apply locally.
    pub fn to_query(&self) -> Query {
        Query::new()
            .with("q", self.query.trim())
            .with_opt("status", set(&self.status))
            .with_opt("priority", set(&self.priority))
            .with_opt("projectId", set(&self.project_id))
            .with_opt("assignee", set(&self.assignee))
    }

    /// Apply a patch field by field.
    pub fn merge(&mut self, patch: FilterPatch) {
        if let Some(q) = patch.query {
            self.query = q;
        }
        let pairs = [
            (&mut self.status, patch.status),
            (&mut self.priority, patch.priority),
            (&mut self.project_id, patch.project_id),
            (&mut self.assignee, patch.assignee),
            (&mut self.date_from, patch.date_from),
            (&mut self.date_to, patch.date_to),
        ];
        for (field, change) in pairs {
            if let Some(value) = change {
                *field = value;
            }
        }
    }
}

/// A partial criteria update.
///
/// The outer `Option` says whether the patch touches a field at all; the
/// inner one is the new value, `None` clearing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub query: Option<String>,
    pub status: Option<Option<String>>,
    pub priority: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
    pub assignee: Option<Option<String>>,
    pub date_from: Option<Option<String>>,
    pub date_to: Option<Option<String>>,
}

impl FilterPatch {
    pub fn query(q: impl Into<String>) -> Self {
        Self { query: Some(q.into()), ..Self::default() }
    }

    pub fn status(s: Option<&str>) -> Self {
        Self { status: Some(s.map(str::to_string)), ..Self::default() }
    }

    pub fn priority(p: Option<&str>) -> Self {
        Self { priority: Some(p.map(str::to_string)), ..Self::default() }
    }

    pub fn project(p: Option<&str>) -> Self {
        Self { project_id: Some(p.map(str::to_string)), ..Self::default() }
    }

    pub fn assignee(a: Option<&str>) -> Self {
        Self { assignee: Some(a.map(str::to_string)), ..Self::default() }
    }

    pub fn date_range(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            date_from: Some(from.map(str::to_string)),
            date_to: Some(to.map(str::to_string)),
            ..Self::default()
        }
    }
}

/// Whether `task` satisfies every set constraint in `criteria`.
pub fn matches(task: &Task, criteria: &FilterCriteria) -> bool {
    let query = criteria.query.to_lowercase();
    matches_folded(task, criteria, &query)
}

fn matches_folded(task: &Task, c: &FilterCriteria, query: &str) -> bool {
    let text = query.is_empty()
        || task.title.to_lowercase().contains(query)
        || task.description.to_lowercase().contains(query);
    let status = set(&c.status).map_or(true, |s| task.status.as_str() == s);
    let priority = set(&c.priority).map_or(true, |p| task.priority.as_str() == p);
    let project = set(&c.project_id).map_or(true, |p| task.project_id == p);
    let assignee = set(&c.assignee).map_or(true, |a| task.assignee.as_deref() == Some(a));
    // ISO timestamps order lexically.
    let from = set(&c.date_from).map_or(true, |d| task.created_at.as_str() >= d);
    let to = set(&c.date_to).map_or(true, |d| task.created_at.as_str() <= d);
    text && status && priority && project && assignee && from && to
}

/// One-shot filter of a slice, preserving order.
pub fn filter_tasks<'a>(tasks: &'a [Task], criteria: &FilterCriteria) -> Vec<&'a Task> {
    let query = criteria.query.to_lowercase();
    tasks.iter().filter(|t| matches_folded(t, criteria, &query)).collect()
}

#[derive(Debug, Default)]
struct Memo {
    key: Option<(u64, u64)>,
    indices: Vec<usize>,
}

/// Task collection plus criteria, with a lazily recomputed filtered view.
#[derive(Debug, Default)]
pub struct SearchEngine {
    tasks: Signal<Vec<Task>>,
    criteria: Signal<FilterCriteria>,
    memo: RefCell<Memo>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the collection wholesale.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks.set(tasks);
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.get()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        self.criteria.get()
    }

    /// Merge a partial update into the criteria. Fields the patch leaves
    /// out are kept.
    pub fn update_filters(&mut self, patch: FilterPatch) {
        self.criteria.update(|c| c.merge(patch));
    }

    /// Clear every constraint but keep the free-text query.
    pub fn reset_filters(&mut self) {
        let query = self.criteria.get().query.clone();
        self.criteria.set(FilterCriteria { query, ..FilterCriteria::default() });
    }

    /// Clear everything, the query included.
    pub fn clear_filters(&mut self) {
        self.criteria.set(FilterCriteria::default());
    }

    pub fn active_filter_count(&self) -> usize {
        self.criteria.get().active_count()
    }

    /// Tasks satisfying the current criteria, in collection order.
    ///
    /// Recomputed only when the tasks or the criteria changed since the
    /// previous read.
    pub fn filtered_view(&self) -> Vec<&Task> {
        let key = (self.tasks.version(), self.criteria.version());
        let mut memo = self.memo.borrow_mut();
        if memo.key != Some(key) {
            let criteria = self.criteria.get();
            let query = criteria.query.to_lowercase();
            memo.indices = self
                .tasks
                .get()
                .iter()
                .enumerate()
                .filter(|(_, t)| matches_folded(t, criteria, &query))
                .map(|(i, _)| i)
                .collect();
            memo.key = Some(key);
        }
        let tasks = self.tasks.get();
        memo.indices.iter().map(|&i| &tasks[i]).collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_view().len()
    }

    /// Listen for criteria changes, e.g. to persist or echo them.
    pub fn subscribe_criteria(&mut self, listener: impl FnMut(&FilterCriteria) + 'static) -> SubscriptionId {
        self.criteria.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Priority, Status};

    fn task(id: &str, title: &str, status: Status, priority: Priority, project: &str, created: &str) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status,
            priority,
            assignee: None,
            project_id: project.into(),
            created_at: created.into(),
            updated_at: None,
            due_date: None,
            tags: Vec::new(),
            estimated_hours: None,
            actual_hours: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("1", "Design homepage", Status::Todo, Priority::High, "1", "2024-01-01"),
            task("2", "Fix bug", Status::Done, Priority::Low, "2", "2024-02-01"),
        ]
    }

    fn engine() -> SearchEngine {
        let mut e = SearchEngine::new();
        e.set_tasks(sample());
        e
    }

    fn ids(view: &[&Task]) -> Vec<String> {
        view.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_query_matches_title_case_insensitively() {
        let mut e = engine();
        e.update_filters(FilterPatch::query("design"));
        assert_eq!(ids(&e.filtered_view()), vec!["1"]);
    }

    #[test]
    fn test_query_matches_description() {
        let mut tasks = sample();
        tasks[1].description = "Crash on LOGIN page".into();
        let c = FilterCriteria { query: "login".into(), ..FilterCriteria::default() };
        assert_eq!(ids(&filter_tasks(&tasks, &c)), vec!["2"]);
    }

    #[test]
    fn test_status_filter() {
        let mut e = engine();
        e.update_filters(FilterPatch::status(Some("done")));
        assert_eq!(ids(&e.filtered_view()), vec!["2"]);
    }

    #[test]
    fn test_unmatched_status_is_empty_not_error() {
        let mut e = engine();
        e.update_filters(FilterPatch::status(Some("review")));
        assert!(e.filtered_view().is_empty());
        e.update_filters(FilterPatch::status(Some("not-a-status")));
        assert!(e.filtered_view().is_empty());
    }

    #[test]
    fn test_date_from_excludes_earlier_tasks() {
        let mut e = engine();
        e.update_filters(FilterPatch::date_range(Some("2024-01-15"), None));
        assert_eq!(ids(&e.filtered_view()), vec!["2"]);
    }

    #[test]
    fn test_date_to_is_inclusive() {
        let c = FilterCriteria { date_to: Some("2024-01-01".into()), ..FilterCriteria::default() };
        assert_eq!(ids(&filter_tasks(&sample(), &c)), vec!["1"]);
    }

    #[test]
    fn test_malformed_date_bound_never_panics() {
        let c = FilterCriteria { date_from: Some("next tuesday".into()), ..FilterCriteria::default() };
        assert!(filter_tasks(&sample(), &c).is_empty());
    }

    #[test]
    fn test_project_and_assignee_compare_as_text() {
        let mut tasks = sample();
        tasks[0].assignee = Some("7".into());
        let c = FilterCriteria {
            project_id: Some("1".into()),
            assignee: Some("7".into()),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &c)), vec!["1"]);
        let c = FilterCriteria { assignee: Some("8".into()), ..FilterCriteria::default() };
        assert!(filter_tasks(&tasks, &c).is_empty());
    }

    #[test]
    fn test_empty_criteria_is_identity() {
        let e = engine();
        assert_eq!(ids(&e.filtered_view()), vec!["1", "2"]);
        let blank = FilterCriteria { status: Some(String::new()), ..FilterCriteria::default() };
        assert_eq!(filter_tasks(&sample(), &blank).len(), 2);
    }

    #[test]
    fn test_view_is_ordered_subsequence() {
        let tasks: Vec<Task> = (0..20)
            .map(|i| {
                let status = Status::ALL[i % 4];
                task(&i.to_string(), &format!("task {i}"), status, Priority::Medium, "1", "2024-01-01")
            })
            .collect();
        let c = FilterCriteria { status: Some("review".into()), ..FilterCriteria::default() };
        let view = filter_tasks(&tasks, &c);
        let positions: Vec<usize> = view
            .iter()
            .map(|v| tasks.iter().position(|t| t.id == v.id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn test_update_filters_merges_field_wise() {
        let mut e = engine();
        e.update_filters(FilterPatch {
            query: Some("fix".into()),
            status: Some(Some("done".into())),
            ..FilterPatch::default()
        });
        e.update_filters(FilterPatch::priority(Some("low")));
        let c = e.criteria();
        assert_eq!(c.query, "fix");
        assert_eq!(c.status.as_deref(), Some("done"));
        assert_eq!(c.priority.as_deref(), Some("low"));

        // Explicit clear only touches the named field.
        e.update_filters(FilterPatch::status(None));
        assert_eq!(e.criteria().status, None);
        assert_eq!(e.criteria().priority.as_deref(), Some("low"));
    }

    #[test]
    fn test_reset_keeps_only_query() {
        let mut e = engine();
        e.update_filters(FilterPatch {
            query: Some("design".into()),
            status: Some(Some("done".into())),
            project_id: Some(Some("2".into())),
            ..FilterPatch::default()
        });
        assert!(e.filtered_view().is_empty());

        e.reset_filters();

        assert_eq!(*e.criteria(), FilterCriteria { query: "design".into(), ..FilterCriteria::default() });
        assert_eq!(ids(&e.filtered_view()), vec!["1"]);
        assert_eq!(e.active_filter_count(), 0);
    }

    #[test]
    fn test_clear_drops_query_too() {
        let mut e = engine();
        e.update_filters(FilterPatch::query("design"));
        e.clear_filters();
        assert!(e.criteria().is_empty());
        assert_eq!(e.filtered_count(), 2);
    }

    #[test]
    fn test_set_tasks_twice_gives_same_view() {
        let mut e = engine();
        e.update_filters(FilterPatch::priority(Some("high")));
        e.set_tasks(sample());
        let first = ids(&e.filtered_view());
        e.set_tasks(sample());
        assert_eq!(ids(&e.filtered_view()), first);
    }

    #[test]
    fn test_view_tracks_collection_changes() {
        let mut e = engine();
        e.update_filters(FilterPatch::status(Some("todo")));
        assert_eq!(e.filtered_count(), 1);
        let mut tasks = sample();
        tasks.push(task("3", "Write docs", Status::Todo, Priority::Low, "1", "2024-03-01"));
        e.set_tasks(tasks);
        assert_eq!(ids(&e.filtered_view()), vec!["1", "3"]);
    }

    #[test]
    fn test_active_count_and_query_params() {
        let c = FilterCriteria {
            query: " bug ".into(),
            status: Some("done".into()),
            project_id: Some("2".into()),
            date_from: Some("2024-01-01".into()),
            priority: Some(String::new()),
            ..FilterCriteria::default()
        };
        assert_eq!(c.active_count(), 3);
        let q = c.to_query();
        assert_eq!(q.get("q"), Some("bug"));
        assert_eq!(q.get("projectId"), Some("2"));
        assert_eq!(q.get("priority"), None);
        assert_eq!(q.get("date_from"), None);
    }
}
