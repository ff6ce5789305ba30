//! Task and task-template models.
//!
//! This module defines the `Task` record as the API serves it, the draft and
//! patch shapes sent when creating or editing one, and reusable templates
//! that pre-fill a new task. Task-specific store operations live here too.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fields::{Priority, Status};
use crate::gateway::client::Query;
use crate::store::{decode, Entity, EntityStore};
use crate::wire::{id_text, null_as_empty, opt_id_text};

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, deserialize_with = "opt_id_text", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "id_text")]
    pub project_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields sent when creating a task.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self { title: title.into(), project_id: project_id.into(), ..Self::default() }
    }
}

/// Partial update. `None` fields are left out of the request; the nested
/// options on `assignee` and `due_date` send an explicit `null` to clear.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_object().map(|m| m.is_empty()))
            .unwrap_or(true)
    }
}

impl EntityStore<Task> {
    /// Remote read of the tasks in one column.
    pub fn by_status(&mut self, status: Status) -> Result<Vec<Task>> {
        self.query(&Query::new().with("status", status.as_str()))
    }

    pub fn by_project(&mut self, project_id: &str) -> Result<Vec<Task>> {
        self.query(&Query::new().with("projectId", project_id))
    }

    /// Move a card to another column.
    pub fn move_to(&mut self, id: &str, status: Status) -> Result<Task> {
        self.update(id, &TaskPatch { status: Some(status), ..TaskPatch::default() })
    }
}

/// One step of a template's checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default, deserialize_with = "id_text")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub order: u32,
}

/// A reusable set of defaults for new tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "id_text")]
    pub project_id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, deserialize_with = "opt_id_text", skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "id_text")]
    pub created_by: String,
    #[serde(default)]
    pub usage_count: u32,
}

impl Entity for TaskTemplate {
    const COLLECTION: &'static str = "task-templates";

    fn id(&self) -> &str {
        &self.id
    }
}

impl TaskTemplate {
    /// Draft of a task pre-filled from this template. The checklist is
    /// appended to the description as unchecked items, in checklist order.
    pub fn to_new_task(&self, title: &str) -> NewTask {
        let mut description = self.description.clone();
        let mut steps: Vec<&ChecklistItem> = self.checklist.iter().collect();
        steps.sort_by_key(|c| c.order);
        if !steps.is_empty() {
            if !description.is_empty() {
                description.push_str("\n\n");
            }
            let lines: Vec<String> = steps.iter().map(|c| format!("- [ ] {}", c.title)).collect();
            description.push_str(&lines.join("\n"));
        }
        NewTask {
            title: title.to_string(),
            description,
            status: Status::Todo,
            priority: self.priority,
            project_id: self.project_id.clone(),
            assignee: self.default_assignee.clone(),
            due_date: None,
            tags: self.tags.clone(),
            estimated_hours: self.estimated_hours,
        }
    }
}

/// Fields sent when creating a template.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub project_id: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
    pub created_by: String,
    pub usage_count: u32,
}

impl NewTemplate {
    /// Checklist items numbered in the order given.
    pub fn checklist_from(titles: &[String]) -> Vec<ChecklistItem> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| ChecklistItem {
                id: (i + 1).to_string(),
                title: t.clone(),
                completed: false,
                order: i as u32,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<ChecklistItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u32>,
}

impl EntityStore<TaskTemplate> {
    pub fn for_project(&mut self, project_id: &str) -> Result<Vec<TaskTemplate>> {
        self.get_list(&Query::new().with("projectId", project_id))
    }

    /// Copy a template via the API's duplicate action and prepend the copy.
    ///
    /// Backends without the action route (a plain json-server file) get a
    /// client-side copy named "<name> (copy)" instead.
    pub fn duplicate(&mut self, id: &str) -> Result<TaskTemplate> {
        match self.post_action(id, "duplicate", &serde_json::json!({})) {
            Ok(value) => {
                let copy: TaskTemplate = decode(value)?;
                self.prepend(copy.clone());
                Ok(copy)
            }
            Err(e) if e.is_not_found() => {
                self.clear_error();
                let source = match self.find(id) {
                    Some(t) => t.clone(),
                    None => self.fetch_by_id(id)?,
                };
                let draft = NewTemplate {
                    name: format!("{} (copy)", source.name),
                    description: source.description,
                    project_id: source.project_id,
                    priority: source.priority,
                    estimated_hours: source.estimated_hours,
                    tags: source.tags,
                    checklist: source.checklist,
                    default_assignee: source.default_assignee,
                    created_by: source.created_by,
                    usage_count: 0,
                };
                self.create(&draft)
            }
            Err(e) => Err(e),
        }
    }

    /// Record one more use of a template.
    pub fn increment_usage(&mut self, id: &str) -> Result<TaskTemplate> {
        let current = match self.find(id) {
            Some(t) => t.usage_count,
            None => self.fetch_by_id(id)?.usage_count,
        };
        let patch = TemplatePatch { usage_count: Some(current + 1), ..TemplatePatch::default() };
        self.update(id, &patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::Gateway;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn gateway() -> Arc<dyn Gateway> {
        Arc::new(LocalGateway::in_memory(json!({
            "tasks": [
                {"id": 1, "title": "Design homepage", "description": "", "status": "todo",
                 "priority": "high", "projectId": 1, "createdAt": "2024-01-01"},
                {"id": 2, "title": "Fix bug", "description": "crash", "status": "done",
                 "priority": "low", "projectId": "2", "createdAt": "2024-02-01", "tags": null}
            ],
            "task-templates": [
                {"id": "1", "name": "Bug report", "description": "Steps:", "projectId": "2",
                 "priority": "urgent", "tags": ["bug"], "usageCount": 4,
                 "checklist": [
                    {"id": "b", "title": "Verify fix", "completed": false, "order": 2},
                    {"id": "a", "title": "Reproduce", "completed": false, "order": 1}
                 ]}
            ]
        })))
    }

    #[test]
    fn test_task_decodes_mixed_id_types() {
        let mut store: EntityStore<Task> = EntityStore::new(gateway());
        store.fetch_all().unwrap();
        let ids: Vec<&str> = store.items().iter().map(|t| t.project_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(store.items()[1].tags.is_empty());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let raw = json!({"id": "9", "title": "x", "status": "blocked", "priority": "low"});
        assert!(serde_json::from_value::<Task>(raw).is_err());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = TaskPatch {
            status: Some(Status::Review),
            due_date: Some(None),
            ..TaskPatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "review", "dueDate": null}));
        assert!(TaskPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_move_to_updates_column() {
        let mut store: EntityStore<Task> = EntityStore::new(gateway());
        store.fetch_all().unwrap();
        let moved = store.move_to("1", Status::InProgress).unwrap();
        assert_eq!(moved.status, Status::InProgress);
        assert_eq!(store.find("1").unwrap().status, Status::InProgress);
    }

    #[test]
    fn test_by_status_queries_remote() {
        let mut store: EntityStore<Task> = EntityStore::new(gateway());
        let done = store.by_status(Status::Done).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "Fix bug");
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_template_to_new_task_appends_checklist_in_order() {
        let mut store: EntityStore<TaskTemplate> = EntityStore::new(gateway());
        store.fetch_all().unwrap();
        let draft = store.items()[0].to_new_task("Login crash");
        assert_eq!(draft.title, "Login crash");
        assert_eq!(draft.priority, Priority::Urgent);
        assert_eq!(draft.project_id, "2");
        assert_eq!(draft.description, "Steps:\n\n- [ ] Reproduce\n- [ ] Verify fix");
        assert_eq!(draft.tags, vec!["bug"]);
    }

    #[test]
    fn test_duplicate_falls_back_to_client_copy() {
        let mut store: EntityStore<TaskTemplate> = EntityStore::new(gateway());
        store.fetch_all().unwrap();
        let copy = store.duplicate("1").unwrap();
        assert_eq!(copy.name, "Bug report (copy)");
        assert_eq!(copy.usage_count, 0);
        assert_eq!(store.items()[0].id, copy.id);
        assert!(store.error().is_none());
    }

    #[test]
    fn test_increment_usage() {
        let mut store: EntityStore<TaskTemplate> = EntityStore::new(gateway());
        let updated = store.increment_usage("1").unwrap();
        assert_eq!(updated.usage_count, 5);
    }
}
