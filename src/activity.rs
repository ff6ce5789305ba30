//! Audit trail of what happened to each task.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::fields::ActivityType;
use crate::gateway::client::Query;
use crate::store::{Entity, EntityStore};
use crate::wire::{id_text, opt_id_text, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(deserialize_with = "id_text")]
    pub task_id: String,
    #[serde(deserialize_with = "id_text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "opt_id_text", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub action: ActivityType,
    /// Free-form `{before, after, field}` payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub description: String,
}

impl Entity for Activity {
    const COLLECTION: &'static str = "activities";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub task_id: String,
    pub user_id: String,
    pub action: ActivityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub description: String,
}

impl NewActivity {
    /// Entry for one field edit, with the before/after payload filled in.
    pub fn field_change(task_id: &str, user_id: &str, field: &str, before: &str, after: &str) -> Self {
        let action = match field {
            "status" => ActivityType::StatusChanged,
            "priority" => ActivityType::PriorityChanged,
            "assignee" => ActivityType::Assigned,
            _ => ActivityType::Updated,
        };
        Self {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            action,
            details: Some(serde_json::json!({ "field": field, "before": before, "after": after })),
            description: format!("changed {field} from {before} to {after}"),
        }
    }
}

/// Newest first. Unparseable timestamps sort last.
pub fn sort_newest_first(items: &mut [Activity]) {
    items.sort_by(|a, b| parse_timestamp(&b.created_at).cmp(&parse_timestamp(&a.created_at)));
}

impl EntityStore<Activity> {
    /// Load one task's log, newest first, as the held collection.
    pub fn load_for_task(&mut self, task_id: &str) -> Result<&[Activity]> {
        self.load_where("taskId", task_id)
    }

    pub fn load_for_project(&mut self, project_id: &str) -> Result<&[Activity]> {
        self.load_where("projectId", project_id)
    }

    /// Remote read of one user's entries; the held collection is untouched.
    pub fn for_user(&mut self, user_id: &str) -> Result<Vec<Activity>> {
        self.get_list(&Query::new().with("userId", user_id))
    }

    fn load_where(&mut self, key: &str, value: &str) -> Result<&[Activity]> {
        let mut items = self.get_list(&Query::new().with(key, value))?;
        sort_newest_first(&mut items);
        self.replace_all(items);
        Ok(self.items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> EntityStore<Activity> {
        EntityStore::new(Arc::new(LocalGateway::in_memory(json!({
            "activities": [
                {"id": 1, "taskId": 1, "userId": 1, "action": "created",
                 "createdAt": "2024-01-01T09:00:00.000Z", "description": "created the task"},
                {"id": 2, "taskId": 1, "userId": 2, "action": "status_changed",
                 "createdAt": "2024-01-03T09:00:00.000Z", "description": "moved to review",
                 "details": {"field": "status", "before": "todo", "after": "review"}},
                {"id": 3, "taskId": 2, "userId": 2, "action": "commented",
                 "createdAt": "2024-01-02T09:00:00.000Z", "description": "left a comment"}
            ]
        }))))
    }

    #[test]
    fn test_load_for_task_sorts_newest_first() {
        let mut s = store();
        let log = s.load_for_task("1").unwrap();
        let ids: Vec<&str> = log.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(log[0].action, ActivityType::StatusChanged);
    }

    #[test]
    fn test_for_user_leaves_held_log() {
        let mut s = store();
        s.load_for_task("1").unwrap();
        assert_eq!(s.for_user("2").unwrap().len(), 2);
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_field_change_picks_action() {
        let a = NewActivity::field_change("1", "1", "priority", "low", "high");
        assert_eq!(a.action, ActivityType::PriorityChanged);
        assert_eq!(a.description, "changed priority from low to high");
        assert_eq!(a.details.unwrap()["after"], "high");
    }
}
