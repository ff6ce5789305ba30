//! Projects group tasks and carry a deadline and team.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fields::ProjectStatus;
use crate::gateway::client::Query;
use crate::store::{Entity, EntityStore};
use crate::wire::{id_text, id_text_vec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Percent complete as maintained by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "id_text")]
    pub owner_id: String,
    #[serde(default, deserialize_with = "id_text_vec")]
    pub team_members: Vec<String>,
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

/// New projects start active at zero progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub team_members: Vec<String>,
    pub owner_id: String,
    pub status: ProjectStatus,
    pub progress: f64,
}

impl NewProject {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            deadline: None,
            team_members: Vec::new(),
            owner_id: owner_id.into(),
            status: ProjectStatus::Active,
            progress: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_members: Option<Vec<String>>,
}

impl EntityStore<Project> {
    /// Remote read of `?status=active`.
    pub fn active(&mut self) -> Result<Vec<Project>> {
        self.query(&Query::new().with("status", "active"))
    }

    /// Display name for a project id, falling back to the id itself.
    pub fn name_of(&self, id: &str) -> String {
        self.find(id).map(|p| p.name.clone()).unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> EntityStore<Project> {
        EntityStore::new(Arc::new(LocalGateway::in_memory(json!({
            "projects": [
                {"id": 1, "name": "Website", "status": "active", "ownerId": 1, "teamMembers": [1, "2"]},
                {"id": 2, "name": "Legacy", "status": "archived", "ownerId": "1"}
            ]
        }))))
    }

    #[test]
    fn test_active_filters_remotely() {
        let mut s = store();
        let active = s.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].team_members, vec!["1", "2"]);
    }

    #[test]
    fn test_create_defaults_to_active() {
        let mut s = store();
        let p = s.create(&NewProject::new("Mobile", "1")).unwrap();
        assert_eq!(p.status, ProjectStatus::Active);
        assert_eq!(p.progress, Some(0.0));
        assert!(!p.created_at.is_empty());
    }

    #[test]
    fn test_name_of_falls_back_to_id() {
        let mut s = store();
        s.fetch_all().unwrap();
        assert_eq!(s.name_of("1"), "Website");
        assert_eq!(s.name_of("42"), "42");
    }
}
