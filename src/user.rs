//! Team members and their accounts.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fields::Role;
use crate::gateway::client::Query;
use crate::store::{Entity, EntityStore};
use crate::wire::id_text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration payload. The password is only forwarded to the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl EntityStore<User> {
    /// Users whose email equals `email` exactly.
    pub fn by_email(&mut self, email: &str) -> Result<Vec<User>> {
        self.get_list(&Query::new().with("email", email))
    }

    /// Display name for a user id, falling back to the id itself.
    pub fn name_of(&self, id: &str) -> String {
        self.find(id).map(|u| u.name.clone()).unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_by_email_is_exact() {
        let mut s: EntityStore<User> = EntityStore::new(Arc::new(LocalGateway::in_memory(json!({
            "users": [
                {"id": 1, "email": "ada@example.com", "name": "Ada", "role": "admin"},
                {"id": 2, "email": "bob@example.com", "name": "Bob"}
            ]
        }))));
        let hits = s.by_email("ada@example.com").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].role, Some(Role::Admin));
        assert!(s.by_email("ada@").unwrap().is_empty());
    }

    #[test]
    fn test_password_is_not_part_of_user() {
        let raw = json!({"id": "3", "email": "c@x.io", "name": "C", "password": "secret"});
        let user: User = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&user).unwrap();
        assert!(back.get("password").is_none());
    }
}
