//! Discussion threads attached to tasks.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gateway::client::Query;
use crate::store::{Entity, EntityStore};
use crate::wire::{id_text, null_as_empty, opt_id_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(deserialize_with = "id_text")]
    pub task_id: String,
    #[serde(deserialize_with = "id_text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "opt_id_text", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mentions: Vec<String>,
}

impl Entity for Comment {
    const COLLECTION: &'static str = "comments";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub task_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub content: String,
    pub likes: u32,
    pub mentions: Vec<String>,
}

impl NewComment {
    /// Draft with mentions pulled out of `content`.
    pub fn new(task_id: &str, user_id: &str, content: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            likes: 0,
            mentions: extract_mentions(content),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub content: String,
    pub mentions: Vec<String>,
}

impl CommentPatch {
    pub fn new(content: &str) -> Self {
        Self { content: content.to_string(), mentions: extract_mentions(content) }
    }
}

/// `@name` handles in order of appearance, without the `@`.
pub fn extract_mentions(text: &str) -> Vec<String> {
    static MENTION: OnceLock<Regex> = OnceLock::new();
    let re = MENTION.get_or_init(|| Regex::new(r"@(\w+)").expect("valid regex"));
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

impl EntityStore<Comment> {
    /// Load one task's thread as the held collection.
    pub fn load_for_task(&mut self, task_id: &str) -> Result<&[Comment]> {
        let comments = self.get_list(&Query::new().with("taskId", task_id))?;
        self.replace_all(comments);
        Ok(self.items())
    }

    pub fn like(&mut self, id: &str) -> Result<Comment> {
        let likes = match self.find(id) {
            Some(c) => c.likes,
            None => self.fetch_by_id(id)?.likes,
        };
        self.update(id, &serde_json::json!({ "likes": likes + 1 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> EntityStore<Comment> {
        EntityStore::new(Arc::new(LocalGateway::in_memory(json!({
            "comments": [
                {"id": 1, "taskId": 1, "userId": 1, "content": "Looks good", "likes": 2},
                {"id": 2, "taskId": 2, "userId": 2, "content": "Blocked"},
                {"id": 3, "taskId": "1", "userId": 2, "content": "@ada agreed"}
            ]
        }))))
    }

    #[test]
    fn test_extract_mentions() {
        assert_eq!(extract_mentions("cc @ada and @bob_2, not email@"), vec!["ada", "bob_2"]);
        assert!(extract_mentions("no handles here").is_empty());
    }

    #[test]
    fn test_load_for_task_replaces_thread() {
        let mut s = store();
        let thread = s.load_for_task("1").unwrap();
        assert_eq!(thread.len(), 2);
        s.load_for_task("2").unwrap();
        assert_eq!(s.items().len(), 1);
    }

    #[test]
    fn test_like_increments() {
        let mut s = store();
        s.load_for_task("1").unwrap();
        assert_eq!(s.like("1").unwrap().likes, 3);
        assert_eq!(s.find("1").unwrap().likes, 3);
        assert_eq!(s.like("2").unwrap().likes, 1);
    }

    #[test]
    fn test_new_comment_carries_mentions() {
        let mut s = store();
        let c = s.create(&NewComment::new("2", "1", "ping @carol")).unwrap();
        assert_eq!(c.mentions, vec!["carol"]);
        assert_eq!(c.likes, 0);
    }
}
