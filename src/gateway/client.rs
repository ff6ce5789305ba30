//! The transport seam every entity store talks through.
//!
//! A gateway maps the four HTTP verbs onto collection paths such as
//! `tasks` or `tasks/12` and speaks plain JSON. It holds no state about the
//! entities themselves.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;

/// Query parameters for a collection read.
///
/// Empty values are dropped on insert, so a criteria object with unset
/// fields produces no parameter for them. Keys are kept sorted, which makes
/// [`Query::signature`] stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, ignoring empty values.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.params.insert(key.to_string(), value);
        }
        self
    }

    /// Add a parameter only when a value is present.
    pub fn with_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Cache key for this exact parameter set.
    pub fn signature(&self) -> String {
        if self.params.is_empty() {
            return "all".to_string();
        }
        self.pairs()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// HTTP verb mapping over a base URL.
///
/// Implementations must be shareable with the polling thread.
pub trait Gateway: Send + Sync {
    /// `GET /path?query`
    fn get(&self, path: &str, query: &Query) -> Result<Value>;

    /// `POST /path` with a JSON body, returning the created document.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// `PATCH /path` with a partial JSON body, returning the updated document.
    fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    /// `DELETE /path`
    fn delete(&self, path: &str) -> Result<()>;

    /// Where requests go, for log lines and `whoami`.
    fn describe(&self) -> String;
}

/// Join a collection and an id into an item path.
pub fn item_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}
