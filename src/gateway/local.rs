//! json-server compatible gateway over a local JSON document.
//!
//! The document has one top-level array per collection:
//!
//! ```json
//! { "tasks": [ ... ], "projects": [ ... ], "users": [ ... ] }
//! ```
//!
//! Reads support equality filtering on any field plus `q` for a
//! case-insensitive search across string fields, which is what a json-server
//! mock offers. When opened from a file, every write is flushed back to disk.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gateway::client::{Gateway, Query};
use crate::wire::{value_text, write_json_atomic};

/// In-process stand-in for the REST API.
#[derive(Debug)]
pub struct LocalGateway {
    path: Option<PathBuf>,
    data: Mutex<Map<String, Value>>,
}

impl LocalGateway {
    /// A gateway that never touches disk, seeded with `seed`.
    pub fn in_memory(seed: Value) -> Self {
        let data = match seed {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { path: None, data: Mutex::new(data) }
    }

    /// Open a json-server style database file, creating an empty one if it
    /// doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let mut buf = String::new();
            File::open(path)?.read_to_string(&mut buf)?;
            match serde_json::from_str::<Value>(&buf)? {
                Value::Object(map) => map,
                _ => return Err(Error::Config(format!("{} is not a JSON object", path.display()))),
            }
        } else {
            Map::new()
        };
        if !path.exists() {
            write_json_atomic(path, &data)?;
        }
        Ok(Self { path: Some(path.to_path_buf()), data: Mutex::new(data) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        // A poisoned lock only means another thread panicked mid-request;
        // the document itself is still a valid map.
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `change` to a copy of the document, persist the copy, and only
    /// then make it visible. A failed change or write leaves the document
    /// untouched.
    fn write<T>(&self, change: impl FnOnce(&mut Map<String, Value>) -> Result<T>) -> Result<T> {
        let mut data = self.lock();
        let mut next = data.clone();
        let out = change(&mut next)?;
        if let Some(path) = &self.path {
            write_json_atomic(path, &next)?;
        }
        *data = next;
        Ok(out)
    }

    /// Split `tasks/3` into (`tasks`, Some(`3`)); deeper routes are rejected.
    fn route(path: &str) -> Result<(&str, Option<&str>)> {
        let mut parts = path.trim_matches('/').split('/');
        let collection = parts.next().filter(|c| !c.is_empty());
        let id = parts.next();
        match (collection, parts.next()) {
            (Some(c), None) => Ok((c, id)),
            _ => Err(not_found(path)),
        }
    }

    /// Next numeric id for a collection: one past the largest numeric id.
    fn next_id(items: &[Value]) -> String {
        let max = items
            .iter()
            .filter_map(|v| v.get("id").and_then(value_text))
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    fn id_matches(item: &Value, id: &str) -> bool {
        item.get("id").and_then(value_text).as_deref() == Some(id)
    }

    fn matches_query(item: &Value, query: &Query) -> bool {
        query.pairs().all(|(key, expected)| {
            if key == "q" {
                let needle = expected.to_lowercase();
                return item
                    .as_object()
                    .map(|obj| {
                        obj.values()
                            .filter_map(Value::as_str)
                            .any(|s| s.to_lowercase().contains(&needle))
                    })
                    .unwrap_or(false);
            }
            item.get(key).and_then(value_text).as_deref() == Some(expected)
        })
    }
}

fn not_found(path: &str) -> Error {
    Error::Status { status: 404, message: format!("Not Found: /{}", path.trim_matches('/')) }
}

impl Gateway for LocalGateway {
    fn get(&self, path: &str, query: &Query) -> Result<Value> {
        let (collection, id) = Self::route(path)?;
        let data = self.lock();
        let items = data.get(collection).and_then(Value::as_array);
        match id {
            Some(id) => items
                .and_then(|items| items.iter().find(|v| Self::id_matches(v, id)))
                .cloned()
                .ok_or_else(|| not_found(path)),
            None => {
                let Some(items) = items else {
                    return Err(not_found(path));
                };
                let hits: Vec<Value> =
                    items.iter().filter(|v| Self::matches_query(v, query)).cloned().collect();
                debug!(collection, hits = hits.len(), "local read");
                Ok(Value::Array(hits))
            }
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let (collection, id) = Self::route(path)?;
        if id.is_some() {
            return Err(not_found(path));
        }
        let Value::Object(mut doc) = body.clone() else {
            return Err(Error::Status { status: 400, message: "body must be a JSON object".into() });
        };
        self.write(|data| {
            let items = data
                .entry(collection.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = items else {
                return Err(Error::Status { status: 500, message: format!("{collection} is not a collection") });
            };
            if !doc.contains_key("id") {
                doc.insert("id".into(), Value::String(Self::next_id(items)));
            }
            let created = Value::Object(doc);
            items.push(created.clone());
            Ok(created)
        })
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let (collection, Some(id)) = Self::route(path)? else {
            return Err(not_found(path));
        };
        let Value::Object(changes) = body else {
            return Err(Error::Status { status: 400, message: "body must be a JSON object".into() });
        };
        self.write(|data| {
            let item = data
                .get_mut(collection)
                .and_then(Value::as_array_mut)
                .and_then(|items| items.iter_mut().find(|v| Self::id_matches(v, id)))
                .ok_or_else(|| not_found(path))?;
            if let Value::Object(obj) = item {
                for (k, v) in changes {
                    if k != "id" {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(item.clone())
        })
    }

    fn delete(&self, path: &str) -> Result<()> {
        let (collection, Some(id)) = Self::route(path)? else {
            return Err(not_found(path));
        };
        let result = self.write(|data| {
            let items = data
                .get_mut(collection)
                .and_then(Value::as_array_mut)
                .ok_or_else(|| not_found(path))?;
            let before = items.len();
            items.retain(|v| !Self::id_matches(v, id));
            if items.len() == before {
                return Err(not_found(path));
            }
            Ok(())
        });
        if let Err(e) = &result {
            if !e.is_not_found() {
                warn!("failed to persist delete of {path}: {e}");
            }
        }
        result
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(p) => format!("file://{}", p.display()),
            None => "memory".to_string(),
        }
    }
}
