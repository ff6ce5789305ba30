//! Generic CRUD store over one API collection.
//!
//! An [`EntityStore`] holds the last fetched collection of one entity kind
//! in a [`Signal`], tracks a loading flag and the last error message, and
//! keeps a short-lived cache of query results. Mutations are applied to the
//! held collection as soon as the API confirms them, without re-fetching.
//!
//! Kind specific operations (tasks by status, liking a comment, ...) live as
//! inherent impls next to each model, e.g. `impl EntityStore<Task>`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::cache::{CacheOptions, QueryCache};
use crate::error::{Error, Result};
use crate::gateway::client::{item_path, Gateway, Query};
use crate::signal::{Signal, SubscriptionId};
use crate::wire::now_iso;

/// A record stored in an API collection.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path, e.g. `tasks` or `recurring-tasks`.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

pub struct EntityStore<E: Entity> {
    gateway: Arc<dyn Gateway>,
    items: Signal<Vec<E>>,
    loading: Signal<bool>,
    error: Signal<Option<String>>,
    cache: QueryCache<E>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_cache(gateway, CacheOptions::default())
    }

    pub fn with_cache(gateway: Arc<dyn Gateway>, options: CacheOptions) -> Self {
        Self {
            gateway,
            items: Signal::new(Vec::new()),
            loading: Signal::new(false),
            error: Signal::new(None),
            cache: QueryCache::new(options),
        }
    }

    // ---- state accessors ----

    pub fn items(&self) -> &[E] {
        self.items.get()
    }

    /// Bumped whenever the held collection changes.
    pub fn version(&self) -> u64 {
        self.items.version()
    }

    pub fn find(&self, id: &str) -> Option<&E> {
        self.items.get().iter().find(|e| e.id() == id)
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.get()
    }

    /// Message of the most recent failed call.
    pub fn error(&self) -> Option<&str> {
        self.error.get().as_deref()
    }

    pub fn clear_error(&mut self) {
        if self.error.get().is_some() {
            self.error.set(None);
        }
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Listen for changes to the held collection.
    pub fn subscribe(&mut self, listener: impl FnMut(&Vec<E>) + 'static) -> SubscriptionId {
        self.items.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.items.unsubscribe(id)
    }

    pub fn subscribe_loading(&mut self, listener: impl FnMut(&bool) + 'static) -> SubscriptionId {
        self.loading.subscribe(listener)
    }

    // ---- reads ----

    /// Replace the held collection with the full remote collection.
    pub fn fetch_all(&mut self) -> Result<&[E]> {
        self.loading.set(true);
        let result = self.gateway.get(E::COLLECTION, &Query::new()).and_then(decode::<Vec<E>>);
        self.loading.set(false);
        match result {
            Ok(items) => {
                self.apply_fetched(items);
                Ok(self.items.get())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// The success half of [`fetch_all`](Self::fetch_all), for results
    /// fetched elsewhere (the poller thread).
    pub fn apply_fetched(&mut self, items: Vec<E>) {
        debug!(collection = E::COLLECTION, count = items.len(), "collection replaced");
        self.cache.insert("all", items.clone());
        self.items.set(items);
    }

    /// Single remote record. Does not touch the held collection.
    pub fn fetch_by_id(&mut self, id: &str) -> Result<E> {
        let result = self.gateway.get(&item_path(E::COLLECTION, id), &Query::new()).and_then(decode);
        result.map_err(|e| self.fail(e))
    }

    /// Filtered remote read, answered from the cache while fresh.
    ///
    /// The result is returned to the caller only; the held collection is
    /// left alone.
    pub fn query(&mut self, query: &Query) -> Result<Vec<E>> {
        let key = query.signature();
        if let Some(hit) = self.cache.get(&key) {
            debug!(collection = E::COLLECTION, key, "query cache hit");
            return Ok(hit);
        }
        let result = self.gateway.get(E::COLLECTION, query).and_then(decode::<Vec<E>>);
        match result {
            Ok(items) => {
                self.cache.insert(&key, items.clone());
                Ok(items)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    // ---- writes ----

    /// POST a draft stamped with `createdAt`, then prepend the result.
    pub fn create<D: Serialize>(&mut self, draft: &D) -> Result<E> {
        let mut body = serde_json::to_value(draft)?;
        stamp(&mut body, "createdAt");
        self.loading.set(true);
        let result = self.gateway.post(E::COLLECTION, &body).and_then(decode::<E>);
        self.loading.set(false);
        match result {
            Ok(created) => {
                self.prepend(created.clone());
                Ok(created)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// PATCH the given fields stamped with `updatedAt`, then replace the
    /// held record with the returned one.
    pub fn update<P: Serialize>(&mut self, id: &str, patch: &P) -> Result<E> {
        let mut body = serde_json::to_value(patch)?;
        stamp(&mut body, "updatedAt");
        self.loading.set(true);
        let result = self.gateway.patch(&item_path(E::COLLECTION, id), &body).and_then(decode::<E>);
        self.loading.set(false);
        match result {
            Ok(updated) => {
                self.replace(updated.clone());
                Ok(updated)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.loading.set(true);
        let result = self.gateway.delete(&item_path(E::COLLECTION, id));
        self.loading.set(false);
        match result {
            Ok(()) => {
                self.remove(id);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Create each draft in order. Stops at the first failure; records
    /// created before it stay created.
    pub fn bulk_create<D: Serialize>(&mut self, drafts: &[D]) -> Result<Vec<E>> {
        drafts.iter().map(|d| self.create(d)).collect()
    }

    pub fn bulk_update<P: Serialize>(&mut self, updates: &[(String, P)]) -> Result<Vec<E>> {
        updates.iter().map(|(id, p)| self.update(id, p)).collect()
    }

    pub fn bulk_delete(&mut self, ids: &[String]) -> Result<()> {
        ids.iter().try_for_each(|id| self.delete(id))
    }

    // ---- cache ----

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_options(&self) -> CacheOptions {
        self.cache.options()
    }

    pub fn set_cache_options(&mut self, options: CacheOptions) {
        self.cache.set_options(options);
    }

    // ---- helpers for the kind specific impls ----

    /// GET a sub-query and decode it, recording failures like any other call.
    pub(crate) fn get_list(&mut self, query: &Query) -> Result<Vec<E>> {
        let result = self.gateway.get(E::COLLECTION, query).and_then(decode::<Vec<E>>);
        result.map_err(|e| self.fail(e))
    }

    /// POST to an action route under an item, e.g. `task-templates/3/duplicate`.
    pub(crate) fn post_action(&mut self, id: &str, action: &str, body: &Value) -> Result<Value> {
        let path = format!("{}/{}", item_path(E::COLLECTION, id), action);
        let result = self.gateway.post(&path, body);
        result.map_err(|e| self.fail(e))
    }

    /// Wholesale replacement without touching the query cache.
    pub(crate) fn replace_all(&mut self, items: Vec<E>) {
        self.items.set(items);
    }

    pub(crate) fn prepend(&mut self, item: E) {
        self.items.update(|items| items.insert(0, item));
        self.cache.clear();
    }

    pub(crate) fn replace(&mut self, item: E) {
        self.items.update(|items| {
            for slot in items.iter_mut().filter(|e| e.id() == item.id()) {
                *slot = item.clone();
            }
        });
        self.cache.clear();
    }

    fn remove(&mut self, id: &str) {
        self.items.update(|items| items.retain(|e| e.id() != id));
        self.cache.clear();
    }

    /// Record and log a failure, handing the error back for `?`.
    pub(crate) fn fail(&mut self, e: Error) -> Error {
        let message = match &e {
            Error::Status { message, .. } => message.clone(),
            other => other.to_string(),
        };
        error!(collection = E::COLLECTION, "request failed: {e}");
        self.error.set(Some(message));
        e
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn stamp(body: &mut Value, field: &str) {
    if let Value::Object(map) = body {
        map.insert(field.to_string(), Value::String(now_iso()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::local::LocalGateway;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        #[serde(deserialize_with = "crate::wire::id_text")]
        id: String,
        title: String,
        #[serde(default)]
        created_at: Option<String>,
        #[serde(default)]
        updated_at: Option<String>,
    }

    impl Entity for Note {
        const COLLECTION: &'static str = "notes";
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn store() -> (Arc<LocalGateway>, EntityStore<Note>) {
        let gw = Arc::new(LocalGateway::in_memory(json!({
            "notes": [
                {"id": "1", "title": "first"},
                {"id": "2", "title": "second"}
            ]
        })));
        let store = EntityStore::new(gw.clone() as Arc<dyn Gateway>);
        (gw, store)
    }

    #[test]
    fn test_fetch_all_replaces_and_toggles_loading() {
        let (_, mut s) = store();
        let flips = Rc::new(Cell::new(0));
        let f = Rc::clone(&flips);
        s.subscribe_loading(move |_| f.set(f.get() + 1));

        s.fetch_all().unwrap();

        assert_eq!(s.items().len(), 2);
        assert!(!s.is_loading());
        assert_eq!(flips.get(), 2);
    }

    #[test]
    fn test_create_prepends_with_created_at() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        let created = s.create(&json!({"title": "third"})).unwrap();
        assert_eq!(s.items()[0], created);
        assert_eq!(s.items().len(), 3);
        assert!(created.created_at.is_some());
    }

    #[test]
    fn test_update_replaces_by_id() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        s.update("2", &json!({"title": "renamed"})).unwrap();
        assert_eq!(s.items()[1].title, "renamed");
        assert!(s.items()[1].updated_at.is_some());
        assert_eq!(s.items()[0].title, "first");
    }

    #[test]
    fn test_delete_removes_by_id() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        s.delete("1").unwrap();
        assert_eq!(s.items().iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_failed_call_keeps_collection_and_records_error() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        let before = s.version();
        let err = s.delete("99").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(s.items().len(), 2);
        assert_eq!(s.version(), before);
        assert!(s.error().unwrap().contains("Not Found"));
        assert!(!s.is_loading());
    }

    #[test]
    fn test_query_is_cached_until_a_mutation() {
        let (gw, mut s) = store();
        let q = Query::new().with("title", "first");
        assert_eq!(s.query(&q).unwrap().len(), 1);

        // Changed behind the store's back: the cached answer is still served.
        gw.post("notes", &json!({"title": "first"})).unwrap();
        assert_eq!(s.query(&q).unwrap().len(), 1);

        s.create(&json!({"title": "other"})).unwrap();
        assert_eq!(s.query(&q).unwrap().len(), 2);
    }

    #[test]
    fn test_query_bypasses_cache_when_disabled() {
        let (gw, mut s) = store();
        s.set_cache_options(CacheOptions { enabled: false, ..CacheOptions::default() });
        let q = Query::new().with("title", "first");
        assert_eq!(s.query(&q).unwrap().len(), 1);
        gw.post("notes", &json!({"title": "first"})).unwrap();
        assert_eq!(s.query(&q).unwrap().len(), 2);
    }

    #[test]
    fn test_query_does_not_replace_collection() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        s.query(&Query::new().with("title", "second")).unwrap();
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_bulk_delete_stops_at_first_failure() {
        let (_, mut s) = store();
        s.fetch_all().unwrap();
        let ids = vec!["1".to_string(), "99".to_string(), "2".to_string()];
        assert!(s.bulk_delete(&ids).is_err());
        assert_eq!(s.items().len(), 1);
        assert_eq!(s.items()[0].id, "2");
    }

    #[test]
    fn test_subscribers_see_every_change() {
        let (_, mut s) = store();
        let sizes = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&sizes);
        s.subscribe(move |items| sink.borrow_mut().push(items.len()));
        s.fetch_all().unwrap();
        s.create(&json!({"title": "x"})).unwrap();
        s.delete("1").unwrap();
        assert_eq!(*sizes.borrow(), vec![2, 3, 2]);
    }
}
