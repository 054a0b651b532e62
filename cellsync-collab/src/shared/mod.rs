//! Replica of the shared document, backed by a `yrs::Doc`.
//!
//! ```text
//!  batch(|txn| ..) ──▶ yrs TransactionMut (origin "local")
//!        │                    │ commit
//!        │                    ├──▶ deep observer ──▶ DocEvent (Origin::Local)
//!        └──▶ outbox: DocUpdate (v1 bytes)
//!                    │  (transport, not ours)
//!                    ▼
//!  peer.apply_update ──▶ TransactionMut (origin "remote")
//!                             └──▶ deep observer ──▶ DocEvent (Origin::Remote)
//! ```
//!
//! The first segment of a [`DocPath`] names a root-level map, the rest are
//! nested map keys. Nested maps and arrays are yrs shared types, so
//! concurrent writes merge: a map key converges to one winner on every
//! replica and concurrent array removals both take effect.

mod convert;
mod update;
mod value;

pub use update::{DocSnapshot, DocUpdate};
pub use value::{DocPath, SharedValue};

use convert::{json_to_any, out_kind, project};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;
use yrs::types::{Change, EntryChange, Event, PathSegment};
use yrs::{
    Array, ArrayPrelim, ArrayRef, DeepObservable, Doc, Map, MapPrelim, MapRef, Out, ReadTxn,
    StateVector, Subscription, Transact, TransactionMut, WriteTxn,
};

const LOCAL_ORIGIN: &str = "local";
const REMOTE_ORIGIN: &str = "remote";

#[derive(Debug, Error)]
pub enum DocError {
    #[error("No node at {0}")]
    NotFound(DocPath),

    #[error("Node at {path} is a {found}, expected a {expected}")]
    WrongKind {
        path: DocPath,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Update decoding error: {0}")]
    Decode(String),

    #[error("Update could not be applied: {0}")]
    Apply(String),
}

/// Whether an event was caused by this replica or by a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    pub fn is_local(self) -> bool {
        self == Origin::Local
    }
}

/// What happened to an observed node.
#[derive(Clone, Debug, PartialEq)]
pub enum DocChange {
    MapSet {
        key: String,
        value: SharedValue,
        previous: Option<SharedValue>,
    },
    MapRemove {
        key: String,
        previous: SharedValue,
    },
    ArrayInsert {
        index: usize,
        values: Vec<Value>,
    },
    ArrayRemove {
        index: usize,
        len: usize,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocEvent {
    pub path: DocPath,
    pub change: DocChange,
    pub origin: Origin,
}

type EventQueue = Arc<Mutex<VecDeque<DocEvent>>>;

/// One replica of the shared document.
pub struct SharedDocument {
    replica_id: Uuid,
    doc: Doc,
    observed: BTreeSet<DocPath>,
    events: EventQueue,
    subscriptions: BTreeMap<String, Subscription>,
    outbox: Vec<DocUpdate>,
}

impl fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDocument")
            .field("replica_id", &self.replica_id)
            .field("observed", &self.observed)
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDocument {
    pub fn new() -> Self {
        Self {
            replica_id: Uuid::new_v4(),
            doc: Doc::new(),
            observed: BTreeSet::new(),
            events: Arc::new(Mutex::new(VecDeque::new())),
            subscriptions: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    /// A new replica holding the snapshotted state.
    pub fn from_snapshot(snapshot: &DocSnapshot) -> Result<Self, DocError> {
        let doc = Self::new();
        {
            let mut txn = doc.doc.transact_mut_with(REMOTE_ORIGIN);
            txn.apply_update(snapshot.to_update()?)
                .map_err(|e| DocError::Apply(e.to_string()))?;
        }
        Ok(doc)
    }

    pub fn snapshot(&self) -> DocSnapshot {
        let txn = self.doc.transact();
        DocSnapshot::new(txn.encode_state_as_update_v1(&StateVector::default()))
    }

    pub fn replica_id(&self) -> Uuid {
        self.replica_id
    }

    // ─── Reads ───────────────────────────────────────────────────────

    pub fn get(&self, path: &DocPath) -> Option<SharedValue> {
        let txn = self.doc.transact();
        resolve(&txn, path).map(|out| project(&out, &txn))
    }

    pub fn map_get(&self, path: &DocPath, key: &str) -> Option<SharedValue> {
        self.get(&path.child(key))
    }

    pub fn has_key(&self, path: &DocPath, key: &str) -> bool {
        let txn = self.doc.transact();
        match resolve(&txn, path) {
            Some(Out::YMap(map)) => map.contains_key(&txn, key),
            _ => false,
        }
    }

    /// Keys of the map at `path` in sorted order.
    pub fn keys(&self, path: &DocPath) -> Vec<String> {
        let txn = self.doc.transact();
        let mut keys: Vec<String> = match resolve(&txn, path) {
            Some(Out::YMap(map)) => map.keys(&txn).map(str::to_string).collect(),
            _ => Vec::new(),
        };
        keys.sort();
        keys
    }

    pub fn array_values(&self, path: &DocPath) -> Option<Vec<Value>> {
        match self.get(path)? {
            SharedValue::Array(values) => Some(values),
            _ => None,
        }
    }

    // ─── Writes ──────────────────────────────────────────────────────

    /// Runs `f` in one local transaction. Everything it writes goes out as a
    /// single update, and observers see the changes when it returns.
    pub fn batch<R>(
        &mut self,
        f: impl FnOnce(&mut DocTxn<'_>) -> Result<R, DocError>,
    ) -> Result<R, DocError> {
        let mut txn = DocTxn {
            txn: self.doc.transact_mut_with(LOCAL_ORIGIN),
            wrote: false,
        };
        let result = f(&mut txn);
        if txn.wrote {
            self.outbox.push(DocUpdate::new(txn.txn.encode_update_v1()));
        }
        drop(txn);
        result
    }

    pub fn map_set(
        &mut self,
        path: &DocPath,
        key: impl Into<String>,
        value: impl Into<SharedValue>,
    ) -> Result<(), DocError> {
        let (key, value) = (key.into(), value.into());
        self.batch(|txn| txn.map_set(path, key, value))
    }

    /// Removes `key`. Returns `false`, and writes nothing, when it is absent.
    pub fn map_remove(&mut self, path: &DocPath, key: &str) -> Result<bool, DocError> {
        self.batch(|txn| txn.map_remove(path, key))
    }

    pub fn array_push(&mut self, path: &DocPath, values: Vec<Value>) -> Result<(), DocError> {
        self.batch(|txn| txn.array_push(path, &values))
    }

    /// Removes the first element equal to `value`. Returns whether one was
    /// found.
    pub fn array_remove_value(&mut self, path: &DocPath, value: &Value) -> Result<bool, DocError> {
        self.batch(|txn| txn.array_remove_value(path, value))
    }

    // ─── Replication ─────────────────────────────────────────────────

    /// Updates produced since the last call, oldest first.
    pub fn take_updates(&mut self) -> Vec<DocUpdate> {
        std::mem::take(&mut self.outbox)
    }

    /// Integrates a peer's update. Re-delivered updates change nothing, and
    /// an update that arrives ahead of its dependencies is held back until
    /// they are applied.
    pub fn apply_update(&mut self, update: &DocUpdate) -> Result<(), DocError> {
        let decoded = update.to_update()?;
        let mut txn = self.doc.transact_mut_with(REMOTE_ORIGIN);
        txn.apply_update(decoded)
            .map_err(|e| DocError::Apply(e.to_string()))
    }

    // ─── Observation ─────────────────────────────────────────────────

    /// Starts queuing events for changes of the node at `path`.
    pub fn observe(&mut self, path: DocPath) -> bool {
        if let Some(top) = path.segments().first() {
            if !self.subscriptions.contains_key(top) {
                let subscription = self.subscribe(top);
                self.subscriptions.insert(top.clone(), subscription);
            }
        }
        self.observed.insert(path)
    }

    pub fn unobserve(&mut self, path: &DocPath) -> bool {
        self.observed.remove(path)
    }

    /// Stops observing `prefix` and everything below it.
    pub fn unobserve_prefix(&mut self, prefix: &DocPath) {
        self.observed.retain(|p| !p.starts_with(prefix));
    }

    pub fn is_observed(&self, path: &DocPath) -> bool {
        self.observed.contains(path)
    }

    pub fn has_events(&self) -> bool {
        self.queue().iter().any(|e| self.observed.contains(&e.path))
    }

    /// Queued events for observed paths, oldest first.
    pub fn drain_events(&mut self) -> Vec<DocEvent> {
        let drained: Vec<DocEvent> = self.queue().drain(..).collect();
        drained
            .into_iter()
            .filter(|e| self.observed.contains(&e.path))
            .collect()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<DocEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, top: &str) -> Subscription {
        let map = self.doc.get_or_insert_map(top);
        let events = Arc::clone(&self.events);
        let top = top.to_string();
        let local = yrs::Origin::from(LOCAL_ORIGIN);
        map.observe_deep(move |txn, batch| {
            let origin = if txn.origin() == Some(&local) {
                Origin::Local
            } else {
                Origin::Remote
            };
            let mut queue = events.lock().unwrap_or_else(PoisonError::into_inner);
            for event in batch.iter() {
                queue.extend(translate(&top, event, txn, origin));
            }
        })
    }
}

/// Write access inside [`SharedDocument::batch`].
pub struct DocTxn<'doc> {
    txn: TransactionMut<'doc>,
    wrote: bool,
}

impl DocTxn<'_> {
    pub fn map_set(
        &mut self,
        path: &DocPath,
        key: impl Into<String>,
        value: impl Into<SharedValue>,
    ) -> Result<(), DocError> {
        let map = self.map_at(path)?;
        write_entry(&mut self.txn, &map, key.into(), value.into());
        self.wrote = true;
        Ok(())
    }

    pub fn map_remove(&mut self, path: &DocPath, key: &str) -> Result<bool, DocError> {
        let map = self.map_at(path)?;
        let removed = map.remove(&mut self.txn, key).is_some();
        self.wrote |= removed;
        Ok(removed)
    }

    pub fn array_push(&mut self, path: &DocPath, values: &[Value]) -> Result<(), DocError> {
        let array = self.array_at(path)?;
        for value in values {
            array.push_back(&mut self.txn, json_to_any(value));
        }
        self.wrote |= !values.is_empty();
        Ok(())
    }

    pub fn array_remove_value(&mut self, path: &DocPath, value: &Value) -> Result<bool, DocError> {
        let array = self.array_at(path)?;
        let position = array
            .iter(&self.txn)
            .position(|item| project(&item, &self.txn).to_json() == *value);
        match position {
            Some(index) => {
                array.remove_range(&mut self.txn, index as u32, 1);
                self.wrote = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn node(&mut self, path: &DocPath) -> Result<Out, DocError> {
        let (top, rest) = path
            .segments()
            .split_first()
            .ok_or_else(|| DocError::NotFound(path.clone()))?;
        let mut node = Out::YMap(self.txn.get_or_insert_map(top.as_str()));
        for segment in rest {
            node = match node {
                Out::YMap(map) => map
                    .get(&self.txn, segment)
                    .ok_or_else(|| DocError::NotFound(path.clone()))?,
                other => return Err(wrong_kind(path, "map", &other)),
            };
        }
        Ok(node)
    }

    fn map_at(&mut self, path: &DocPath) -> Result<MapRef, DocError> {
        match self.node(path)? {
            Out::YMap(map) => Ok(map),
            other => Err(wrong_kind(path, "map", &other)),
        }
    }

    fn array_at(&mut self, path: &DocPath) -> Result<ArrayRef, DocError> {
        match self.node(path)? {
            Out::YArray(array) => Ok(array),
            other => Err(wrong_kind(path, "array", &other)),
        }
    }
}

fn wrong_kind(path: &DocPath, expected: &'static str, found: &Out) -> DocError {
    DocError::WrongKind {
        path: path.clone(),
        expected,
        found: out_kind(found),
    }
}

/// Node at `path`, or `None` when a segment is missing or not a map.
fn resolve<T: ReadTxn>(txn: &T, path: &DocPath) -> Option<Out> {
    let (top, rest) = path.segments().split_first()?;
    let mut node = Out::YMap(txn.get_map(top.as_str())?);
    for segment in rest {
        node = match node {
            Out::YMap(map) => map.get(txn, segment)?,
            _ => return None,
        };
    }
    Some(node)
}

fn write_entry(txn: &mut TransactionMut<'_>, map: &MapRef, key: String, value: SharedValue) {
    match value {
        SharedValue::Value(value) => {
            map.insert(txn, key, json_to_any(&value));
        }
        SharedValue::Map(entries) => {
            let nested = map.insert(txn, key, MapPrelim::default());
            for (key, value) in entries {
                write_entry(txn, &nested, key, value);
            }
        }
        SharedValue::Array(values) => {
            let nested = map.insert(txn, key, ArrayPrelim::default());
            for value in &values {
                nested.push_back(txn, json_to_any(value));
            }
        }
    }
}

fn translate(top: &str, event: &Event, txn: &TransactionMut<'_>, origin: Origin) -> Vec<DocEvent> {
    match event {
        Event::Map(e) => {
            let path = event_path(top, e.path());
            let mut keys: Vec<_> = e.keys(txn).iter().collect();
            keys.sort_by(|a, b| a.0.cmp(b.0));
            keys.into_iter()
                .map(|(key, change)| {
                    let key = key.to_string();
                    let change = match change {
                        EntryChange::Inserted(value) => DocChange::MapSet {
                            key,
                            value: project(value, txn),
                            previous: None,
                        },
                        EntryChange::Updated(old, value) => DocChange::MapSet {
                            key,
                            value: project(value, txn),
                            previous: Some(project(old, txn)),
                        },
                        EntryChange::Removed(old) => DocChange::MapRemove {
                            key,
                            previous: project(old, txn),
                        },
                    };
                    DocEvent {
                        path: path.clone(),
                        change,
                        origin,
                    }
                })
                .collect()
        }
        Event::Array(e) => {
            let path = event_path(top, e.path());
            let mut index = 0;
            let mut events = Vec::new();
            for change in e.delta(txn) {
                let change = match change {
                    Change::Retain(len) => {
                        index += *len as usize;
                        continue;
                    }
                    Change::Added(values) => {
                        let values: Vec<Value> =
                            values.iter().map(|v| project(v, txn).to_json()).collect();
                        let at = index;
                        index += values.len();
                        DocChange::ArrayInsert { index: at, values }
                    }
                    Change::Removed(len) => DocChange::ArrayRemove {
                        index,
                        len: *len as usize,
                    },
                };
                events.push(DocEvent {
                    path: path.clone(),
                    change,
                    origin,
                });
            }
            events
        }
        _ => Vec::new(),
    }
}

fn event_path(top: &str, relative: yrs::types::Path) -> DocPath {
    relative
        .into_iter()
        .fold(DocPath::top(top), |path, segment| match segment {
            PathSegment::Key(key) => path.child(key.to_string()),
            PathSegment::Index(index) => path.child(index.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cells() -> DocPath {
        DocPath::top("cells")
    }

    fn pump(from: &mut SharedDocument, to: &mut SharedDocument) {
        for update in from.take_updates() {
            to.apply_update(&update).unwrap();
        }
    }

    #[test]
    fn test_map_set_and_get() {
        let mut doc = SharedDocument::new();
        doc.map_set(&cells(), "a", json!({"vertex": true})).unwrap();
        assert!(doc.has_key(&cells(), "a"));
        assert_eq!(doc.keys(&cells()), vec!["a".to_string()]);
        assert_eq!(
            doc.map_get(&cells(), "a").unwrap().to_json(),
            json!({"vertex": true})
        );
    }

    #[test]
    fn test_nested_map_round_trips() {
        let mut doc = SharedDocument::new();
        let mut style = BTreeMap::new();
        style.insert("classes".to_string(), SharedValue::Array(vec![json!("a")]));
        style.insert("styles".to_string(), SharedValue::empty_map());
        doc.map_set(&cells(), "v", SharedValue::Map(style.clone())).unwrap();

        assert_eq!(doc.get(&cells().child("v")), Some(SharedValue::Map(style)));
        assert_eq!(
            doc.array_values(&cells().child("v").child("classes")),
            Some(vec![json!("a")])
        );
    }

    #[test]
    fn test_write_into_missing_node_fails() {
        let mut doc = SharedDocument::new();
        let err = doc.map_set(&cells().child("ghost"), "a", json!(1)).unwrap_err();
        assert!(matches!(err, DocError::NotFound(_)));
        assert!(doc.take_updates().is_empty());
    }

    #[test]
    fn test_events_only_for_observed_paths() {
        let mut doc = SharedDocument::new();
        doc.map_set(&cells(), "a", json!(1)).unwrap();
        assert!(!doc.has_events());

        doc.observe(cells());
        doc.map_set(&cells(), "b", json!(2)).unwrap();
        doc.map_set(&DocPath::top("graph"), "root", json!("r")).unwrap();
        let events = doc.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, Origin::Local);
        assert_eq!(
            events[0].change,
            DocChange::MapSet {
                key: "b".into(),
                value: json!(2).into(),
                previous: None,
            }
        );
    }

    #[test]
    fn test_map_remove_absent_key_writes_nothing() {
        let mut doc = SharedDocument::new();
        assert!(!doc.map_remove(&cells(), "ghost").unwrap());
        assert!(doc.take_updates().is_empty());
    }

    #[test]
    fn test_batch_produces_one_update() {
        let mut doc = SharedDocument::new();
        doc.map_set(&cells(), "list", SharedValue::Array(vec![])).unwrap();
        doc.take_updates();

        let list = cells().child("list");
        doc.batch(|txn| {
            txn.array_push(&list, &[json!("a")])?;
            txn.array_push(&list, &[json!("b")])?;
            txn.map_set(&cells(), "x", json!(1))
        })
        .unwrap();

        assert_eq!(doc.take_updates().len(), 1);
        assert_eq!(doc.array_values(&list).unwrap(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_replication_marks_remote_origin() {
        let mut a = SharedDocument::new();
        let mut b = SharedDocument::new();
        b.observe(cells());

        a.map_set(&cells(), "v", json!({"edge": true})).unwrap();
        pump(&mut a, &mut b);

        let events = b.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, Origin::Remote);
        assert_eq!(b.map_get(&cells(), "v"), a.map_get(&cells(), "v"));
    }

    #[test]
    fn test_snapshot_contains_state_and_redelivery_is_silent() {
        let mut a = SharedDocument::new();
        a.map_set(&cells(), "v", json!(1)).unwrap();
        let mut b = SharedDocument::from_snapshot(&a.snapshot()).unwrap();
        b.observe(cells());

        assert_eq!(b.map_get(&cells(), "v"), Some(json!(1).into()));
        for update in a.take_updates() {
            b.apply_update(&update).unwrap();
        }
        assert!(!b.has_events());
    }

    #[test]
    fn test_concurrent_key_writes_converge() {
        let mut a = SharedDocument::new();
        let mut b = SharedDocument::new();
        a.map_set(&cells(), "v", json!("from a")).unwrap();
        b.map_set(&cells(), "v", json!("from b")).unwrap();

        let (to_b, to_a) = (a.take_updates(), b.take_updates());
        for update in &to_b {
            b.apply_update(update).unwrap();
        }
        for update in &to_a {
            a.apply_update(update).unwrap();
        }
        assert_eq!(a.map_get(&cells(), "v"), b.map_get(&cells(), "v"));
    }

    #[test]
    fn test_concurrent_array_removals_both_apply() {
        let mut a = SharedDocument::new();
        a.map_set(&cells(), "list", SharedValue::Array(vec![json!("x"), json!("y")]))
            .unwrap();
        let mut b = SharedDocument::from_snapshot(&a.snapshot()).unwrap();
        a.take_updates();

        let list = cells().child("list");
        a.array_remove_value(&list, &json!("x")).unwrap();
        b.array_remove_value(&list, &json!("y")).unwrap();
        let (to_b, to_a) = (a.take_updates(), b.take_updates());
        for update in &to_b {
            b.apply_update(update).unwrap();
        }
        for update in &to_a {
            a.apply_update(update).unwrap();
        }

        assert_eq!(a.array_values(&list), Some(vec![]));
        assert_eq!(b.array_values(&list), Some(vec![]));
    }

    #[test]
    fn test_out_of_order_update_waits_for_its_dependency() {
        let mut a = SharedDocument::new();
        let mut b = SharedDocument::new();
        a.map_set(&cells(), "v", SharedValue::empty_map()).unwrap();
        a.map_set(&cells().child("v"), "value", json!("late")).unwrap();
        let updates = a.take_updates();

        b.apply_update(&updates[1]).unwrap();
        assert!(!b.has_key(&cells(), "v"));
        b.apply_update(&updates[0]).unwrap();
        assert_eq!(
            b.map_get(&cells().child("v"), "value"),
            Some(json!("late").into())
        );
    }

    #[test]
    fn test_array_remove_value_reports_position() {
        let mut doc = SharedDocument::new();
        let list = cells().child("list");
        doc.map_set(&cells(), "list", SharedValue::Array(vec![json!("a"), json!("b")]))
            .unwrap();
        doc.observe(list.clone());

        assert!(doc.array_remove_value(&list, &json!("b")).unwrap());
        assert!(!doc.array_remove_value(&list, &json!("zzz")).unwrap());
        assert_eq!(doc.array_values(&list).unwrap(), vec![json!("a")]);
        assert_eq!(
            doc.drain_events()[0].change,
            DocChange::ArrayRemove { index: 1, len: 1 }
        );
    }

    #[test]
    fn test_unobserve_prefix() {
        let mut doc = SharedDocument::new();
        doc.observe(cells().child("a"));
        doc.observe(cells().child("a").child("style"));
        doc.observe(cells().child("b"));
        doc.unobserve_prefix(&cells().child("a"));
        assert!(!doc.is_observed(&cells().child("a").child("style")));
        assert!(doc.is_observed(&cells().child("b")));
    }

    #[test]
    fn test_update_decoding_rejects_garbage() {
        let mut doc = SharedDocument::new();
        doc.map_set(&cells(), "a", json!(1)).unwrap();
        let update = doc.take_updates().remove(0);
        assert_eq!(DocUpdate::decode(&update.encode()).unwrap(), update);
        assert!(DocUpdate::decode(&[0xff, 0xff, 0xff]).is_err());
    }
}
