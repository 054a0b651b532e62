//! Per-cell bridge between a local [`Cell`] and its mirror map.
//!
//! ```text
//!   ModelChange ──▶ process_local_change ──▶ map_set / map_remove / batch
//!                                                       │
//!   cell_mut / apply_* ◀── process_remote_event ◀── DocEvent (both origins)
//! ```
//!
//! Writes echo back as local-origin events. They are applied like any
//! other event, which is a no-op because the cell already holds the value,
//! so nothing is refreshed or notified twice.

use serde_json::Value;
use std::collections::BTreeMap;

use cellsync_core::codec::{decode_geometry, decode_style, encode_geometry};
use cellsync_core::{
    Cell, CellId, CellRecord, CoreError, GraphModel, ModelChange, StyleData, StyleDiff, Terminal, View,
};

use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::shared::{DocChange, DocError, DocEvent, DocPath, DocTxn, SharedDocument, SharedValue};
use crate::tasks::TaskQueue;

pub const PARENT_KEY: &str = "parent";
pub const VALUE_KEY: &str = "value";
pub const GEOMETRY_KEY: &str = "geometry";
pub const STYLE_KEY: &str = "style";
pub const VISIBLE_KEY: &str = "visible";
pub const COLLAPSED_KEY: &str = "collapsed";
pub const CONNECTABLE_KEY: &str = "connectable";
pub const CLASSES_KEY: &str = "classes";
pub const STYLES_KEY: &str = "styles";

/// Everything a synchronizer touches while handling one event.
pub struct SyncContext<'a> {
    pub model: &'a mut GraphModel,
    pub view: &'a mut View,
    pub doc: &'a mut SharedDocument,
    pub tasks: &'a mut TaskQueue<SyncEvent>,
    pub notices: &'a mut Vec<SyncEvent>,
}

/// Binding of one live cell to `cells/<id>`.
#[derive(Debug)]
pub struct CellSynchronizer {
    cell: CellId,
    path: DocPath,
    style_bound: bool,
}

impl CellSynchronizer {
    /// Subscribes to the mirror of `cell`, and to its style collections when
    /// the mirror already has a style.
    pub fn bind(cell: CellId, cells_path: &DocPath, doc: &mut SharedDocument) -> Self {
        let path = cells_path.child(cell.as_str());
        doc.observe(path.clone());
        let mut sync = Self {
            cell,
            path,
            style_bound: false,
        };
        if sync.mirror_style(doc).is_some() {
            sync.bind_style(doc);
        }
        log::trace!("Bound cell {}", sync.cell);
        sync
    }

    pub fn unbind(&mut self, doc: &mut SharedDocument) {
        doc.unobserve_prefix(&self.path);
        self.style_bound = false;
        log::trace!("Unbound cell {}", self.cell);
    }

    pub fn cell(&self) -> &CellId {
        &self.cell
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    pub fn is_style_bound(&self) -> bool {
        self.style_bound
    }

    fn classes_path(&self) -> DocPath {
        self.path.child(STYLE_KEY).child(CLASSES_KEY)
    }

    fn styles_path(&self) -> DocPath {
        self.path.child(STYLE_KEY).child(STYLES_KEY)
    }

    fn bind_style(&mut self, doc: &mut SharedDocument) {
        doc.observe(self.classes_path());
        doc.observe(self.styles_path());
        self.style_bound = true;
    }

    fn unbind_style(&mut self, doc: &mut SharedDocument) {
        doc.unobserve(&self.classes_path());
        doc.unobserve(&self.styles_path());
        self.style_bound = false;
    }

    fn mirror_style(&self, doc: &SharedDocument) -> Option<StyleData> {
        doc.map_get(&self.path, STYLE_KEY)
            .filter(|v| !v.is_null())
            .map(|v| read_style(&v))
    }

    // ─── Local → remote ──────────────────────────────────────────────

    /// Writes the key(s) affected by `change`, then emits `CellChanged`.
    pub fn process_local_change(
        &mut self,
        ctx: &mut SyncContext<'_>,
        change: &ModelChange,
    ) -> Result<(), SyncError> {
        match change {
            ModelChange::Geometry { geometry, .. } => {
                let value = match geometry {
                    Some(geometry) => encode_geometry(geometry)?,
                    None => Value::Null,
                };
                ctx.doc.map_set(&self.path, GEOMETRY_KEY, value)?;
            }
            ModelChange::Value { value, .. } => {
                let value = value.clone().unwrap_or(Value::Null);
                ctx.doc.map_set(&self.path, VALUE_KEY, value)?;
            }
            ModelChange::Style { style, .. } => {
                self.write_style(ctx.doc, style.as_deref())?;
            }
            ModelChange::Visible { visible, .. } => {
                ctx.doc.map_set(&self.path, VISIBLE_KEY, Value::Bool(*visible))?;
            }
            ModelChange::Collapsed { collapsed, .. } => {
                ctx.doc
                    .map_set(&self.path, COLLAPSED_KEY, Value::Bool(*collapsed))?;
            }
            ModelChange::Terminal { end, terminal, .. } => {
                let current = cell_id_of(ctx.doc.map_get(&self.path, end.key()).as_ref());
                if current.as_ref() == terminal.as_ref() {
                    log::trace!("Terminal {} of {} unchanged", end.key(), self.cell);
                    return Ok(());
                }
                ctx.doc.map_set(&self.path, end.key(), id_value(terminal.as_ref()))?;
            }
            ModelChange::Child { parent, .. } => {
                ctx.doc.map_set(&self.path, PARENT_KEY, id_value(parent.as_ref()))?;
            }
            ModelChange::Root { .. } => return Err(SyncError::UnsupportedRootChange),
        }

        ctx.notices.push(SyncEvent::CellChanged {
            cell: self.cell.clone(),
        });
        Ok(())
    }

    /// First style write stores the whole structured style; later writes
    /// send only the structural diff, as one batch. An unchanged style
    /// writes nothing.
    fn write_style(&mut self, doc: &mut SharedDocument, style: Option<&str>) -> Result<(), SyncError> {
        match (self.mirror_style(doc), style) {
            (None, None) => {}
            (None, Some(style)) => {
                doc.map_set(&self.path, STYLE_KEY, style_value(&StyleData::parse(style)))?;
                self.bind_style(doc);
            }
            (Some(_), None) => {
                self.unbind_style(doc);
                doc.map_remove(&self.path, STYLE_KEY)?;
            }
            (Some(old), Some(style)) => {
                let diff = old.diff(&StyleData::parse(style));
                if !diff.is_empty() {
                    let (classes, styles) = (self.classes_path(), self.styles_path());
                    doc.batch(|txn| write_style_diff(txn, &classes, &styles, &diff))?;
                }
            }
        }
        Ok(())
    }

    // ─── Remote → local ──────────────────────────────────────────────

    /// Applies a mirror event to the cell without recording an edit.
    pub fn process_remote_event(
        &mut self,
        ctx: &mut SyncContext<'_>,
        event: &DocEvent,
    ) -> Result<(), SyncError> {
        if event.path == self.path {
            let (key, value) = match &event.change {
                DocChange::MapSet { key, value, .. } => (key, Some(value)),
                DocChange::MapRemove { key, .. } => (key, None),
                _ => return Err(SyncError::UnexpectedEvent(event.path.clone())),
            };
            return self.apply_key(ctx, key, value);
        }
        if event.path == self.classes_path() || event.path == self.styles_path() {
            return self.apply_mirror_style(ctx);
        }
        Err(SyncError::UnexpectedEvent(event.path.clone()))
    }

    fn apply_key(
        &mut self,
        ctx: &mut SyncContext<'_>,
        key: &str,
        value: Option<&SharedValue>,
    ) -> Result<(), SyncError> {
        let id = self.cell.clone();
        let json = value.map(SharedValue::to_json).filter(|v| !v.is_null());

        let changed = match key {
            PARENT_KEY => {
                let parent = cell_id_of(value);
                let current = existing(ctx.model, &id)?.parent.clone();
                if current == parent {
                    false
                } else {
                    ctx.model.apply_parent(&id, parent.as_ref())?;
                    true
                }
            }
            "source" | "target" => {
                let end = if key == "source" {
                    Terminal::Source
                } else {
                    Terminal::Target
                };
                let terminal = cell_id_of(value);
                if existing(ctx.model, &id)?.terminal(end) == terminal.as_ref() {
                    false
                } else {
                    ctx.model.apply_terminal(&id, terminal.as_ref(), end)?;
                    true
                }
            }
            VALUE_KEY => {
                let cell = existing_mut(ctx.model, &id)?;
                replace_if_changed(&mut cell.value, json)
            }
            VISIBLE_KEY => {
                let cell = existing_mut(ctx.model, &id)?;
                replace_if_changed(&mut cell.visible, json.and_then(|v| v.as_bool()))
            }
            COLLAPSED_KEY => {
                let cell = existing_mut(ctx.model, &id)?;
                replace_if_changed(&mut cell.collapsed, json.and_then(|v| v.as_bool()))
            }
            CONNECTABLE_KEY => {
                let cell = existing_mut(ctx.model, &id)?;
                replace_if_changed(&mut cell.connectable, json.and_then(|v| v.as_bool()))
            }
            GEOMETRY_KEY => {
                let geometry = json.as_ref().map(decode_geometry).transpose()?;
                let cell = existing_mut(ctx.model, &id)?;
                if replace_if_changed(&mut cell.geometry, geometry) {
                    ctx.view.refresh();
                    // Listeners run after the view has taken the new bounds.
                    ctx.tasks.defer(SyncEvent::CellChanged { cell: id });
                }
                return Ok(());
            }
            STYLE_KEY => {
                let style = value.filter(|v| !v.is_null()).map(read_style);
                match &style {
                    Some(_) if !self.style_bound => self.bind_style(ctx.doc),
                    None if self.style_bound => self.unbind_style(ctx.doc),
                    _ => {}
                }
                let cell = existing_mut(ctx.model, &id)?;
                let current = cell.style.as_deref().map(StyleData::parse);
                if current == style {
                    false
                } else {
                    cell.style = style.as_ref().map(decode_style);
                    true
                }
            }
            other => {
                log::debug!("Ignoring mirror key {other} of {id}");
                false
            }
        };

        if changed {
            ctx.view.refresh();
            ctx.notices.push(SyncEvent::CellChanged { cell: id });
        }
        Ok(())
    }

    /// Re-reads the whole mirrored style, so the cell ends up matching the
    /// mirror however the collection events were split or interleaved.
    fn apply_mirror_style(&mut self, ctx: &mut SyncContext<'_>) -> Result<(), SyncError> {
        let Some(mirror) = self.mirror_style(ctx.doc) else {
            return Ok(());
        };
        let cell = existing_mut(ctx.model, &self.cell)?;
        let current = cell.style.as_deref().map(StyleData::parse).unwrap_or_default();
        if mirror != current {
            cell.style = Some(decode_style(&mirror));
            ctx.view.refresh();
            ctx.notices.push(SyncEvent::CellChanged {
                cell: self.cell.clone(),
            });
        }
        Ok(())
    }
}

fn write_style_diff(
    txn: &mut DocTxn<'_>,
    classes: &DocPath,
    styles: &DocPath,
    diff: &StyleDiff,
) -> Result<(), DocError> {
    for class in &diff.removed_classes {
        txn.array_remove_value(classes, &Value::String(class.clone()))?;
    }
    let added: Vec<Value> = diff
        .added_classes
        .iter()
        .map(|c| Value::String(c.clone()))
        .collect();
    txn.array_push(classes, &added)?;
    for (name, value) in &diff.changed_styles {
        match value {
            Some(value) => txn.map_set(styles, name.as_str(), Value::String(value.clone()))?,
            None => {
                txn.map_remove(styles, name)?;
            }
        }
    }
    Ok(())
}

// ─── Mirror layout ───────────────────────────────────────────────────

/// Mirror map for a cell record: plain values per key, with the style as a
/// nested `{classes: array, styles: map}`.
pub fn mirror_value(record: &CellRecord) -> Result<SharedValue, SyncError> {
    let mut record = record.clone();
    let style = record.style.take();

    let mut map = BTreeMap::new();
    if let Value::Object(fields) = record.to_value()? {
        for (key, value) in fields {
            map.insert(key, SharedValue::Value(value));
        }
    }
    if let Some(style) = style {
        map.insert(STYLE_KEY.to_string(), style_value(&style));
    }
    Ok(SharedValue::Map(map))
}

pub fn style_value(style: &StyleData) -> SharedValue {
    let classes = style
        .classes
        .iter()
        .map(|c| Value::String(c.clone()))
        .collect();
    let styles = style
        .styles
        .iter()
        .map(|(k, v)| (k.clone(), SharedValue::Value(Value::String(v.clone()))))
        .collect();

    let mut map = BTreeMap::new();
    map.insert(CLASSES_KEY.to_string(), SharedValue::Array(classes));
    map.insert(STYLES_KEY.to_string(), SharedValue::Map(styles));
    SharedValue::Map(map)
}

/// Reads a mirrored style. Non-string class entries are skipped and
/// non-string property values are kept in their JSON form.
pub fn read_style(value: &SharedValue) -> StyleData {
    let json = value.to_json();
    let mut data = StyleData::default();
    if let Some(classes) = json.get(CLASSES_KEY).and_then(Value::as_array) {
        for class in classes.iter().filter_map(Value::as_str) {
            data.add_class(class);
        }
    }
    if let Some(styles) = json.get(STYLES_KEY).and_then(Value::as_object) {
        for (key, value) in styles {
            data.styles.insert(key.clone(), style_string(value));
        }
    }
    data
}

fn style_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn id_value(id: Option<&CellId>) -> Value {
    id.map(|id| Value::String(id.to_string()))
        .unwrap_or(Value::Null)
}

fn cell_id_of(value: Option<&SharedValue>) -> Option<CellId> {
    value
        .and_then(SharedValue::as_value)
        .and_then(Value::as_str)
        .map(CellId::from)
}

fn replace_if_changed<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn existing<'m>(model: &'m GraphModel, id: &CellId) -> Result<&'m Cell, CoreError> {
    model.cell(id).ok_or_else(|| CoreError::UnknownCell(id.clone()))
}

fn existing_mut<'m>(
    model: &'m mut GraphModel,
    id: &CellId,
) -> Result<&'m mut Cell, CoreError> {
    model
        .cell_mut(id)
        .ok_or_else(|| CoreError::UnknownCell(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Origin;
    use cellsync_core::codec::encode_cell;
    use cellsync_core::Geometry;
    use serde_json::json;

    struct Fixture {
        model: GraphModel,
        view: View,
        doc: SharedDocument,
        tasks: TaskQueue<SyncEvent>,
        notices: Vec<SyncEvent>,
        sync: CellSynchronizer,
    }

    impl Fixture {
        fn new(cell: Cell) -> Self {
            let mut model = GraphModel::with_default_layer();
            let id = cell.id.clone().unwrap();
            model.add_cell(cell, &CellId::from("1")).unwrap();
            model.drain_events();

            let mut doc = SharedDocument::new();
            let cells = DocPath::top("cells");
            let record = encode_cell(model.cell(&id).unwrap());
            doc.map_set(&cells, id.as_str(), mirror_value(&record).unwrap())
                .unwrap();
            doc.take_updates();

            let sync = CellSynchronizer::bind(id, &cells, &mut doc);
            Self {
                model,
                view: View::default(),
                doc,
                tasks: TaskQueue::new(),
                notices: Vec::new(),
                sync,
            }
        }

        fn local(&mut self, change: ModelChange) {
            let mut ctx = SyncContext {
                model: &mut self.model,
                view: &mut self.view,
                doc: &mut self.doc,
                tasks: &mut self.tasks,
                notices: &mut self.notices,
            };
            self.sync.process_local_change(&mut ctx, &change).unwrap();
        }

        /// Feeds every queued document event back, like the session does.
        fn echo(&mut self) {
            for event in self.doc.drain_events() {
                let mut ctx = SyncContext {
                    model: &mut self.model,
                    view: &mut self.view,
                    doc: &mut self.doc,
                    tasks: &mut self.tasks,
                    notices: &mut self.notices,
                };
                self.sync.process_remote_event(&mut ctx, &event).unwrap();
            }
        }

        fn id(&self) -> CellId {
            self.sync.cell().clone()
        }

        fn mirror(&self) -> Value {
            self.doc.get(self.sync.path()).unwrap().to_json()
        }
    }

    fn vertex(id: &str) -> Cell {
        let mut cell = Cell::vertex(Geometry::new(0.0, 0.0, 10.0, 10.0));
        cell.id = Some(id.into());
        cell
    }

    #[test]
    fn test_mirror_value_nests_style() {
        let record = encode_cell(&vertex("v").with_style("rounded;fillColor=#fff"));
        let mirror = mirror_value(&record).unwrap();
        let style = mirror.as_map().unwrap().get(STYLE_KEY).unwrap();
        assert_eq!(
            style.as_map().unwrap().get(CLASSES_KEY),
            Some(&SharedValue::Array(vec![json!("rounded")]))
        );
        assert_eq!(read_style(style), StyleData::parse("rounded;fillColor=#fff"));
    }

    #[test]
    fn test_read_style_tolerates_non_strings() {
        let value = SharedValue::Value(json!({"classes": ["a", 3], "styles": {"w": 2}}));
        let data = read_style(&value);
        assert_eq!(data.classes, vec!["a".to_string()]);
        assert_eq!(data.styles.get("w").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_value_change_writes_single_key() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        f.local(ModelChange::Value {
            cell: id.clone(),
            value: Some(json!("hello")),
            previous: None,
        });

        assert_eq!(f.doc.take_updates().len(), 1);
        assert_eq!(f.mirror()["value"], json!("hello"));
        assert_eq!(f.mirror()["vertex"], json!(true));
        assert_eq!(f.notices, vec![SyncEvent::CellChanged { cell: id }]);
    }

    #[test]
    fn test_style_lazy_init_then_diff() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        assert!(!f.sync.is_style_bound());

        f.local(ModelChange::Style {
            cell: id.clone(),
            style: Some("rounded;fillColor=#ffffff".into()),
            previous: None,
        });
        assert!(f.sync.is_style_bound());
        assert_eq!(
            f.mirror()["style"],
            json!({"classes": ["rounded"], "styles": {"fillColor": "#ffffff"}})
        );
        assert_eq!(f.doc.take_updates().len(), 1);

        f.local(ModelChange::Style {
            cell: id.clone(),
            style: Some("rounded;fillColor=#000000;strokeWidth=2".into()),
            previous: None,
        });
        let updates = f.doc.take_updates();
        assert_eq!(updates.len(), 1, "diff goes out as one batch");
        assert_eq!(
            f.mirror()["style"],
            json!({
                "classes": ["rounded"],
                "styles": {"fillColor": "#000000", "strokeWidth": "2"}
            })
        );
    }

    #[test]
    fn test_unchanged_style_writes_nothing() {
        let mut f = Fixture::new(vertex("v").with_style("a;x=1"));
        let id = f.id();
        f.local(ModelChange::Style {
            cell: id.clone(),
            style: Some("x=1;a".into()),
            previous: None,
        });
        assert!(f.doc.take_updates().is_empty());
        assert_eq!(f.notices, vec![SyncEvent::CellChanged { cell: id }]);
    }

    #[test]
    fn test_style_removed() {
        let mut f = Fixture::new(vertex("v").with_style("a"));
        let id = f.id();
        assert!(f.sync.is_style_bound());
        f.local(ModelChange::Style {
            cell: id,
            style: None,
            previous: Some("a".into()),
        });
        assert!(f.mirror().get("style").is_none());
        assert!(!f.sync.is_style_bound());
    }

    #[test]
    fn test_terminal_unchanged_is_skipped() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        f.local(ModelChange::Terminal {
            cell: id,
            end: Terminal::Source,
            terminal: None,
            previous: None,
        });
        assert!(f.doc.take_updates().is_empty());
        assert!(f.notices.is_empty());
    }

    #[test]
    fn test_root_change_is_rejected() {
        let mut f = Fixture::new(vertex("v"));
        let mut ctx = SyncContext {
            model: &mut f.model,
            view: &mut f.view,
            doc: &mut f.doc,
            tasks: &mut f.tasks,
            notices: &mut f.notices,
        };
        let change = ModelChange::Root {
            root: "r".into(),
            previous: None,
        };
        assert!(matches!(
            f.sync.process_local_change(&mut ctx, &change),
            Err(SyncError::UnsupportedRootChange)
        ));
    }

    #[test]
    fn test_local_echo_is_idempotent() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        f.model.drain_events();
        f.model.cell_mut(&id).unwrap().visible = Some(false);
        f.local(ModelChange::Visible {
            cell: id.clone(),
            visible: false,
        });
        f.notices.clear();
        let refreshes = f.view.refresh_count();

        f.echo();
        assert!(f.notices.is_empty());
        assert_eq!(f.view.refresh_count(), refreshes);
        assert!(f.doc.take_updates().len() == 1);
        assert!(!f.model.has_events());
    }

    #[test]
    fn test_remote_value_applies_silently() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        let event = DocEvent {
            path: f.sync.path().clone(),
            change: DocChange::MapSet {
                key: VALUE_KEY.into(),
                value: json!(42).into(),
                previous: None,
            },
            origin: Origin::Remote,
        };
        let mut ctx = SyncContext {
            model: &mut f.model,
            view: &mut f.view,
            doc: &mut f.doc,
            tasks: &mut f.tasks,
            notices: &mut f.notices,
        };
        f.sync.process_remote_event(&mut ctx, &event).unwrap();

        assert_eq!(f.model.cell(&id).unwrap().value, Some(json!(42)));
        assert!(!f.model.has_events());
        assert_eq!(f.view.refresh_count(), 1);
        assert_eq!(f.notices, vec![SyncEvent::CellChanged { cell: id }]);
    }

    #[test]
    fn test_remote_geometry_notifies_deferred() {
        let mut f = Fixture::new(vertex("v"));
        let id = f.id();
        let event = DocEvent {
            path: f.sync.path().clone(),
            change: DocChange::MapSet {
                key: GEOMETRY_KEY.into(),
                value: json!({"x": 5, "y": 5, "width": 10, "height": 10}).into(),
                previous: None,
            },
            origin: Origin::Remote,
        };
        let mut ctx = SyncContext {
            model: &mut f.model,
            view: &mut f.view,
            doc: &mut f.doc,
            tasks: &mut f.tasks,
            notices: &mut f.notices,
        };
        f.sync.process_remote_event(&mut ctx, &event).unwrap();

        assert_eq!(
            f.model.cell(&id).unwrap().geometry,
            Some(Geometry::new(5.0, 5.0, 10.0, 10.0))
        );
        assert!(f.notices.is_empty());
        assert_eq!(f.tasks.drain(), vec![SyncEvent::CellChanged { cell: id }]);
    }

    #[test]
    fn test_remote_style_collection_events() {
        let mut f = Fixture::new(vertex("v").with_style("a;x=1"));
        let id = f.id();
        let classes = f.sync.classes_path();
        let styles = f.sync.styles_path();

        let mut peer = SharedDocument::from_snapshot(&f.doc.snapshot()).unwrap();
        peer.batch(|txn| {
            txn.array_remove_value(&classes, &json!("a"))?;
            txn.array_push(&classes, &[json!("b")])?;
            txn.map_set(&styles, "y", json!("2"))?;
            txn.map_remove(&styles, "x").map(|_| ())
        })
        .unwrap();
        for update in peer.take_updates() {
            f.doc.apply_update(&update).unwrap();
        }
        f.echo();

        assert_eq!(f.model.cell(&id).unwrap().style.as_deref(), Some("b;y=2;"));
        assert_eq!(f.notices, vec![SyncEvent::CellChanged { cell: id }]);
        assert!(!f.model.has_events());
    }

    #[test]
    fn test_remote_parent_unknown_is_error() {
        let mut f = Fixture::new(vertex("v"));
        let event = DocEvent {
            path: f.sync.path().clone(),
            change: DocChange::MapSet {
                key: PARENT_KEY.into(),
                value: json!("ghost").into(),
                previous: None,
            },
            origin: Origin::Remote,
        };
        let mut ctx = SyncContext {
            model: &mut f.model,
            view: &mut f.view,
            doc: &mut f.doc,
            tasks: &mut f.tasks,
            notices: &mut f.notices,
        };
        assert!(f.sync.process_remote_event(&mut ctx, &event).is_err());
    }
}
