//! One participant: local graph, replica, presence and overlays, wired
//! through a single-threaded dispatch loop.
//!
//! ```text
//!            edit() / pointer_*() / receive()
//!                         │
//!                         ▼
//!   ┌──────────────────── pump() ───────────────────────┐
//!   │ ModelEvent ─▶ GraphSynchronizer ─▶ DocEvent echo  │
//!   │ DocEvent   ─▶ GraphSynchronizer ─▶ silent setters │
//!   │ ActivityEvent ─▶ CursorOverlay / SelectionOverlay │
//!   │ SyncEvent  ─▶ SelectionOverlay, listeners         │
//!   │ TaskQueue  ─▶ next round                          │
//!   └───────────────────────────────────────────────────┘
//!                         │
//!                         ▼
//!                take_outgoing() ─▶ transport
//! ```

use uuid::Uuid;

use cellsync_core::{GraphModel, ModelEvent, Point, View};

use crate::cell_sync::SyncContext;
use crate::colors::ColorAssigner;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{ListenerId, SyncEvent, SyncListener};
use crate::graph_sync::{decode_document, GraphSynchronizer};
use crate::ids::{IdGenerator, RandomIdGenerator};
use crate::overlay::{CursorOverlay, SelectionOverlay};
use crate::presence::{Activity, ActivityEvent};
use crate::protocol::{MessageType, SyncMessage};
use crate::shared::{DocSnapshot, SharedDocument};
use crate::tasks::TaskQueue;

/// Upper bound on dispatch rounds per pump; reaching it means events keep
/// producing events.
const MAX_ROUNDS: usize = 1024;

pub struct CollabSession {
    config: SyncConfig,
    model: GraphModel,
    view: View,
    doc: SharedDocument,
    activity: Activity,
    sync: GraphSynchronizer,
    tasks: TaskQueue<SyncEvent>,
    notices: Vec<SyncEvent>,
    colors: ColorAssigner,
    cursors: CursorOverlay,
    selections: SelectionOverlay,
}

impl CollabSession {
    /// Starts a new shared document from a local graph.
    pub fn host(name: &str, model: GraphModel, config: SyncConfig) -> Result<Self, SyncError> {
        Self::assemble(name, model, SharedDocument::new(), config)
    }

    /// Joins an existing document from a peer's snapshot. The local graph is
    /// decoded from the mirror.
    pub fn join(name: &str, snapshot: DocSnapshot, config: SyncConfig) -> Result<Self, SyncError> {
        let doc = SharedDocument::from_snapshot(&snapshot)?;
        let model = decode_document(&doc)?;
        Self::assemble(name, model, doc, config)
    }

    fn assemble(
        name: &str,
        mut model: GraphModel,
        mut doc: SharedDocument,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let mut view = View::default();
        let mut tasks = TaskQueue::new();
        let mut notices = Vec::new();
        let mut sync = GraphSynchronizer::new(Box::new(RandomIdGenerator::new(config.id_length)));
        sync.initialize(&mut SyncContext {
            model: &mut model,
            view: &mut view,
            doc: &mut doc,
            tasks: &mut tasks,
            notices: &mut notices,
        })?;
        // Edits made before the session existed are already in the mirror.
        model.drain_events();
        doc.drain_events();

        let mut activity = Activity::new(name);
        activity.join();

        let mut colors = ColorAssigner::from_hex(&config.palette);
        let cursors = CursorOverlay::new(&activity, &view, &mut colors, config.publish_pointer);
        let selections = SelectionOverlay::new(
            &activity,
            &model,
            &view,
            &mut colors,
            config.highlight_stroke_width,
        );
        log::info!(
            "Session {} ready on replica {} with {} cells",
            activity.session_id(),
            doc.replica_id(),
            model.len()
        );

        Ok(Self {
            config,
            model,
            view,
            doc,
            activity,
            sync,
            tasks,
            notices,
            colors,
            cursors,
            selections,
        })
    }

    /// Replaces the id generator, e.g. with a deterministic one.
    pub fn with_id_generator(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.sync.set_id_generator(ids);
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn session_id(&self) -> Uuid {
        self.activity.session_id()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn synchronizer(&self) -> &GraphSynchronizer {
        &self.sync
    }

    pub fn cursors(&self) -> &CursorOverlay {
        &self.cursors
    }

    pub fn selections(&self) -> &SelectionOverlay {
        &self.selections
    }

    pub fn cursors_mut(&mut self) -> &mut CursorOverlay {
        &mut self.cursors
    }

    // ─── Local input ─────────────────────────────────────────────────

    /// Runs a local edit and propagates it.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut GraphModel) -> R) -> R {
        let result = f(&mut self.model);
        self.pump();
        result
    }

    /// Changes the viewport; markers and highlights follow.
    pub fn set_view(&mut self, scale: f64, translate: Point) {
        self.view.scale = scale;
        self.view.translate = translate;
        self.view.refresh();
        self.cursors.reposition(&self.view);
        let cells: Vec<_> = self.model.ids().cloned().collect();
        for cell in cells {
            self.selections
                .handle_sync_event(&SyncEvent::CellChanged { cell }, &self.model, &self.view);
        }
    }

    pub fn pointer_moved(&mut self, screen: Point) {
        self.cursors
            .pointer_moved(screen, &self.view, &mut self.activity);
        self.pump();
    }

    pub fn pointer_left(&mut self) {
        self.cursors.pointer_left(&mut self.activity);
        self.pump();
    }

    pub fn pointer_entered(&mut self) {
        self.cursors.pointer_entered();
    }

    /// Leaves the activity; remote markers and highlights are dropped.
    pub fn leave(&mut self) {
        self.activity.leave();
        self.pump();
    }

    // ─── Dispatch ────────────────────────────────────────────────────

    /// Drains every queue until nothing is left to deliver.
    pub fn pump(&mut self) {
        for _ in 0..MAX_ROUNDS {
            if !self.dispatch_round() {
                return;
            }
        }
        log::error!("Dispatch did not settle after {MAX_ROUNDS} rounds");
    }

    fn dispatch_round(&mut self) -> bool {
        let mut progressed = false;

        for event in self.model.drain_events() {
            progressed = true;
            self.dispatch_model_event(&event);
            self.dispatch_doc_events();
        }
        progressed |= self.dispatch_doc_events();

        for event in self.activity.drain_events() {
            progressed = true;
            self.dispatch_activity_event(&event);
        }

        for notice in std::mem::take(&mut self.notices) {
            progressed = true;
            self.selections
                .handle_sync_event(&notice, &self.model, &self.view);
            self.sync.fire(&notice);
        }

        // Deferred notices go out once this round's handlers are done.
        let deferred = self.tasks.drain();
        if !deferred.is_empty() {
            progressed = true;
            self.notices.extend(deferred);
        }
        progressed
    }

    fn dispatch_model_event(&mut self, event: &ModelEvent) {
        let mut ctx = SyncContext {
            model: &mut self.model,
            view: &mut self.view,
            doc: &mut self.doc,
            tasks: &mut self.tasks,
            notices: &mut self.notices,
        };
        self.sync.handle_model_event(&mut ctx, event);

        if let ModelEvent::SelectionChanged { .. } = event {
            self.selections
                .local_selection_changed(&self.model, &self.view, &mut self.activity);
        }
    }

    fn dispatch_doc_events(&mut self) -> bool {
        let events = self.doc.drain_events();
        let mut ctx = SyncContext {
            model: &mut self.model,
            view: &mut self.view,
            doc: &mut self.doc,
            tasks: &mut self.tasks,
            notices: &mut self.notices,
        };
        for event in &events {
            self.sync.handle_doc_event(&mut ctx, event);
        }
        !events.is_empty()
    }

    fn dispatch_activity_event(&mut self, event: &ActivityEvent) {
        self.cursors
            .handle_activity_event(event, &self.activity, &self.view, &mut self.colors);
        self.selections
            .handle_activity_event(event, &self.model, &self.view, &mut self.colors);
        if let ActivityEvent::SessionLeft { session_id } = event {
            self.colors.release(session_id);
        }
    }

    // ─── Transport ───────────────────────────────────────────────────

    /// Everything to send to peers since the last call: document updates
    /// first, then presence.
    pub fn take_messages(&mut self) -> Vec<SyncMessage> {
        let peer = self.activity.session_id();
        let mut messages = Vec::new();
        for update in self.doc.take_updates() {
            messages.push(SyncMessage::update(peer, &update));
        }
        for awareness in self.activity.take_messages() {
            match SyncMessage::awareness(peer, &awareness) {
                Ok(msg) => messages.push(msg),
                Err(e) => log::error!("Dropping presence message: {e}"),
            }
        }
        messages
    }

    /// [`CollabSession::take_messages`], encoded for the wire.
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        self.take_messages()
            .iter()
            .filter_map(|msg| match msg.encode() {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::error!("Could not encode outgoing message: {e}");
                    None
                }
            })
            .collect()
    }

    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), SyncError> {
        let msg = SyncMessage::decode(bytes)?;
        self.receive_message(&msg)
    }

    pub fn receive_message(&mut self, msg: &SyncMessage) -> Result<(), SyncError> {
        match msg.msg_type {
            MessageType::Update => {
                let update = msg.doc_update()?;
                self.doc.apply_update(&update)?;
                log::trace!("Applied {} byte update from {}", update.len(), msg.peer_id);
            }
            MessageType::Awareness => {
                self.activity.handle_message(&msg.awareness_message()?);
            }
        }
        self.pump();
        Ok(())
    }

    /// Snapshot a new participant can join from.
    pub fn snapshot(&self) -> DocSnapshot {
        self.doc.snapshot()
    }

    // ─── Listeners ───────────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: Box<dyn SyncListener>) -> ListenerId {
        self.sync.add_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.sync.remove_listener(id)
    }
}
