//! Participant roster and per-participant ephemeral state.
//!
//! ## Architecture
//!
//! ```text
//! Activity::set_state("pointer", …)
//!       │
//!       ├──▶ ActivityEvent::StateSet { local: true }   (own overlays ignore it)
//!       ▼
//! AwarenessMessage::StateSet { … }   (bincode)
//!       │
//!       ▼   (transport)
//! Remote Activity::handle_message()
//!       │
//!       ▼
//! ActivityEvent::StateSet { local: false } ──▶ cursor / selection overlays
//! ```
//!
//! There is no server: a participant that sees a `Join` from someone it does
//! not know answers with a `Present` carrying its own state, so rosters
//! converge between peers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use cellsync_core::Point;

use crate::error::PresenceError;

/// State key holding the pointer position in graph coordinates.
pub const POINTER_KEY: &str = "pointer";
/// State key holding the ordered list of selected cell ids.
pub const SELECTION_KEY: &str = "selection";

// ───────────────────────────────────────────────────────────────────
// Core types
// ───────────────────────────────────────────────────────────────────

/// 2D position in graph coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Point::new(v.x, v.y)
    }
}

/// RGBA color for cursor/selection rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl CursorColor {
    /// Stable, vivid color derived from a session id (HSL hue from the id).
    pub fn from_uuid(id: Uuid) -> Self {
        let hash = id.as_u128();
        let hue = ((hash % 360) as f32) / 360.0;
        let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.6);
        Self { r, g, b, a: 1.0 }
    }

    /// Parses `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: 1.0,
        })
    }

    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for CursorColor {
    fn default() -> Self {
        Self { r: 0.26, g: 0.52, b: 0.96, a: 1.0 } // Default blue
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l); // Achromatic
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (r, g, b)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// Value stored under a presence state key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Point(Vec2),
    Ids(Vec<String>),
    Text(String),
}

impl StateValue {
    pub fn as_point(&self) -> Option<Vec2> {
        match self {
            StateValue::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_ids(&self) -> Option<&[String]> {
        match self {
            StateValue::Ids(ids) => Some(ids),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Wire protocol messages
// ───────────────────────────────────────────────────────────────────

/// Awareness message types sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AwarenessMessage {
    /// Announce a session, with its current state.
    Join {
        session_id: Uuid,
        name: String,
        state: Vec<(String, StateValue)>,
    },

    /// Answer to a `Join`, addressed to the joining session.
    Present {
        session_id: Uuid,
        name: String,
        state: Vec<(String, StateValue)>,
        to: Uuid,
    },

    /// Clean disconnect.
    Leave { session_id: Uuid },

    StateSet {
        session_id: Uuid,
        key: String,
        value: StateValue,
    },

    StateRemoved { session_id: Uuid, key: String },
}

impl AwarenessMessage {
    /// Encode to binary (bincode).
    pub fn encode(&self) -> Result<Vec<u8>, PresenceError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PresenceError::Encode(e.to_string()))
    }

    /// Decode from binary.
    pub fn decode(bytes: &[u8]) -> Result<Self, PresenceError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PresenceError::Decode(e.to_string()))?;
        Ok(msg)
    }

    /// The sending session.
    pub fn session_id(&self) -> Uuid {
        match self {
            AwarenessMessage::Join { session_id, .. }
            | AwarenessMessage::Present { session_id, .. }
            | AwarenessMessage::Leave { session_id }
            | AwarenessMessage::StateSet { session_id, .. }
            | AwarenessMessage::StateRemoved { session_id, .. } => *session_id,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Roster
// ───────────────────────────────────────────────────────────────────

/// One session in the activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub session_id: Uuid,
    pub name: String,
    pub local: bool,
    state: BTreeMap<String, StateValue>,
}

impl Participant {
    fn new(session_id: Uuid, name: String, local: bool) -> Self {
        Self {
            session_id,
            name,
            local,
            state: BTreeMap::new(),
        }
    }

    pub fn state(&self, key: &str) -> Option<&StateValue> {
        self.state.get(key)
    }

    pub fn states(&self) -> impl Iterator<Item = (&String, &StateValue)> {
        self.state.iter()
    }

    fn state_entries(&self) -> Vec<(String, StateValue)> {
        self.state
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Roster and state notifications. `local` is set when the change was made
/// by this session.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    SessionJoined {
        session_id: Uuid,
    },
    SessionLeft {
        session_id: Uuid,
    },
    StateSet {
        session_id: Uuid,
        key: String,
        value: StateValue,
        local: bool,
    },
    StateRemoved {
        session_id: Uuid,
        key: String,
        local: bool,
    },
}

impl ActivityEvent {
    pub fn is_local(&self) -> bool {
        match self {
            ActivityEvent::StateSet { local, .. } | ActivityEvent::StateRemoved { local, .. } => {
                *local
            }
            _ => false,
        }
    }
}

/// Presence for one local session: its own state plus every remote
/// participant it has heard of.
pub struct Activity {
    local: Participant,
    remote: HashMap<Uuid, Participant>,
    joined: bool,
    outbox: Vec<AwarenessMessage>,
    events: VecDeque<ActivityEvent>,
}

impl Activity {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_session_id(Uuid::new_v4(), name)
    }

    pub fn with_session_id(session_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            local: Participant::new(session_id, name.into(), true),
            remote: HashMap::new(),
            joined: false,
            outbox: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.local.session_id
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Announces this session to peers.
    pub fn join(&mut self) {
        self.joined = true;
        self.outbox.push(AwarenessMessage::Join {
            session_id: self.local.session_id,
            name: self.local.name.clone(),
            state: self.local.state_entries(),
        });
        log::info!("Session {} joined as {}", self.local.session_id, self.local.name);
    }

    /// Leaves the activity. Every remote participant is dropped from the
    /// roster.
    pub fn leave(&mut self) {
        if !self.joined {
            return;
        }
        self.joined = false;
        self.outbox.push(AwarenessMessage::Leave {
            session_id: self.local.session_id,
        });
        let mut gone: Vec<Uuid> = self.remote.keys().copied().collect();
        gone.sort();
        self.remote.clear();
        for session_id in gone {
            self.events
                .push_back(ActivityEvent::SessionLeft { session_id });
        }
    }

    /// Sets a local state entry and broadcasts it.
    pub fn set_state(&mut self, key: &str, value: StateValue) {
        self.local.state.insert(key.to_string(), value.clone());
        self.events.push_back(ActivityEvent::StateSet {
            session_id: self.local.session_id,
            key: key.to_string(),
            value: value.clone(),
            local: true,
        });
        if self.joined {
            self.outbox.push(AwarenessMessage::StateSet {
                session_id: self.local.session_id,
                key: key.to_string(),
                value,
            });
        }
    }

    /// Removes a local state entry. Returns whether it existed.
    pub fn remove_state(&mut self, key: &str) -> bool {
        if self.local.state.remove(key).is_none() {
            return false;
        }
        self.events.push_back(ActivityEvent::StateRemoved {
            session_id: self.local.session_id,
            key: key.to_string(),
            local: true,
        });
        if self.joined {
            self.outbox.push(AwarenessMessage::StateRemoved {
                session_id: self.local.session_id,
                key: key.to_string(),
            });
        }
        true
    }

    /// Local state entry.
    pub fn state(&self, key: &str) -> Option<&StateValue> {
        self.local.state(key)
    }

    /// Looks up any participant, local included.
    pub fn participant(&self, session_id: &Uuid) -> Option<&Participant> {
        if *session_id == self.local.session_id {
            return Some(&self.local);
        }
        self.remote.get(session_id)
    }

    /// Remote participants, ordered by session id.
    pub fn remote_participants(&self) -> Vec<&Participant> {
        let mut peers: Vec<&Participant> = self.remote.values().collect();
        peers.sort_by_key(|p| p.session_id);
        peers
    }

    pub fn remote_count(&self) -> usize {
        self.remote.len()
    }

    /// Decodes and handles a message from the transport.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), PresenceError> {
        let msg = AwarenessMessage::decode(bytes)?;
        self.handle_message(&msg);
        Ok(())
    }

    /// Applies a peer's message to the roster.
    pub fn handle_message(&mut self, msg: &AwarenessMessage) {
        if msg.session_id() == self.local.session_id {
            return;
        }

        match msg {
            AwarenessMessage::Join {
                session_id,
                name,
                state,
            } => {
                if self.remote.contains_key(session_id) {
                    log::debug!("Duplicate join from {session_id}");
                    return;
                }
                self.admit(*session_id, name.clone(), state);
                if self.joined {
                    self.outbox.push(AwarenessMessage::Present {
                        session_id: self.local.session_id,
                        name: self.local.name.clone(),
                        state: self.local.state_entries(),
                        to: *session_id,
                    });
                }
            }

            AwarenessMessage::Present {
                session_id,
                name,
                state,
                to,
            } => {
                if *to != self.local.session_id || self.remote.contains_key(session_id) {
                    return;
                }
                self.admit(*session_id, name.clone(), state);
            }

            AwarenessMessage::Leave { session_id } => {
                if self.remote.remove(session_id).is_some() {
                    log::info!("Session {session_id} left");
                    self.events.push_back(ActivityEvent::SessionLeft {
                        session_id: *session_id,
                    });
                }
            }

            AwarenessMessage::StateSet {
                session_id,
                key,
                value,
            } => {
                // A peer that joined before we connected: admit it with a
                // placeholder name.
                if !self.remote.contains_key(session_id) {
                    let name = format!("Peer-{}", &session_id.to_string()[..8]);
                    self.admit(*session_id, name, &[]);
                }
                if let Some(peer) = self.remote.get_mut(session_id) {
                    peer.state.insert(key.clone(), value.clone());
                }
                self.events.push_back(ActivityEvent::StateSet {
                    session_id: *session_id,
                    key: key.clone(),
                    value: value.clone(),
                    local: false,
                });
            }

            AwarenessMessage::StateRemoved { session_id, key } => {
                let removed = self
                    .remote
                    .get_mut(session_id)
                    .and_then(|peer| peer.state.remove(key));
                if removed.is_some() {
                    self.events.push_back(ActivityEvent::StateRemoved {
                        session_id: *session_id,
                        key: key.clone(),
                        local: false,
                    });
                }
            }
        }
    }

    fn admit(&mut self, session_id: Uuid, name: String, state: &[(String, StateValue)]) {
        let mut peer = Participant::new(session_id, name, false);
        peer.state = state.iter().cloned().collect();
        log::info!("Session {session_id} ({}) is present", peer.name);
        self.remote.insert(session_id, peer);
        self.events
            .push_back(ActivityEvent::SessionJoined { session_id });
        for (key, value) in state {
            self.events.push_back(ActivityEvent::StateSet {
                session_id,
                key: key.clone(),
                value: value.clone(),
                local: false,
            });
        }
    }

    /// Messages to broadcast, oldest first.
    pub fn take_messages(&mut self) -> Vec<AwarenessMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<ActivityEvent> {
        self.events.drain(..).collect()
    }
}

// ===================================================================
// Tests
// ===================================================================
