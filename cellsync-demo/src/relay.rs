//! Stand-in transport: every message reaches every other session.

use cellsync_collab::{CollabSession, SyncError};

pub struct Relay {
    sessions: Vec<CollabSession>,
    delivered: usize,
}

impl Relay {
    pub fn new(sessions: Vec<CollabSession>) -> Self {
        Self {
            sessions,
            delivered: 0,
        }
    }

    pub fn session(&self, index: usize) -> &CollabSession {
        &self.sessions[index]
    }

    pub fn session_mut(&mut self, index: usize) -> &mut CollabSession {
        &mut self.sessions[index]
    }

    pub fn push(&mut self, session: CollabSession) {
        self.sessions.push(session);
    }

    /// Messages delivered so far, counted once per recipient.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Delivers until no session has anything left to send.
    pub fn settle(&mut self) -> Result<(), SyncError> {
        loop {
            let mut sent = false;
            for from in 0..self.sessions.len() {
                let outgoing = self.sessions[from].take_outgoing();
                sent |= !outgoing.is_empty();
                for bytes in &outgoing {
                    for (to, peer) in self.sessions.iter_mut().enumerate() {
                        if to != from {
                            peer.receive(bytes)?;
                            self.delivered += 1;
                        }
                    }
                }
            }
            if !sent {
                return Ok(());
            }
        }
    }
}
