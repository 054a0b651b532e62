//! Notifications for code outside the synchronizer.

use std::panic::{self, AssertUnwindSafe};

use cellsync_core::CellId;

use crate::error::ListenerError;

/// Emitted after a cell has been changed, locally or remotely, and after
/// cells were removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    CellChanged { cell: CellId },
    CellsRemoved { cells: Vec<CellId> },
}

pub trait SyncListener {
    fn on_event(&mut self, event: &SyncEvent) -> Result<(), ListenerError>;
}

impl<F> SyncListener for F
where
    F: FnMut(&SyncEvent) -> Result<(), ListenerError>,
{
    fn on_event(&mut self, event: &SyncEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Handle returned by [`Listeners::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    next: u64,
    entries: Vec<(ListenerId, Box<dyn SyncListener>)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn SyncListener>) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delivers `event` to every listener. A listener that fails or panics
    /// is logged; the others still run.
    pub fn fire(&mut self, event: &SyncEvent) {
        for (id, listener) in &mut self.entries {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Listener {id:?} failed on {event:?}: {e}"),
                Err(_) => log::error!("Listener {id:?} panicked on {event:?}"),
            }
        }
    }
}
