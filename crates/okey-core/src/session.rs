//! A shareable handle that serializes access to one controller.
//!
//! UI intents and transport deliveries can arrive on different threads. Both
//! go through the same mutex, so the board only ever moves from one committed
//! state to the next.

use crate::actions::{GameEvent, Intent};
use crate::game::{GameController, GameError};
use crate::snapshot::MultiplayerSnapshot;
use crate::transport::TransportEvent;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable, thread-safe handle to a [`GameController`]
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<GameController>>,
}

impl SessionHandle {
    pub fn new(controller: GameController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GameController> {
        // Every mutation commits or rejects before returning, so a panic in
        // an observer cannot leave a half-applied board behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with exclusive access. Observers run under this lock and must
    /// not call back into the handle.
    pub fn with<R>(&self, f: impl FnOnce(&mut GameController) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn apply(&self, intent: Intent) -> Result<GameEvent, GameError> {
        self.lock().apply_intent(intent)
    }

    /// Entry point for the transport's delivery context
    pub fn deliver(&self, event: TransportEvent) -> Option<GameEvent> {
        self.lock().handle_transport_event(event)
    }

    /// Deliver everything waiting in `inbox` without blocking. Returns how
    /// many deliveries produced an event.
    pub fn pump(&self, inbox: &Receiver<TransportEvent>) -> usize {
        inbox
            .try_iter()
            .filter_map(|event| self.deliver(event))
            .count()
    }

    pub fn snapshot(&self) -> MultiplayerSnapshot {
        self.lock().snapshot()
    }
}
