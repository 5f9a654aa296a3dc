//! ==============================================================================
//! broadcaster.rs - live viewer registry and fan-out
//! ==============================================================================
//!
//! purpose:
//!     every connected viewer owns a bounded queue. broadcasting a reading
//!     means pushing it into every queue that is still open. there is no
//!     buffering for late joiners: with no viewers the event is dropped.
//!
//! concurrency:
//!     the sink map sits behind a std mutex that is never held across an
//!     await. `try_send` keeps a slow viewer from stalling ingestion:
//!     - queue full:   this event is skipped for that viewer only
//!     - queue closed: the viewer is gone and its sink is removed
//!
//! relationships:
//!     - used by: handlers.rs (broadcast on ingest, subscribe on /ws)
//!
//! ==============================================================================

use crate::domain::ViewerEvent;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

type Sinks = HashMap<u64, mpsc::Sender<ViewerEvent>>;

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

struct Inner {
    sinks: Mutex<Sinks>,
    next_id: AtomicU64,
    capacity: usize,
}

/// one open viewer connection; unregisters itself when dropped
pub struct ViewerSession {
    id: u64,
    events: mpsc::Receiver<ViewerEvent>,
    registry: Broadcaster,
}

impl ViewerSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// next event for this viewer, `None` once the broadcaster shut it down
    pub async fn recv(&mut self) -> Option<ViewerEvent> {
        self.events.recv().await
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                sinks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    fn sinks(&self) -> MutexGuard<'_, Sinks> {
        // a panicked holder cannot leave the map half-updated
        self.inner.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> ViewerSession {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let count = {
            let mut sinks = self.sinks();
            sinks.insert(id, tx);
            sinks.len()
        };
        debug!(viewer = id, viewers = count, "viewer connected");
        ViewerSession { id, events: rx, registry: self.clone() }
    }

    fn unregister(&self, id: u64) {
        let removed = self.sinks().remove(&id).is_some();
        if removed {
            debug!(viewer = id, "viewer disconnected");
        }
    }

    /// push `event` to every open viewer; returns how many queued it
    pub fn broadcast(&self, event: &ViewerEvent) -> usize {
        let mut sinks = self.sinks();
        if sinks.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sink) in sinks.iter() {
            match sink.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(viewer = id, "viewer queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            sinks.remove(&id);
            debug!(viewer = id, "removed closed viewer");
        }
        delivered
    }

    pub fn viewer_count(&self) -> usize {
        self.sinks().len()
    }

    /// drop every sink; open sessions see `recv() == None` and wind down
    pub fn close_all(&self) {
        let mut sinks = self.sinks();
        let count = sinks.len();
        sinks.clear();
        debug!(viewers = count, "closed all viewer sessions");
    }
}
