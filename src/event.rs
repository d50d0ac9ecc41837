//! Rotation events and the listeners that receive them.
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        mpsc::{self, Receiver, SyncSender, TrySendError},
        Arc,
    },
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

/// One decoded detent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub direction: RotationDirection,
}

impl RotationEvent {
    pub fn new(direction: RotationDirection) -> Self {
        Self { direction }
    }
}

/// Receives decoded rotations.
///
/// Listeners run on the thread that delivered the completing edge, which
/// may be an interrupt poller. They must return quickly and must not block;
/// use a [`QueuedListener`] to move heavy work to another thread.
pub trait RotationListener: Send + Sync {
    fn on_rotation(&self, event: &RotationEvent);
}

impl<F> RotationListener for F
where
    F: Fn(&RotationEvent) + Send + Sync,
{
    fn on_rotation(&self, event: &RotationEvent) {
        self(event)
    }
}

/// Handle returned by a subscription, used to unsubscribe again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn RotationListener>)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, listener: Arc<dyn RotationListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    // Cloned out so listeners can be called without holding the registry lock
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn RotationListener>> {
        self.entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Forwards events into a bounded queue without ever blocking the caller.
///
/// When the queue is full the event is dropped and a warning is logged.
#[derive(Debug, Clone)]
pub struct QueuedListener {
    sender: SyncSender<RotationEvent>,
}

impl QueuedListener {
    /// Create a listener and the receiving end of its queue.
    pub fn bounded(capacity: usize) -> (Self, Receiver<RotationEvent>) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl RotationListener for QueuedListener {
    fn on_rotation(&self, event: &RotationEvent) {
        match self.sender.try_send(*event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Rotation queue full, dropping {:?}", event.direction)
            }
            Err(TrySendError::Disconnected(event)) => {
                trace!("Rotation queue closed, dropping {:?}", event.direction)
            }
        }
    }
}
