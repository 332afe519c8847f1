//! Synchronous signal with revocable connections.
//!
//! A [`Signal`] calls its connected slots in connection order, in-line on
//! the emitting thread. Each emission iterates a snapshot of the slot list
//! taken when the emission starts, so slots may connect or disconnect
//! (themselves or others) while the signal is being emitted:
//!
//! - a slot connected during an emission is not called by that emission;
//! - a slot disconnected during an emission is not called by it either,
//!   unless it had already been called.
//!
//! ```text
//!   emit(&args) ─► snapshot [s1, s2, s3]
//!                   ├─► s1 active? ─► s1(args)   (s1 disconnects s3)
//!                   ├─► s2 active? ─► s2(args)
//!                   └─► s3 active? ─► skipped
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifier of one connection on one signal.
pub type SlotId = u64;

type SlotFn<A> = dyn Fn(&A) + Send + Sync + 'static;

struct SlotEntry<A> {
    id: SlotId,
    active: Arc<AtomicBool>,
    slot: Box<SlotFn<A>>,
}

/// Type-erased removal used by [`Connection`].
trait Detach: Send + Sync {
    fn detach(&self, id: SlotId);
}

struct Slots<A> {
    entries: Mutex<Vec<Arc<SlotEntry<A>>>>,
}

impl<A> Detach for Slots<A>
where
    A: 'static,
{
    fn detach(&self, id: SlotId) {
        self.entries.lock().retain(|entry| entry.id != id);
    }
}

/// A list of slots that can be emitted to.
pub struct Signal<A> {
    slots: Arc<Slots<A>>,
    next_id: AtomicU64,
}

impl<A: 'static> Signal<A> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Slots {
                entries: Mutex::new(Vec::new()),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a slot and return the handle that revokes it.
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.slots.entries.lock().push(Arc::new(SlotEntry {
            id,
            active: Arc::clone(&active),
            slot: Box::new(slot),
        }));

        let slots: Weak<dyn Detach> = Arc::downgrade(&self.slots) as Weak<dyn Detach>;
        Connection { id, active, slots }
    }

    /// Call every connected slot with `args`; returns how many were called.
    pub fn emit(&self, args: &A) -> usize {
        let snapshot: Vec<Arc<SlotEntry<A>>> = self.slots.entries.lock().clone();
        let mut called = 0;
        for entry in snapshot {
            if entry.active.load(Ordering::Acquire) {
                (entry.slot)(args);
                called += 1;
            }
        }
        called
    }

    /// Number of live connections.
    pub fn slot_count(&self) -> usize {
        self.slots.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }

    /// Revoke every connection.
    pub fn disconnect_all(&self) -> usize {
        let drained: Vec<_> = std::mem::take(&mut *self.slots.entries.lock());
        for entry in &drained {
            entry.active.store(false, Ordering::Release);
        }
        drained.len()
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.entries.lock().len())
            .finish()
    }
}

/// Revocable link between a signal and one slot.
///
/// Dropping a `Connection` does not disconnect it; call
/// [`Connection::disconnect`]. Disconnecting is idempotent and takes effect
/// before it returns, including for an emission already in progress.
pub struct Connection {
    id: SlotId,
    active: Arc<AtomicBool>,
    slots: Weak<dyn Detach>,
}

impl Connection {
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Revoke the slot. Returns `true` if this call revoked it.
    pub fn disconnect(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(slots) = self.slots.upgrade() {
            slots.detach(self.id);
        }
        true
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
