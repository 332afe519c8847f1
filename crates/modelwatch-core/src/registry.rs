//! Ordered registry of observer handles.
//!
//! Registration is idempotent per [`ObserverId`]. Each handle owns one
//! subscription per kind its capability table supports; removing the
//! handle revokes all of them before `remove` returns.

use crate::capability::CapabilityTable;
use crate::dispatch::Dispatcher;
use crate::error::RegistrationError;
use crate::event::{Event, EventKind};
use crate::observer::{ObserverId, ObserverRef};
use crate::signal::Connection;
use crate::source::SignalSource;
use parking_lot::Mutex;
use std::sync::Arc;

/// Revocable link between one notification point and one observer.
#[derive(Debug)]
struct Subscription {
    kind: EventKind,
    connection: Connection,
}

impl Subscription {
    /// Idempotent; effective before it returns.
    fn revoke(&self) -> bool {
        let revoked = self.connection.disconnect();
        if revoked {
            tracing::trace!(event_kind = %self.kind, "subscription revoked");
        }
        revoked
    }
}

/// One registered observer with its capability snapshot and subscriptions.
struct ObserverHandle {
    id: ObserverId,
    observer: ObserverRef,
    capabilities: CapabilityTable,
    subscriptions: Vec<Subscription>,
}

impl ObserverHandle {
    fn revoke_all(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.revoke()).count()
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("id", &self.id)
            .field("name", &self.observer.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Summary of a registered observer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ObserverInfo {
    pub id: ObserverId,
    pub name: String,
    pub capabilities: CapabilityTable,
}

/// Ordered set of live observer handles.
#[derive(Debug, Default)]
pub struct Registry {
    handles: Mutex<Vec<ObserverHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`. Returns `Ok(false)` if it was already registered.
    pub fn add(
        &self,
        observer: ObserverRef,
        source: &SignalSource,
        dispatcher: &Arc<Dispatcher>,
    ) -> Result<bool, RegistrationError> {
        observer.validate()?;
        let id = observer.identity();
        if self.contains(id) {
            return Ok(false);
        }

        let capabilities = CapabilityTable::probe(observer.as_ref());
        let subscriptions: Vec<Subscription> = capabilities
            .kinds()
            .map(|kind| subscribe(kind, &observer, source, dispatcher))
            .collect();
        let handle = ObserverHandle {
            id,
            observer,
            capabilities,
            subscriptions,
        };

        let mut handles = self.handles.lock();
        if handles.iter().any(|h| h.id == id) {
            // Probing re-entered and registered the same observer first.
            drop(handles);
            handle.revoke_all();
            return Ok(false);
        }
        tracing::debug!(
            observer = %handle.observer.name(),
            observer_id = %id,
            capabilities = ?handle.capabilities,
            "observer registered"
        );
        handles.push(handle);
        Ok(true)
    }

    /// Unregister the observer with identity `id`. Returns `false` if unknown.
    pub fn remove(&self, id: ObserverId) -> bool {
        let handle = {
            let mut handles = self.handles.lock();
            match handles.iter().position(|h| h.id == id) {
                Some(pos) => handles.remove(pos),
                None => return false,
            }
        };
        let revoked = handle.revoke_all();
        tracing::debug!(
            observer = %handle.observer.name(),
            observer_id = %id,
            subscriptions = revoked,
            "observer removed"
        );
        true
    }

    /// Remove every handle, revoking all subscriptions.
    pub fn clear(&self) -> usize {
        let drained: Vec<ObserverHandle> = std::mem::take(&mut *self.handles.lock());
        for handle in &drained {
            handle.revoke_all();
        }
        drained.len()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.handles.lock().iter().any(|h| h.id == id)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capabilities(&self, id: ObserverId) -> Option<CapabilityTable> {
        self.handles
            .lock()
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.capabilities)
    }

    /// Registered observers in registration order.
    pub fn observers(&self) -> Vec<ObserverInfo> {
        self.handles
            .lock()
            .iter()
            .map(|h| ObserverInfo {
                id: h.id,
                name: h.observer.name(),
                capabilities: h.capabilities,
            })
            .collect()
    }

    /// Identities in registration order.
    pub fn ids(&self) -> Vec<ObserverId> {
        self.handles.lock().iter().map(|h| h.id).collect()
    }
}

fn subscribe(
    kind: EventKind,
    observer: &ObserverRef,
    source: &SignalSource,
    dispatcher: &Arc<Dispatcher>,
) -> Subscription {
    let observer = Arc::clone(observer);
    let dispatcher = Arc::clone(dispatcher);
    let connection = source
        .notification_point(kind)
        .connect(move |event: &Event| {
            dispatcher.deliver(observer.as_ref(), event);
        });
    Subscription { kind, connection }
}
