//! Signal source adapter.
//!
//! Connects once to every host signal and republishes each upstream
//! emission as a normalized [`Event`] on a per-kind notification point.
//! Observer subscriptions attach to the notification points, never to the
//! host directly, so the host-level connections live exactly as long as the
//! adapter regardless of how many observers come and go.
//!
//! ```text
//!  DocumentSignals ─┐                       ┌─► point[CreatedDocument] ─► subs…
//!                   ├─► SignalSource ─ gate ┼─► …
//!  ObjectSignals  ──┘   (normalize, count)  └─► point[ResetEdit]       ─► subs…
//! ```

use crate::event::{DocumentRef, Event, EventKind, EventScope, ObjectRef, PropertyId};
use crate::host::HostSignals;
use crate::signal::{Connection, Signal};
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mutual-exclusion domain shared by emission and registry mutation.
///
/// Re-entrant so a handler may emit or (un)register on the same thread;
/// other threads wait until the running dispatch pass has finished.
pub type DispatchGate = Arc<ReentrantMutex<()>>;

pub fn new_gate() -> DispatchGate {
    Arc::new(ReentrantMutex::new(()))
}

struct NotificationPoints {
    points: [Signal<Event>; EventKind::COUNT],
    forwarded: [AtomicU64; EventKind::COUNT],
    gate: DispatchGate,
}

impl NotificationPoints {
    fn forward(&self, event: &Event) {
        let _pass = self.gate.lock();
        self.forwarded[event.kind.index()].fetch_add(1, Ordering::Relaxed);
        let delivered = self.points[event.kind.index()].emit(event);
        tracing::debug!(event_kind = %event.kind, subscriptions = delivered, "forwarded");
    }
}

/// Normalizes host signals into per-kind notification points.
pub struct SignalSource {
    inner: Arc<NotificationPoints>,
    upstream: Vec<Connection>,
}

impl SignalSource {
    /// Connect to every signal of `host`.
    pub fn attach(host: &HostSignals, gate: DispatchGate) -> Self {
        let inner = Arc::new(NotificationPoints {
            points: std::array::from_fn(|_| Signal::new()),
            forwarded: Default::default(),
            gate,
        });

        let mut upstream = Vec::with_capacity(EventKind::COUNT);
        for kind in EventKind::ALL {
            let points = Arc::clone(&inner);
            let connection = match kind.scope() {
                EventScope::Document => host.documents.for_kind(kind).map(|signal| {
                    signal.connect(move |doc: &DocumentRef| {
                        if let Ok(event) = Event::document(kind, doc.clone()) {
                            points.forward(&event);
                        }
                    })
                }),
                EventScope::Object if kind == EventKind::ChangedObject => {
                    Some(host.objects.changed.connect(
                        move |(object, property): &(ObjectRef, PropertyId)| {
                            points.forward(&Event::changed(object.clone(), property.clone()));
                        },
                    ))
                }
                EventScope::Object => host.objects.for_kind(kind).map(|signal| {
                    signal.connect(move |object: &ObjectRef| {
                        if let Ok(event) = Event::object(kind, object.clone()) {
                            points.forward(&event);
                        }
                    })
                }),
            };
            upstream.extend(connection);
        }

        tracing::debug!(connections = upstream.len(), "signal source attached");
        Self { inner, upstream }
    }

    /// The notification point observers subscribe to for `kind`.
    pub fn notification_point(&self, kind: EventKind) -> &Signal<Event> {
        &self.inner.points[kind.index()]
    }

    /// Events forwarded for `kind` since attaching.
    pub fn forwarded(&self, kind: EventKind) -> u64 {
        self.inner.forwarded[kind.index()].load(Ordering::Relaxed)
    }

    pub fn is_attached(&self) -> bool {
        self.upstream.iter().any(Connection::is_connected)
    }

    /// Revoke the host-level connections. Idempotent.
    pub fn detach(&self) {
        let revoked = self.upstream.iter().filter(|c| c.disconnect()).count();
        if revoked > 0 {
            tracing::debug!(connections = revoked, "signal source detached");
        }
    }
}

impl Drop for SignalSource {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSource")
            .field("upstream", &self.upstream.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
