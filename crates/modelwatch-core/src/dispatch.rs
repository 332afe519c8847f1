//! Fault-isolated delivery of one event to one observer.
//!
//! The dispatcher is the only place an observer's code runs. Whatever the
//! handler does (return an error, fail to convert its arguments, panic) is
//! contained here, reported to the [`FaultReporter`], and the emitting host
//! call carries on with the next subscription.

use crate::event::{Event, EventKind};
use crate::observer::{Observer, ObserverFault};
use crate::report::{FaultRecord, FaultReporter};
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-kind delivery counters.
#[derive(Debug, Default)]
struct KindCounters {
    delivered: [AtomicU64; EventKind::COUNT],
    faults: [AtomicU64; EventKind::COUNT],
}

/// Snapshot of the dispatcher counters for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    /// Handler invocations that completed successfully.
    pub delivered: u64,
    /// Handler invocations that faulted.
    pub faults: u64,
}

/// Invokes observer handlers and isolates their failures.
pub struct Dispatcher {
    reporter: Arc<dyn FaultReporter>,
    counters: KindCounters,
}

impl Dispatcher {
    pub fn new(reporter: Arc<dyn FaultReporter>) -> Self {
        Self {
            reporter,
            counters: KindCounters::default(),
        }
    }

    /// Deliver `event` to `observer`. Returns `true` on success.
    ///
    /// Only reached through a subscription, which exists only for kinds the
    /// observer's capability table supports.
    pub fn deliver(&self, observer: &dyn Observer, event: &Event) -> bool {
        let kind = event.kind;
        let outcome = catch_unwind(AssertUnwindSafe(|| observer.invoke(event)))
            .unwrap_or_else(|payload| Err(ObserverFault::Handler(panic_message(&*payload))));

        match outcome {
            Ok(()) => {
                self.counters.delivered[kind.index()].fetch_add(1, Ordering::Relaxed);
                tracing::trace!(event_kind = %kind, observer = %observer.name(), "delivered");
                true
            }
            Err(fault) => {
                self.counters.faults[kind.index()].fetch_add(1, Ordering::Relaxed);
                self.reporter.report(FaultRecord {
                    kind,
                    observer: observer.identity(),
                    observer_name: observer.name(),
                    fault,
                });
                false
            }
        }
    }

    pub fn counts(&self, kind: EventKind) -> DeliveryCounts {
        DeliveryCounts {
            delivered: self.counters.delivered[kind.index()].load(Ordering::Relaxed),
            faults: self.counters.faults[kind.index()].load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("counters", &self.counters)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
