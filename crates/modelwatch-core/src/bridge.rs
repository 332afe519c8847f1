//! The observer bridge: registration API over the signal source.
//!
//! An [`ObserverBridge`] is created by the host against its
//! [`HostSignals`] and torn down with it. Observers are added and removed
//! through it; events reach them through the per-kind notification points
//! of its [`SignalSource`], each delivery going through the shared
//! [`Dispatcher`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use modelwatch_core::{EventKind, HandlerSet, HostSignals, ObjectRef, ObserverBridge};
//!
//! let host = HostSignals::new();
//! let bridge = ObserverBridge::new(&host);
//! bridge
//!     .add_observer(Arc::new(
//!         HandlerSet::new("audit").on(EventKind::CreatedObject, |_| Ok(())),
//!     ))
//!     .unwrap();
//!
//! host.objects.created.emit(&ObjectRef::new(1, "Box"));
//! assert_eq!(bridge.stats().kind(EventKind::CreatedObject).delivered, 1);
//! ```

use crate::capability::CapabilityTable;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{RegistrationError, Result};
use crate::event::EventKind;
use crate::host::HostSignals;
use crate::observer::{Observer, ObserverId, ObserverRef};
use crate::registry::{ObserverInfo, Registry};
use crate::report::{FaultLog, FaultReporter};
use crate::source::{DispatchGate, SignalSource, new_gate};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters for one event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub kind: EventKind,
    /// Host emissions forwarded to the notification point.
    pub forwarded: u64,
    /// Successful handler invocations.
    pub delivered: u64,
    /// Faulted handler invocations.
    pub faults: u64,
}

/// Snapshot of the bridge counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub observers: usize,
    pub kinds: Vec<KindStats>,
}

impl BridgeStats {
    pub fn kind(&self, kind: EventKind) -> KindStats {
        self.kinds[kind.index()]
    }

    pub fn total_delivered(&self) -> u64 {
        self.kinds.iter().map(|k| k.delivered).sum()
    }

    pub fn total_faults(&self) -> u64 {
        self.kinds.iter().map(|k| k.faults).sum()
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Fans host lifecycle events out to registered observers.
pub struct ObserverBridge {
    gate: DispatchGate,
    source: SignalSource,
    registry: Registry,
    dispatcher: Arc<Dispatcher>,
    fault_log: Option<Arc<FaultLog>>,
    shut_down: AtomicBool,
}

impl ObserverBridge {
    /// Bridge reporting faults to a default-sized [`FaultLog`].
    pub fn new(host: &HostSignals) -> Self {
        Self::with_fault_log(host, Arc::new(FaultLog::default()))
    }

    /// Bridge sized from `config`.
    pub fn with_config(host: &HostSignals, config: &BridgeConfig) -> Self {
        Self::with_fault_log(host, Arc::new(FaultLog::new(config.faults.history)))
    }

    fn with_fault_log(host: &HostSignals, log: Arc<FaultLog>) -> Self {
        let mut bridge = Self::with_reporter(host, Arc::clone(&log) as Arc<dyn FaultReporter>);
        bridge.fault_log = Some(log);
        bridge
    }

    /// Bridge reporting faults to a custom reporter.
    pub fn with_reporter(host: &HostSignals, reporter: Arc<dyn FaultReporter>) -> Self {
        let gate = new_gate();
        let source = SignalSource::attach(host, Arc::clone(&gate));
        Self {
            gate,
            source,
            registry: Registry::new(),
            dispatcher: Arc::new(Dispatcher::new(reporter)),
            fault_log: None,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Register `observer` for every kind it has a handler for.
    ///
    /// Adding an observer that is already registered succeeds without
    /// effect. Takes effect for the next emission, not the one in flight.
    pub fn add_observer(&self, observer: ObserverRef) -> Result<()> {
        let _gate = self.gate.lock();
        if self.is_shut_down() {
            return Err(RegistrationError::ShutDown.into());
        }
        let name = observer.name();
        match self.registry.add(observer, &self.source, &self.dispatcher) {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::trace!(observer = %name, "observer already registered");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(observer = %name, error = %err, "observer rejected");
                Err(err.into())
            }
        }
    }

    /// Run `f` inside the dispatch gate.
    ///
    /// Emissions and registry changes from other threads wait until `f`
    /// returns; the calling thread may still emit and (un)register from
    /// inside `f`.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.gate.lock();
        f()
    }

    /// Unregister `observer`. Unknown observers are ignored.
    pub fn remove_observer(&self, observer: &dyn Observer) -> bool {
        self.remove_observer_by_id(observer.identity())
    }

    /// Unregister by identity. Pending calls to the observer in a running
    /// dispatch pass are suppressed.
    pub fn remove_observer_by_id(&self, id: ObserverId) -> bool {
        let _gate = self.gate.lock();
        self.registry.remove(id)
    }

    pub fn is_registered(&self, observer: &dyn Observer) -> bool {
        self.registry.contains(observer.identity())
    }

    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    /// Registered observers in dispatch order.
    pub fn observers(&self) -> Vec<ObserverInfo> {
        self.registry.observers()
    }

    /// The capability table probed when `id` was registered.
    pub fn capabilities(&self, id: ObserverId) -> Option<CapabilityTable> {
        self.registry.capabilities(id)
    }

    pub fn stats(&self) -> BridgeStats {
        let kinds = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let counts = self.dispatcher.counts(kind);
                KindStats {
                    kind,
                    forwarded: self.source.forwarded(kind),
                    delivered: counts.delivered,
                    faults: counts.faults,
                }
            })
            .collect();
        BridgeStats {
            observers: self.registry.len(),
            kinds,
        }
    }

    /// The default fault log, unless a custom reporter was supplied.
    pub fn fault_log(&self) -> Option<&Arc<FaultLog>> {
        self.fault_log.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Remove every observer and detach from the host. Idempotent; later
    /// `add_observer` calls fail with [`RegistrationError::ShutDown`].
    pub fn shutdown(&self) {
        let _gate = self.gate.lock();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let removed = self.registry.clear();
        self.source.detach();
        tracing::debug!(observers = removed, "observer bridge shut down");
    }
}

impl Drop for ObserverBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ObserverBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverBridge")
            .field("observers", &self.registry.len())
            .field("source", &self.source)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
