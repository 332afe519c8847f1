//! Error-reporting channel for observer faults.
//!
//! Faults caught by the dispatcher end up here as [`FaultRecord`]s. The
//! default reporter, [`FaultLog`], logs each one through `tracing` and keeps
//! a bounded history for inspection.

use crate::event::EventKind;
use crate::observer::{ObserverFault, ObserverId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// One failed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub kind: EventKind,
    pub observer: ObserverId,
    pub observer_name: String,
    pub fault: ObserverFault,
}

/// Receives faults raised by observers during dispatch.
///
/// Called synchronously from the dispatch loop; implementations must not
/// panic and should return quickly.
pub trait FaultReporter: Send + Sync {
    fn report(&self, record: FaultRecord);
}

/// Default reporter: `tracing` + bounded in-memory history.
#[derive(Debug)]
pub struct FaultLog {
    capacity: usize,
    records: Mutex<VecDeque<FaultRecord>>,
    total: AtomicU64,
}

impl FaultLog {
    /// Default number of retained records.
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            total: AtomicU64::new(0),
        }
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<FaultRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Faults reported since creation, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl FaultReporter for FaultLog {
    fn report(&self, record: FaultRecord) {
        tracing::warn!(
            event_kind = %record.kind,
            observer = %record.observer_name,
            observer_id = %record.observer,
            fault = %record.fault,
            "observer fault"
        );
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}
