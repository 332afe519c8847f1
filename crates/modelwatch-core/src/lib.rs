//! modelwatch-core: Core library for modelwatch
//!
//! Fans document and object lifecycle events of a host model out to
//! externally registered, duck-typed observers (native closures or Lua
//! tables) that each implement any subset of ten handlers.
//!
//! # Architecture
//!
//! ```text
//! HostSignals → SignalSource → notification points → Subscriptions
//!                    ↑                                     ↓
//!             ObserverBridge ── Registry          Dispatcher → Observer
//!                                                      ↓
//!                                                FaultReporter
//! ```
//!
//! # Modules
//!
//! - `event`: Event kinds, argument shapes and normalized events
//! - `signal`: Multi-slot signals with revocable connections
//! - `host`: Host-side document and object signals
//! - `source`: Adapter normalizing host signals into per-kind notification points
//! - `observer`: The `Observer` trait, identities, faults and `HandlerSet`
//! - `capability`: Per-observer table of supported kinds
//! - `registry`: Ordered observer handles and their subscriptions
//! - `dispatch`: Fault-isolated delivery
//! - `report`: Fault records and the default `FaultLog`
//! - `bridge`: The registration API
//! - `trace`: Recorded event traces and replay
//! - `lua_observer`: Lua observers and script API (feature-gated: `lua`)
//! - `config`: Configuration management
//! - `logging`: Structured logging setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod bridge;
pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod host;
pub mod logging;
#[cfg(feature = "lua")]
pub mod lua_observer;
pub mod observer;
pub mod registry;
pub mod report;
pub mod signal;
pub mod source;
pub mod trace;

pub use bridge::{BridgeStats, KindStats, ObserverBridge};
pub use capability::CapabilityTable;
pub use config::BridgeConfig;
pub use error::{Error, RegistrationError, Result};
pub use event::{
    DocumentId, DocumentRef, Event, EventArgs, EventKind, EventScope, ObjectRef, PropertyId,
};
pub use host::HostSignals;
#[cfg(feature = "lua")]
pub use lua_observer::ScriptHost;
pub use observer::{HandlerSet, Observer, ObserverFault, ObserverId, ObserverRef};
pub use report::{FaultLog, FaultRecord, FaultReporter};
pub use trace::Trace;
