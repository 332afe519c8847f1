//! Observer abstraction.
//!
//! An observer is an externally owned object that may implement any subset
//! of the ten lifecycle handlers. The bridge only ever asks it two things:
//! whether it has a handler for a kind (once, at registration) and to run
//! that handler for an event.

use crate::error::RegistrationError;
use crate::event::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of an observer; two handles with the same id are the same
/// observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(pub usize);

impl ObserverId {
    /// Identity derived from the address of `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self(std::ptr::from_ref(value).cast::<()>() as usize)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Failure raised while delivering one event to one observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ObserverFault {
    /// The handler itself failed (returned an error or panicked).
    #[error("handler fault: {0}")]
    Handler(String),

    /// The event arguments could not be converted for the observer.
    #[error("conversion fault: {0}")]
    Conversion(String),
}

impl ObserverFault {
    pub fn handler(detail: impl fmt::Display) -> Self {
        Self::Handler(detail.to_string())
    }

    pub fn conversion(detail: impl fmt::Display) -> Self {
        Self::Conversion(detail.to_string())
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Handler(detail) | Self::Conversion(detail) => detail,
        }
    }
}

/// A duck-typed event observer.
///
/// Implementations must be cheap to probe: [`Observer::has_handler`] is
/// called once per kind when the observer is registered and never again.
pub trait Observer: Send + Sync {
    /// Name used in logs and fault records.
    fn name(&self) -> String;

    /// Identity used by the registry for idempotent add/remove.
    ///
    /// Defaults to the address of the observer object.
    fn identity(&self) -> ObserverId {
        ObserverId::of(self)
    }

    /// Reject observers the bridge cannot talk to.
    fn validate(&self) -> Result<(), RegistrationError> {
        Ok(())
    }

    /// Whether this observer exposes a handler for `kind`.
    fn has_handler(&self, kind: EventKind) -> bool;

    /// Run the handler for `event.kind`.
    fn invoke(&self, event: &Event) -> Result<(), ObserverFault>;
}

/// Shared observer handle; the caller keeps its own clone.
pub type ObserverRef = Arc<dyn Observer>;

// ---------------------------------------------------------------------------
// Native handler set
// ---------------------------------------------------------------------------

type HandlerFn = dyn Fn(&Event) -> Result<(), ObserverFault> + Send + Sync + 'static;

/// Observer built from Rust closures, one optional handler per kind.
///
/// ```ignore
/// let observer = HandlerSet::new("audit")
///     .on(EventKind::CreatedObject, |event| {
///         tracing::info!(object = ?event.object_ref(), "created");
///         Ok(())
///     });
/// bridge.add_observer(Arc::new(observer))?;
/// ```
pub struct HandlerSet {
    name: String,
    handlers: [Option<Box<HandlerFn>>; EventKind::COUNT],
}

impl HandlerSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Default::default(),
        }
    }

    /// Install (or replace) the handler for `kind`.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<(), ObserverFault> + Send + Sync + 'static,
    {
        self.handlers[kind.index()] = Some(Box::new(handler));
        self
    }

    /// Kinds that have a handler.
    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.handlers[kind.index()].is_some())
            .collect()
    }
}

impl Observer for HandlerSet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers[kind.index()].is_some()
    }

    fn invoke(&self, event: &Event) -> Result<(), ObserverFault> {
        match &self.handlers[event.kind.index()] {
            Some(handler) => handler(event),
            None => Err(ObserverFault::Handler(format!(
                "no handler for {}",
                event.kind
            ))),
        }
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("name", &self.name)
            .field("kinds", &self.kinds())
            .finish()
    }
}
