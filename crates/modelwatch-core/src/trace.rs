//! Recorded host event traces.
//!
//! A trace is a TOML list of lifecycle events that can be replayed through
//! [`HostSignals`] to drive observers without a live document model:
//!
//! ```toml
//! [[event]]
//! kind = "CreatedDocument"
//! document = { id = 1, name = "Unnamed" }
//!
//! [[event]]
//! kind = "ChangedObject"
//! object = { document = 1, name = "Box", label = "Cube" }
//! property = "Length"
//! ```

use crate::event::{DocumentRef, Event, EventKind, EventScope, EventShapeError, ObjectRef, PropertyId};
use crate::host::HostSignals;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse trace: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("event #{index} ({kind}) is missing `{field}`")]
    MissingField {
        index: usize,
        kind: EventKind,
        field: &'static str,
    },

    #[error("event #{index}: {source}")]
    Shape {
        index: usize,
        #[source]
        source: EventShapeError,
    },
}

/// One recorded host emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyId>,
}

impl TraceEvent {
    /// Normalize into an [`Event`]. `index` is only used for error messages.
    pub fn to_event(&self, index: usize) -> Result<Event, TraceError> {
        let missing = |field| TraceError::MissingField {
            index,
            kind: self.kind,
            field,
        };
        let shape = |source| TraceError::Shape { index, source };

        match self.kind.scope() {
            EventScope::Document => {
                let document = self.document.clone().ok_or_else(|| missing("document"))?;
                Event::document(self.kind, document).map_err(shape)
            }
            EventScope::Object => {
                let object = self.object.clone().ok_or_else(|| missing("object"))?;
                if self.kind == EventKind::ChangedObject {
                    let property = self.property.clone().ok_or_else(|| missing("property"))?;
                    Ok(Event::changed(object, property))
                } else {
                    Event::object(self.kind, object).map_err(shape)
                }
            }
        }
    }
}

/// An ordered list of recorded events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "event", default)]
    pub events: Vec<TraceEvent>,
}

impl Trace {
    /// Parse a trace and check every entry has the arguments its kind needs.
    pub fn from_toml_str(source: &str) -> Result<Self, TraceError> {
        let trace: Self = toml::from_str(source)?;
        trace.events()?;
        Ok(trace)
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let source = std::fs::read_to_string(path).map_err(|source| TraceError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Normalized events in trace order.
    pub fn events(&self) -> Result<Vec<Event>, TraceError> {
        self.events
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_event(index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Emit every event on `host` in order. Returns the number of events
    /// emitted; entries that fail to normalize are skipped with a warning.
    pub fn replay(&self, host: &HostSignals) -> usize {
        let mut emitted = 0;
        for (index, entry) in self.events.iter().enumerate() {
            match entry.to_event(index) {
                Ok(event) => {
                    host.emit(&event);
                    emitted += 1;
                }
                Err(err) => tracing::warn!(error = %err, "skipping trace entry"),
            }
        }
        tracing::debug!(events = emitted, "trace replayed");
        emitted
    }
}
