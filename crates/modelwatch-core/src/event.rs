//! Lifecycle event taxonomy.
//!
//! The host model emits exactly ten kinds of notifications. Each kind has a
//! fixed argument shape and a conventional name that scripted observers use
//! (prefixed, e.g. `slotCreatedDocument`) to declare a handler.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Whether a kind is emitted by the document model or the object model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    Document,
    Object,
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Object => f.write_str("object"),
        }
    }
}

/// The closed set of lifecycle events.
///
/// Serialized by conventional name (`"CreatedDocument"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CreatedDocument,
    DeletedDocument,
    RelabelDocument,
    RenameDocument,
    ActivateDocument,
    CreatedObject,
    DeletedObject,
    ChangedObject,
    InEdit,
    ResetEdit,
}

impl EventKind {
    /// Number of kinds; the size of every per-kind table.
    pub const COUNT: usize = 10;

    /// All kinds in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::CreatedDocument,
        Self::DeletedDocument,
        Self::RelabelDocument,
        Self::RenameDocument,
        Self::ActivateDocument,
        Self::CreatedObject,
        Self::DeletedObject,
        Self::ChangedObject,
        Self::InEdit,
        Self::ResetEdit,
    ];

    /// Stable index into per-kind tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn scope(self) -> EventScope {
        match self {
            Self::CreatedDocument
            | Self::DeletedDocument
            | Self::RelabelDocument
            | Self::RenameDocument
            | Self::ActivateDocument => EventScope::Document,
            Self::CreatedObject
            | Self::DeletedObject
            | Self::ChangedObject
            | Self::InEdit
            | Self::ResetEdit => EventScope::Object,
        }
    }

    /// Conventional name, identical to the variant name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreatedDocument => "CreatedDocument",
            Self::DeletedDocument => "DeletedDocument",
            Self::RelabelDocument => "RelabelDocument",
            Self::RenameDocument => "RenameDocument",
            Self::ActivateDocument => "ActivateDocument",
            Self::CreatedObject => "CreatedObject",
            Self::DeletedObject => "DeletedObject",
            Self::ChangedObject => "ChangedObject",
            Self::InEdit => "InEdit",
            Self::ResetEdit => "ResetEdit",
        }
    }

    /// Human-readable argument shape, e.g. `"object, property"`.
    pub const fn arguments(self) -> &'static str {
        match (self, self.scope()) {
            (Self::ChangedObject, _) => "object, property",
            (_, EventScope::Document) => "document",
            (_, EventScope::Object) => "object",
        }
    }

    /// Name of the handler a scripted observer must expose for this kind.
    pub fn handler_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }

    /// Look a kind up by conventional name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Opaque references
// ---------------------------------------------------------------------------

/// Host-assigned document identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Snapshot of a document handed to observers.
///
/// A missing `label` deserializes to the name, as in [`DocumentRef::new`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawDocumentRef")]
pub struct DocumentRef {
    pub id: DocumentId,
    pub name: String,
    pub label: String,
}

#[derive(Deserialize)]
struct RawDocumentRef {
    id: DocumentId,
    name: String,
    #[serde(default)]
    label: Option<String>,
}

impl From<RawDocumentRef> for DocumentRef {
    fn from(raw: RawDocumentRef) -> Self {
        Self {
            id: raw.id,
            label: raw.label.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
        }
    }
}

impl DocumentRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: DocumentId(id),
            label: name.clone(),
            name,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Snapshot of a document object (or its view provider) handed to observers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawObjectRef")]
pub struct ObjectRef {
    pub document: DocumentId,
    pub name: String,
    pub label: String,
}

#[derive(Deserialize)]
struct RawObjectRef {
    document: DocumentId,
    name: String,
    #[serde(default)]
    label: Option<String>,
}

impl From<RawObjectRef> for ObjectRef {
    fn from(raw: RawObjectRef) -> Self {
        Self {
            document: raw.document,
            label: raw.label.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
        }
    }
}

impl ObjectRef {
    pub fn new(document: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            document: DocumentId(document),
            label: name.clone(),
            name,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Identifier of the property that changed in a `ChangedObject` event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Normalized event
// ---------------------------------------------------------------------------

/// Arguments of a normalized event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventArgs {
    Document(DocumentRef),
    Object(ObjectRef),
    Changed {
        object: ObjectRef,
        property: PropertyId,
    },
}

/// A kind/argument mismatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} expects ({expected}) arguments")]
pub struct EventShapeError {
    pub kind: EventKind,
    pub expected: &'static str,
}

/// One normalized lifecycle event, as seen by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub args: EventArgs,
}

impl Event {
    /// Build an event, checking that `args` matches the shape of `kind`.
    pub fn new(kind: EventKind, args: EventArgs) -> Result<Self, EventShapeError> {
        let fits = match (&args, kind) {
            (EventArgs::Changed { .. }, EventKind::ChangedObject) => true,
            (EventArgs::Changed { .. }, _) | (_, EventKind::ChangedObject) => false,
            (EventArgs::Document(_), k) => k.scope() == EventScope::Document,
            (EventArgs::Object(_), k) => k.scope() == EventScope::Object,
        };
        if fits {
            Ok(Self { kind, args })
        } else {
            Err(EventShapeError {
                kind,
                expected: kind.arguments(),
            })
        }
    }

    pub fn document(kind: EventKind, document: DocumentRef) -> Result<Self, EventShapeError> {
        Self::new(kind, EventArgs::Document(document))
    }

    pub fn object(kind: EventKind, object: ObjectRef) -> Result<Self, EventShapeError> {
        Self::new(kind, EventArgs::Object(object))
    }

    pub fn changed(object: ObjectRef, property: PropertyId) -> Self {
        Self {
            kind: EventKind::ChangedObject,
            args: EventArgs::Changed { object, property },
        }
    }

    pub fn document_ref(&self) -> Option<&DocumentRef> {
        match &self.args {
            EventArgs::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn object_ref(&self) -> Option<&ObjectRef> {
        match &self.args {
            EventArgs::Object(object) | EventArgs::Changed { object, .. } => Some(object),
            EventArgs::Document(_) => None,
        }
    }

    pub fn property(&self) -> Option<&PropertyId> {
        match &self.args {
            EventArgs::Changed { property, .. } => Some(property),
            _ => None,
        }
    }
}
