//! Notification surface of the host document model.
//!
//! The host owns one [`Signal`] per lifecycle transition. The document model
//! and the object (view) model are separate upstream sources; the bridge's
//! [`SignalSource`](crate::source::SignalSource) unifies them.

use crate::event::{DocumentRef, Event, EventArgs, EventKind, ObjectRef, PropertyId};
use crate::signal::Signal;

/// Document-level signals.
#[derive(Debug, Default)]
pub struct DocumentSignals {
    pub created: Signal<DocumentRef>,
    pub deleted: Signal<DocumentRef>,
    pub relabel: Signal<DocumentRef>,
    pub rename: Signal<DocumentRef>,
    pub activate: Signal<DocumentRef>,
}

impl DocumentSignals {
    /// The signal emitting `kind`, if `kind` is document scoped.
    pub fn for_kind(&self, kind: EventKind) -> Option<&Signal<DocumentRef>> {
        match kind {
            EventKind::CreatedDocument => Some(&self.created),
            EventKind::DeletedDocument => Some(&self.deleted),
            EventKind::RelabelDocument => Some(&self.relabel),
            EventKind::RenameDocument => Some(&self.rename),
            EventKind::ActivateDocument => Some(&self.activate),
            _ => None,
        }
    }
}

/// Object-level signals.
#[derive(Debug, Default)]
pub struct ObjectSignals {
    pub created: Signal<ObjectRef>,
    pub deleted: Signal<ObjectRef>,
    pub changed: Signal<(ObjectRef, PropertyId)>,
    pub in_edit: Signal<ObjectRef>,
    pub reset_edit: Signal<ObjectRef>,
}

impl ObjectSignals {
    /// The single-argument signal emitting `kind`; `ChangedObject` is
    /// carried by [`ObjectSignals::changed`] instead.
    pub fn for_kind(&self, kind: EventKind) -> Option<&Signal<ObjectRef>> {
        match kind {
            EventKind::CreatedObject => Some(&self.created),
            EventKind::DeletedObject => Some(&self.deleted),
            EventKind::InEdit => Some(&self.in_edit),
            EventKind::ResetEdit => Some(&self.reset_edit),
            _ => None,
        }
    }
}

/// Both upstream sources of a host application.
#[derive(Debug, Default)]
pub struct HostSignals {
    pub documents: DocumentSignals,
    pub objects: ObjectSignals,
}

impl HostSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a normalized event through the matching host signal.
    ///
    /// Returns the number of upstream slots called.
    pub fn emit(&self, event: &Event) -> usize {
        match &event.args {
            EventArgs::Document(doc) => self
                .documents
                .for_kind(event.kind)
                .map_or(0, |signal| signal.emit(doc)),
            EventArgs::Object(object) => self
                .objects
                .for_kind(event.kind)
                .map_or(0, |signal| signal.emit(object)),
            EventArgs::Changed { object, property } => self
                .objects
                .changed
                .emit(&(object.clone(), property.clone())),
        }
    }
}
