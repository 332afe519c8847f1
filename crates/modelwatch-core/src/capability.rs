//! Per-observer capability snapshot.

use crate::event::EventKind;
use crate::observer::Observer;
use serde::{Serialize, Serializer};
use std::fmt;

/// Which event kinds an observer handles, probed once at registration.
///
/// The table is never recomputed; handlers an observer gains or loses
/// afterwards are ignored.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilityTable {
    supported: [bool; EventKind::COUNT],
}

impl CapabilityTable {
    /// Probe `observer` for a handler per kind. Does not invoke anything.
    pub fn probe(observer: &dyn Observer) -> Self {
        let mut supported = [false; EventKind::COUNT];
        for kind in EventKind::ALL {
            supported[kind.index()] = observer.has_handler(kind);
        }
        Self { supported }
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let mut table = Self::default();
        for kind in kinds {
            table.supported[kind.index()] = true;
        }
        table
    }

    pub fn supports(&self, kind: EventKind) -> bool {
        self.supported[kind.index()]
    }

    /// Supported kinds in index order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.supported[kind.index()])
    }

    pub fn count(&self) -> usize {
        self.supported.iter().filter(|s| **s).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

impl Serialize for CapabilityTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.kinds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::HandlerSet;

    #[test]
    fn probe_matches_handler_set() {
        let observer = HandlerSet::new("p")
            .on(EventKind::ChangedObject, |_| Ok(()))
            .on(EventKind::ActivateDocument, |_| Ok(()));
        let table = CapabilityTable::probe(&observer);

        assert!(table.supports(EventKind::ChangedObject));
        assert!(table.supports(EventKind::ActivateDocument));
        assert!(!table.supports(EventKind::CreatedObject));
        assert_eq!(table.count(), 2);
        assert_eq!(
            table.kinds().collect::<Vec<_>>(),
            vec![EventKind::ActivateDocument, EventKind::ChangedObject]
        );
    }

    #[test]
    fn empty_observer_supports_nothing() {
        let table = CapabilityTable::probe(&HandlerSet::new("none"));
        assert!(table.is_empty());
        assert_eq!(format!("{table:?}"), "{}");
    }

    #[test]
    fn serializes_as_kind_list() {
        let table = CapabilityTable::from_kinds([EventKind::InEdit, EventKind::CreatedDocument]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"["CreatedDocument","InEdit"]"#);
    }

    use proptest::prelude::*;

    proptest! {
        /// Probing a handler set yields exactly the kinds it was given.
        #[test]
        fn prop_probe_reflects_handlers(mask in prop::collection::vec(any::<bool>(), EventKind::COUNT)) {
            let mut set = HandlerSet::new("prop");
            for kind in EventKind::ALL {
                if mask[kind.index()] {
                    set = set.on(kind, |_| Ok(()));
                }
            }
            let table = CapabilityTable::probe(&set);
            for kind in EventKind::ALL {
                prop_assert_eq!(table.supports(kind), mask[kind.index()]);
            }
            prop_assert_eq!(table.count(), mask.iter().filter(|b| **b).count());
        }
    }
}
