//! End-to-end properties of the observer bridge: host signals in, handler
//! calls and fault records out.

use modelwatch_core::{
    DocumentRef, Event, EventKind, HandlerSet, HostSignals, ObjectRef, ObserverBridge,
    ObserverFault, ObserverRef, PropertyId,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Observer that records `"{name}:{kind}"` for each of `kinds`.
fn recorder(name: &str, journal: &Journal, kinds: &[EventKind]) -> ObserverRef {
    let mut set = HandlerSet::new(name);
    for &kind in kinds {
        let journal = Arc::clone(journal);
        let tag = format!("{name}:{kind}");
        set = set.on(kind, move |_| {
            journal.lock().push(tag.clone());
            Ok(())
        });
    }
    Arc::new(set)
}

fn emit_every_kind(host: &HostSignals) {
    let doc = DocumentRef::new(1, "Unnamed");
    let obj = ObjectRef::new(1, "Box");
    for kind in EventKind::ALL {
        let event = match kind {
            EventKind::ChangedObject => Event::changed(obj.clone(), PropertyId::new("Length")),
            k if k.scope() == modelwatch_core::EventScope::Document => {
                Event::document(k, doc.clone()).unwrap()
            }
            k => Event::object(k, obj.clone()).unwrap(),
        };
        host.emit(&event);
    }
}

fn created_object(host: &HostSignals, name: &str) {
    host.objects.created.emit(&ObjectRef::new(1, name));
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn unsupported_kinds_never_invoke_handlers() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    bridge
        .add_observer(recorder("o", &log, &[EventKind::CreatedObject]))
        .unwrap();

    emit_every_kind(&host);

    assert_eq!(*log.lock(), vec!["o:CreatedObject"]);
    let stats = bridge.stats();
    for kind in EventKind::ALL {
        assert_eq!(stats.kind(kind).forwarded, 1, "{kind}");
        let expected = u64::from(kind == EventKind::CreatedObject);
        assert_eq!(stats.kind(kind).delivered, expected, "{kind}");
    }
    assert_eq!(stats.total_faults(), 0);
    assert!(bridge.fault_log().unwrap().is_empty());
}

#[test]
fn registering_twice_is_registering_once() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    let observer = recorder("o", &log, &[EventKind::CreatedDocument]);

    bridge.add_observer(Arc::clone(&observer)).unwrap();
    bridge.add_observer(Arc::clone(&observer)).unwrap();
    host.documents.created.emit(&DocumentRef::new(1, "A"));

    assert_eq!(bridge.observer_count(), 1);
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn removing_unregistered_observer_is_noop() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    let registered = recorder("kept", &log, &[EventKind::InEdit]);
    let stranger = recorder("stranger", &log, &[EventKind::InEdit]);
    bridge.add_observer(Arc::clone(&registered)).unwrap();

    assert!(!bridge.remove_observer(stranger.as_ref()));
    host.objects.in_edit.emit(&ObjectRef::new(1, "Pad"));

    assert_eq!(bridge.observer_count(), 1);
    assert_eq!(*log.lock(), vec!["kept:InEdit"]);
}

#[test]
fn removed_observer_is_never_invoked_again() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    let o1 = recorder("o1", &log, &[EventKind::CreatedObject]);
    let o2 = recorder("o2", &log, &[EventKind::CreatedObject]);
    bridge.add_observer(Arc::clone(&o1)).unwrap();
    bridge.add_observer(Arc::clone(&o2)).unwrap();

    created_object(&host, "A");
    bridge.remove_observer(o1.as_ref());
    created_object(&host, "B");
    created_object(&host, "C");

    assert_eq!(
        *log.lock(),
        vec![
            "o1:CreatedObject",
            "o2:CreatedObject",
            "o2:CreatedObject",
            "o2:CreatedObject"
        ]
    );
}

#[test]
fn rejected_observer_is_not_registered() {
    struct NotAnObject;
    impl modelwatch_core::Observer for NotAnObject {
        fn name(&self) -> String {
            "number".to_string()
        }
        fn validate(&self) -> Result<(), modelwatch_core::RegistrationError> {
            Err(modelwatch_core::RegistrationError::NotAnObject {
                found: "number".to_string(),
            })
        }
        fn has_handler(&self, _kind: EventKind) -> bool {
            true
        }
        fn invoke(&self, _event: &Event) -> Result<(), ObserverFault> {
            Ok(())
        }
    }

    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let err = bridge.add_observer(Arc::new(NotAnObject)).unwrap_err();

    assert!(err.to_string().contains("got number"));
    assert_eq!(bridge.observer_count(), 0);
    assert_eq!(host.objects.created.emit(&ObjectRef::new(1, "Box")), 1);
    assert_eq!(bridge.stats().total_delivered(), 0);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn dispatch_follows_registration_order() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    for name in ["a", "b", "c", "d"] {
        bridge
            .add_observer(recorder(name, &log, &[EventKind::DeletedDocument]))
            .unwrap();
    }

    host.documents.deleted.emit(&DocumentRef::new(1, "A"));

    assert_eq!(
        *log.lock(),
        vec![
            "a:DeletedDocument",
            "b:DeletedDocument",
            "c:DeletedDocument",
            "d:DeletedDocument"
        ]
    );
}

#[test]
fn fault_in_one_observer_does_not_stop_the_next() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    let o1: ObserverRef = Arc::new(
        HandlerSet::new("o1").on(EventKind::CreatedObject, |_| {
            Err(ObserverFault::handler("exception raised"))
        }),
    );
    bridge.add_observer(Arc::clone(&o1)).unwrap();
    bridge
        .add_observer(recorder("o2", &log, &[EventKind::CreatedObject]))
        .unwrap();

    created_object(&host, "Box");

    assert_eq!(*log.lock(), vec!["o2:CreatedObject"]);
    let records = bridge.fault_log().unwrap().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].observer, o1.identity());
    assert_eq!(records[0].observer_name, "o1");
    assert_eq!(records[0].kind, EventKind::CreatedObject);
    assert_eq!(
        records[0].fault,
        ObserverFault::Handler("exception raised".to_string())
    );
}

#[test]
fn panicking_handler_is_isolated() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    bridge
        .add_observer(Arc::new(
            HandlerSet::new("panics").on(EventKind::ResetEdit, |_| panic!("view provider gone")),
        ))
        .unwrap();
    bridge
        .add_observer(recorder("after", &log, &[EventKind::ResetEdit]))
        .unwrap();

    host.objects.reset_edit.emit(&ObjectRef::new(1, "Sketch"));

    assert_eq!(*log.lock(), vec!["after:ResetEdit"]);
    let records = bridge.fault_log().unwrap().records();
    assert_eq!(
        records[0].fault,
        ObserverFault::Handler("panicked: view provider gone".to_string())
    );
}

#[test]
fn conversion_fault_is_isolated_like_handler_fault() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let log = journal();
    bridge
        .add_observer(Arc::new(
            HandlerSet::new("conv").on(EventKind::InEdit, |_| {
                Err(ObserverFault::conversion("no python wrapper"))
            }),
        ))
        .unwrap();
    bridge
        .add_observer(recorder("next", &log, &[EventKind::InEdit]))
        .unwrap();

    host.objects.in_edit.emit(&ObjectRef::new(1, "Pad"));

    assert_eq!(log.lock().len(), 1);
    assert!(matches!(
        bridge.fault_log().unwrap().records()[0].fault,
        ObserverFault::Conversion(_)
    ));
}

#[test]
fn changed_object_delivers_object_and_property_unmodified() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    bridge
        .add_observer(Arc::new(HandlerSet::new("o").on(
            EventKind::ChangedObject,
            move |event| {
                s.lock().push(event.clone());
                Ok(())
            },
        )))
        .unwrap();

    let object = ObjectRef::new(3, "Pad001").with_label("Pocket");
    let property = PropertyId::new("Placement");
    host.objects
        .changed
        .emit(&(object.clone(), property.clone()));

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].object_ref(), Some(&object));
    assert_eq!(seen[0].property(), Some(&property));
}

// ---------------------------------------------------------------------------
// Reentrancy
// ---------------------------------------------------------------------------

#[test]
fn observer_removing_itself_is_not_invoked_again() {
    let host = HostSignals::new();
    let bridge = Arc::new(ObserverBridge::new(&host));
    let calls = Arc::new(AtomicUsize::new(0));

    let weak_bridge = Arc::downgrade(&bridge);
    let c = Arc::clone(&calls);
    let o1 = Arc::new_cyclic(|me: &Weak<HandlerSet>| {
        let me = me.clone();
        HandlerSet::new("o1").on(EventKind::CreatedObject, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let (Some(bridge), Some(me)) = (weak_bridge.upgrade(), me.upgrade()) {
                bridge.remove_observer(me.as_ref());
            }
            Ok(())
        })
    });
    bridge.add_observer(o1).unwrap();

    created_object(&host, "A");
    created_object(&host, "B");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.observer_count(), 0);
    assert!(bridge.fault_log().unwrap().is_empty());
}

#[test]
fn removing_a_later_observer_suppresses_its_pending_call() {
    let host = HostSignals::new();
    let bridge = Arc::new(ObserverBridge::new(&host));
    let log = journal();
    let victim = recorder("victim", &log, &[EventKind::CreatedObject]);

    let weak_bridge = Arc::downgrade(&bridge);
    let target = Arc::clone(&victim);
    let l = Arc::clone(&log);
    bridge
        .add_observer(Arc::new(HandlerSet::new("killer").on(
            EventKind::CreatedObject,
            move |_| {
                l.lock().push("killer:CreatedObject".to_string());
                if let Some(bridge) = weak_bridge.upgrade() {
                    bridge.remove_observer(target.as_ref());
                }
                Ok(())
            },
        )))
        .unwrap();
    bridge.add_observer(victim).unwrap();
    bridge
        .add_observer(recorder("bystander", &log, &[EventKind::CreatedObject]))
        .unwrap();

    created_object(&host, "Box");

    assert_eq!(
        *log.lock(),
        vec!["killer:CreatedObject", "bystander:CreatedObject"]
    );
}

#[test]
fn observer_added_during_dispatch_misses_the_in_flight_event() {
    let host = HostSignals::new();
    let bridge = Arc::new(ObserverBridge::new(&host));
    let log = journal();
    let late = recorder("late", &log, &[EventKind::CreatedDocument]);

    let weak_bridge = Arc::downgrade(&bridge);
    let pending = Mutex::new(Some(late));
    bridge
        .add_observer(Arc::new(HandlerSet::new("adder").on(
            EventKind::CreatedDocument,
            move |_| {
                if let (Some(bridge), Some(late)) = (weak_bridge.upgrade(), pending.lock().take()) {
                    bridge
                        .add_observer(late)
                        .map_err(ObserverFault::handler)?;
                }
                Ok(())
            },
        )))
        .unwrap();

    host.documents.created.emit(&DocumentRef::new(1, "First"));
    assert!(log.lock().is_empty());
    assert_eq!(bridge.observer_count(), 2);

    host.documents.created.emit(&DocumentRef::new(2, "Second"));
    assert_eq!(*log.lock(), vec!["late:CreatedDocument"]);
}

#[test]
fn handler_may_emit_nested_host_events() {
    let host = Arc::new(HostSignals::new());
    let bridge = ObserverBridge::new(&host);
    let log = journal();

    let weak_host = Arc::downgrade(&host);
    let l = Arc::clone(&log);
    bridge
        .add_observer(Arc::new(HandlerSet::new("creator").on(
            EventKind::CreatedDocument,
            move |event| {
                l.lock().push("creator:CreatedDocument".to_string());
                let doc = event.document_ref().map_or(0, |d| d.id.0);
                if let Some(host) = weak_host.upgrade() {
                    host.objects.created.emit(&ObjectRef::new(doc, "Origin"));
                }
                Ok(())
            },
        )))
        .unwrap();
    bridge
        .add_observer(recorder(
            "watcher",
            &log,
            &[EventKind::CreatedDocument, EventKind::CreatedObject],
        ))
        .unwrap();

    host.documents.created.emit(&DocumentRef::new(1, "Part"));

    assert_eq!(
        *log.lock(),
        vec![
            "creator:CreatedDocument",
            "watcher:CreatedObject",
            "watcher:CreatedDocument"
        ]
    );
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[test]
fn emissions_from_several_threads_are_serialized() {
    let host = HostSignals::new();
    let bridge = ObserverBridge::new(&host);
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let (b, o, c) = (Arc::clone(&busy), Arc::clone(&overlaps), Arc::clone(&calls));
    bridge
        .add_observer(Arc::new(HandlerSet::new("exclusive").on(
            EventKind::ChangedObject,
            move |_| {
                if b.swap(true, Ordering::SeqCst) {
                    o.fetch_add(1, Ordering::SeqCst);
                }
                c.fetch_add(1, Ordering::SeqCst);
                std::thread::yield_now();
                b.store(false, Ordering::SeqCst);
                Ok(())
            },
        )))
        .unwrap();

    std::thread::scope(|scope| {
        for t in 0..4_u64 {
            let host = &host;
            scope.spawn(move || {
                for i in 0..50 {
                    host.objects
                        .changed
                        .emit(&(ObjectRef::new(t, format!("Obj{i}")), PropertyId::new("Label")));
                }
            });
        }
        let bridge = &bridge;
        scope.spawn(move || {
            for i in 0..50 {
                let extra: ObserverRef = Arc::new(HandlerSet::new(format!("extra{i}")));
                bridge.add_observer(Arc::clone(&extra)).unwrap();
                bridge.remove_observer(extra.as_ref());
            }
        });
    });

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 200);
    assert_eq!(bridge.stats().kind(EventKind::ChangedObject).forwarded, 200);
    assert_eq!(bridge.observer_count(), 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every emission reaches the observers in registration order, whatever
    /// subset of them was removed beforehand.
    #[test]
    fn prop_order_survives_removals(
        count in 3_usize..8,
        removed in prop::collection::btree_set(0_usize..8, 0..4),
    ) {
        let host = HostSignals::new();
        let bridge = ObserverBridge::new(&host);
        let log = journal();
        let observers: Vec<ObserverRef> = (0..count)
            .map(|i| recorder(&format!("o{i}"), &log, &[EventKind::RenameDocument]))
            .collect();
        for observer in &observers {
            bridge.add_observer(Arc::clone(observer)).unwrap();
        }
        for &i in removed.iter().filter(|&&i| i < count) {
            bridge.remove_observer(observers[i].as_ref());
        }

        host.documents.rename.emit(&DocumentRef::new(1, "Doc"));

        let expected: Vec<String> = (0..count)
            .filter(|i| !removed.contains(i))
            .map(|i| format!("o{i}:RenameDocument"))
            .collect();
        prop_assert_eq!(&*log.lock(), &expected);
    }
}
