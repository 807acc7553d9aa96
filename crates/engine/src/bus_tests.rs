// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wid_core::test_support::{build_failed, file_saved};

fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl Fn(&Event) -> Result<(), BusError> {
    let log = Arc::clone(log);
    move |event: &Event| {
        log.lock().push(format!("{tag}:{}", event.name()));
        Ok(())
    }
}

#[test]
fn delivers_in_registration_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _a = bus.subscribe(EventKind::FileSaved, "a", recorder(&log, "a"));
    let _b = bus.subscribe(EventKind::FileSaved, "b", recorder(&log, "b"));
    let _c = bus.subscribe(EventKind::FileSaved, "c", recorder(&log, "c"));

    assert_eq!(bus.publish(&file_saved("a.ts")), 3);
    assert_eq!(
        *log.lock(),
        vec!["a:file:saved", "b:file:saved", "c:file:saved"]
    );
}

#[test]
fn delivers_only_to_matching_kind() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _sub = bus.subscribe(EventKind::BuildFailed, "build", recorder(&log, "build"));

    assert_eq!(bus.publish(&file_saved("a.ts")), 0);
    assert_eq!(bus.publish(&build_failed("boom")), 1);
    assert_eq!(*log.lock(), vec!["build:build:failed"]);
}

#[test]
fn failing_handler_does_not_block_later_subscribers() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _a = bus.subscribe(EventKind::FileSaved, "failing", |_| {
        Err(BusError::Handler("nope".to_string()))
    });
    let _b = bus.subscribe(EventKind::FileSaved, "after", recorder(&log, "after"));

    assert_eq!(bus.publish(&file_saved("a.ts")), 1);
    assert_eq!(*log.lock(), vec!["after:file:saved"]);
}

#[test]
fn panicking_handler_is_isolated() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _a = bus.subscribe(EventKind::FileSaved, "panicky", |_| panic!("subscriber bug"));
    let _b = bus.subscribe(EventKind::FileSaved, "after", recorder(&log, "after"));

    assert_eq!(bus.publish(&file_saved("a.ts")), 1);
    assert_eq!(bus.publish(&file_saved("a.ts")), 1);
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn unsubscribe_detaches_and_is_idempotent() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sub = bus.subscribe(EventKind::FileSaved, "a", recorder(&log, "a"));
    assert_eq!(bus.subscriber_count(EventKind::FileSaved), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    assert_eq!(bus.subscriber_count(EventKind::FileSaved), 0);
    assert_eq!(bus.publish(&file_saved("a.ts")), 0);
    assert!(log.lock().is_empty());
}

#[test]
fn dropping_subscription_unsubscribes() {
    let bus = EventBus::new();
    {
        let _sub = bus.subscribe(EventKind::FileSaved, "scoped", |_| Ok(()));
        assert_eq!(bus.subscriber_count(EventKind::FileSaved), 1);
    }
    assert_eq!(bus.subscriber_count(EventKind::FileSaved), 0);
}

#[test]
fn subscription_outliving_bus_is_harmless() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(EventKind::FileSaved, "orphan", |_| Ok(()));
    drop(bus);
    sub.unsubscribe();
}

#[test]
fn handlers_may_publish_reentrantly() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let inner_bus = bus.clone();
    let _relay = bus.subscribe(EventKind::FileSaved, "relay", move |_| {
        inner_bus.publish(&build_failed("from relay"));
        Ok(())
    });
    let _sink = bus.subscribe(EventKind::BuildFailed, "sink", recorder(&log, "sink"));

    bus.publish(&file_saved("a.ts"));
    assert_eq!(*log.lock(), vec!["sink:build:failed"]);
}
