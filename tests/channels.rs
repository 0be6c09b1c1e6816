//! Pub/sub channel behavior: fan-out ordering, unsubscribe idempotence,
//! wildcard priority, and the bounded history log.

use std::sync::{Arc, Mutex};

use deskbus::{Bus, BusConfig, WindowId, WILDCARD};
use serde_json::json;

fn recording(
    handle: &deskbus::BusHandle,
    pattern: &str,
    log: &Arc<Mutex<Vec<String>>>,
    tag: &str,
) -> deskbus::Subscription {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    handle.subscribe(pattern, move |_msg| {
        log.lock().unwrap().push(tag.clone());
        Ok(())
    })
}

// ============================================================================
// Scenario: publish on demo.events reaches the subscriber intact
// ============================================================================

#[test]
fn publish_delivers_full_message() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));

    let received = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        handle.subscribe("demo.events", move |msg| {
            received.lock().unwrap().push(msg.clone());
            Ok(())
        });
    }

    let published = handle.publish("demo.events", "ping", json!({ "n": 1 }));

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let msg = &received[0];
    assert_eq!(msg.channel, "demo.events");
    assert_eq!(msg.message_type, "ping");
    assert_eq!(msg.payload["n"], json!(1));
    assert_eq!(msg.id, published.id);
    // Release the guard before publishing again: dispatch is synchronous and
    // the subscriber locks this same mutex.
    drop(received);

    // Ids stay unique across publishes.
    let next = handle.publish("demo.events", "ping", json!({ "n": 2 }));
    assert_ne!(next.id, published.id);
}

// ============================================================================
// Fan-out order: registration order, exact before wildcard
// ============================================================================

#[test]
fn subscribers_fire_in_registration_order() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    recording(&handle, "demo.events", &log, "first");
    recording(&handle, "demo.events", &log, "second");
    recording(&handle, "demo.events", &log, "third");

    handle.publish("demo.events", "ping", json!({}));
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn wildcard_registered_first_still_fires_after_exact() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    recording(&handle, WILDCARD, &log, "wild");
    recording(&handle, "demo.events", &log, "exact-a");
    recording(&handle, "demo.events", &log, "exact-b");

    handle.publish("demo.events", "ping", json!({}));
    assert_eq!(*log.lock().unwrap(), vec!["exact-a", "exact-b", "wild"]);
}

#[test]
fn wildcard_sees_publishes_on_any_channel() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    recording(&handle, WILDCARD, &log, "wild");

    handle.publish("one", "a", json!({}));
    handle.publish("two.three", "b", json!({}));
    assert_eq!(log.lock().unwrap().len(), 2);
}

// ============================================================================
// Unsubscribe idempotence
// ============================================================================

#[test]
fn double_unsubscribe_is_a_no_op() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let sub = recording(&handle, "demo.events", &log, "gone");
    let kept = recording(&handle, "demo.events", &log, "kept");

    sub.unsubscribe();
    sub.unsubscribe();

    handle.publish("demo.events", "ping", json!({}));
    assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    drop(kept);
}

#[test]
fn duplicate_patterns_are_independent_subscriptions() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    recording(&handle, "demo.events", &log, "one");
    let second = recording(&handle, "demo.events", &log, "two");

    handle.publish("demo.events", "ping", json!({}));
    assert_eq!(log.lock().unwrap().len(), 2);

    second.unsubscribe();
    handle.publish("demo.events", "ping", json!({}));
    assert_eq!(log.lock().unwrap().len(), 3);
}

// ============================================================================
// Failing callbacks are contained at the dispatch loop
// ============================================================================

#[test]
fn failing_subscriber_never_reaches_the_publisher() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));
    let log = Arc::new(Mutex::new(Vec::new()));

    handle.subscribe("demo.events", |_msg| {
        Err(deskbus::HandlerError::Rejected("broken program".into()))
    });
    recording(&handle, "demo.events", &log, "healthy");

    // Publish succeeds and later subscribers still fire.
    let msg = handle.publish("demo.events", "ping", json!({}));
    assert_eq!(msg.channel, "demo.events");
    assert_eq!(*log.lock().unwrap(), vec!["healthy"]);
}

// ============================================================================
// History bound: FIFO eviction at the cap
// ============================================================================

#[test]
fn history_keeps_only_the_most_recent_cap_entries() {
    let bus = Bus::new(BusConfig {
        history_cap: 4,
        ..BusConfig::default()
    });
    let handle = bus.handle(WindowId::new("w1"));

    for n in 0..10 {
        handle.publish("demo", "tick", json!({ "n": n }));
    }

    let history = bus.message_history();
    assert_eq!(history.len(), 4);
    let ns: Vec<i64> = history
        .iter()
        .map(|m| m.payload["n"].as_i64().unwrap())
        .collect();
    assert_eq!(ns, vec![6, 7, 8, 9]);
}

#[test]
fn history_records_publishes_with_no_subscribers() {
    let bus = Bus::default();
    let handle = bus.handle(WindowId::new("w1"));

    handle.publish("empty.channel", "ping", json!({}));
    assert_eq!(bus.message_history().len(), 1);
    // But an empty channel is not listed for introspection.
    assert!(bus.channels().is_empty());
}
