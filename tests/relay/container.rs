//! Listener container tests against the in-memory broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use artemis_relay::bus::{BusError, InMemoryBroker, Listener, ListenerSession, Message};
use artemis_relay::relay::{ListenerContainer, ListenerError};

use crate::support::{fast_options, wait_until};

#[test]
fn commits_handled_messages() {
    let broker = InMemoryBroker::new();
    broker.enqueue("work", "a");
    broker.enqueue("work", "b");

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let handle = ListenerContainer::start(
        "test",
        "work",
        Arc::new(broker.clone()),
        move |_: &Message| -> Result<(), ListenerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        fast_options("1"),
    );

    assert!(wait_until(Duration::from_secs(5), || broker.acknowledged().len() == 2));

    let stats = handle.stop();
    assert_eq!(stats.handled, 2);
    assert_eq!(stats.failed, 0);
    assert!(stats.polls >= 2);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(broker.depth("work"), 0);
    assert_eq!(broker.in_flight(), 0);
}

#[test]
fn failed_message_is_rolled_back_and_redelivered() {
    let broker = InMemoryBroker::new();
    let original = broker.enqueue("work", "flaky");

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let handle = ListenerContainer::start(
        "test",
        "work",
        Arc::new(broker.clone()),
        move |message: &Message| -> Result<(), ListenerError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                assert!(!message.is_redelivered());
                Err(ListenerError::Handler("downstream unavailable".into()))
            } else {
                assert!(message.is_redelivered());
                Ok(())
            }
        },
        fast_options("1"),
    );

    assert!(wait_until(Duration::from_secs(5), || !broker.acknowledged().is_empty()));

    let stats = handle.stop();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.handled, 1);
    assert_eq!(broker.rolled_back(), vec![original.id.clone()]);
    assert_eq!(broker.acknowledged(), vec![original.id]);
}

#[test]
fn panicking_handler_counts_as_failure() {
    let broker = InMemoryBroker::new();
    broker.enqueue("work", "poison");

    let handle = ListenerContainer::start(
        "test",
        "work",
        Arc::new(broker.clone()),
        |_: &Message| -> Result<(), ListenerError> { panic!("handler blew up") },
        fast_options("1"),
    );

    assert!(wait_until(Duration::from_secs(5), || !broker.rolled_back().is_empty()));

    let stats = handle.stop();
    assert!(stats.failed >= 1);
    assert_eq!(stats.handled, 0);
    assert!(broker.acknowledged().is_empty());
    // Still on the queue for the broker's own redelivery policy.
    assert_eq!(broker.depth("work") + broker.in_flight(), 1);
}

#[test]
fn starts_min_consumers() {
    let broker = InMemoryBroker::new();
    let handle = ListenerContainer::start(
        "test",
        "idle",
        Arc::new(broker.clone()),
        |_: &Message| -> Result<(), ListenerError> { Ok(()) },
        fast_options("3"),
    );

    assert_eq!(handle.active_consumers(), 3);
    assert_eq!(handle.stats().peak_consumers, 3);

    let stats = handle.stop();
    assert_eq!(stats.handled, 0);
}

#[test]
fn scales_up_under_load_and_back_down_when_idle() {
    let broker = InMemoryBroker::new();
    for i in 0..20 {
        broker.enqueue("busy", &format!("job-{i}"));
    }

    let handle = ListenerContainer::start(
        "test",
        "busy",
        Arc::new(broker.clone()),
        |_: &Message| -> Result<(), ListenerError> {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        },
        fast_options("1-4"),
    );

    assert!(wait_until(Duration::from_secs(10), || broker.acknowledged().len() == 20));
    let peak = handle.stats().peak_consumers;
    assert!(peak > 1, "expected scale-up, peak was {peak}");
    assert!(peak <= 4);

    assert!(wait_until(Duration::from_secs(5), || handle.active_consumers() == 1));

    let stats = handle.stop();
    assert_eq!(stats.handled, 20);
}

#[test]
fn retired_consumers_are_reaped_across_bursts() {
    let broker = InMemoryBroker::new();
    let handle = ListenerContainer::start(
        "test",
        "bursty",
        Arc::new(broker.clone()),
        |_: &Message| -> Result<(), ListenerError> {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        },
        fast_options("1-4"),
    );

    for burst in 1..=5 {
        for i in 0..12 {
            broker.enqueue("bursty", &format!("burst-{burst}-{i}"));
        }
        assert!(wait_until(Duration::from_secs(10), || {
            broker.acknowledged().len() == burst * 12
        }));
        assert!(wait_until(Duration::from_secs(5), || handle.active_consumers() == 1));
    }

    assert!(handle.stats().peak_consumers > 1);
    // One live consumer plus at most the last burst's retirees.
    let tracked = handle.consumer_threads();
    assert!(tracked <= 8, "{tracked} consumer threads still tracked");

    let stats = handle.stop();
    assert_eq!(stats.handled, 60);
}

/// Fails the first `failures` opens, then delegates to the broker.
struct FlakyListener {
    broker: InMemoryBroker,
    failures: AtomicUsize,
}

impl Listener for FlakyListener {
    fn open(&self, queue: &str) -> Result<Box<dyn ListenerSession>, BusError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BusError::ConnectionFailed("broker starting".into()));
        }
        self.broker.open(queue)
    }
}

#[test]
fn retries_session_open_after_recovery_interval() {
    let broker = InMemoryBroker::new();
    broker.enqueue("late", "eventually");

    let listener = Arc::new(FlakyListener {
        broker: broker.clone(),
        failures: AtomicUsize::new(3),
    });
    let handle = ListenerContainer::start(
        "test",
        "late",
        listener.clone(),
        |_: &Message| -> Result<(), ListenerError> { Ok(()) },
        fast_options("1"),
    );

    assert!(wait_until(Duration::from_secs(5), || broker.acknowledged().len() == 1));
    assert_eq!(listener.failures.load(Ordering::SeqCst), 0);

    let stats = handle.stop();
    assert_eq!(stats.handled, 1);
}

#[test]
fn drop_signals_stop() {
    let broker = InMemoryBroker::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();

    let handle = ListenerContainer::start(
        "test",
        "dropped",
        Arc::new(broker.clone()),
        move |_: &Message| -> Result<(), ListenerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        fast_options("2"),
    );
    drop(handle);

    // Give consumers time to notice.
    thread::sleep(Duration::from_millis(100));
    broker.enqueue("dropped", "too late");
    thread::sleep(Duration::from_millis(100));

    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert_eq!(broker.depth("dropped"), 1);
}
