//! In-memory broker for testing and single-process scenarios.
//!
//! This module provides a thread-safe set of named queues that implements
//! `Sender`, `Listener` and `ConnectionFactory`, useful for:
//! - Unit and integration testing without a running Artemis
//! - Simulating broker outages (send-failure injection)
//! - Observing acknowledgements and rollbacks made by listener containers

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::BusError;
use super::factory::ConnectionFactory;
use super::listener::{Listener, ListenerSession};
use super::message::Message;
use super::sender::{validate_destination, Sender};

/// In-memory broker with competing-consumer queues.
///
/// Features:
/// - Thread-safe (clones share the same queues)
/// - Each message is delivered to exactly one session
/// - Rolled-back messages go back to the head of their queue, flagged
///   `redelivered:true`
/// - Every successful send is recorded for assertions
///
/// ## Example
///
/// ```
/// use artemis_relay::bus::{InMemoryBroker, Sender};
///
/// let broker = InMemoryBroker::new();
/// broker.send("component2.queue", "hello").unwrap();
///
/// assert_eq!(broker.depth("component2.queue"), 1);
/// assert_eq!(broker.sent_to("component2.queue"), vec!["hello".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    available: Condvar,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<Message>>,
    in_flight: HashMap<String, Message>,
    sent: Vec<Message>,
    acked: Vec<String>,
    rolled_back: Vec<String>,
    fail_all: Option<String>,
    fail_destinations: HashMap<String, String>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a message on a queue as an outside producer would.
    ///
    /// Bypasses failure injection and is not recorded in `sent()`.
    pub fn enqueue(&self, destination: &str, payload: &str) -> Message {
        let message = Message::new(destination, payload);
        let mut state = self.shared.state.lock();
        state
            .queues
            .entry(destination.to_string())
            .or_default()
            .push_back(message.clone());
        drop(state);
        self.shared.available.notify_all();
        message
    }

    /// Make every subsequent send fail with `ConnectionFailed(reason)`.
    pub fn fail_sends(&self, reason: &str) {
        self.shared.state.lock().fail_all = Some(reason.to_string());
    }

    /// Make sends to one destination fail with `ConnectionFailed(reason)`.
    pub fn fail_sends_to(&self, destination: &str, reason: &str) {
        self.shared
            .state
            .lock()
            .fail_destinations
            .insert(destination.to_string(), reason.to_string());
    }

    /// Clear all injected send failures.
    pub fn restore_sends(&self) {
        let mut state = self.shared.state.lock();
        state.fail_all = None;
        state.fail_destinations.clear();
    }

    /// Every message sent through `Sender::send`, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.shared.state.lock().sent.clone()
    }

    /// Payloads sent to one destination, in order.
    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.shared
            .state
            .lock()
            .sent
            .iter()
            .filter(|m| m.destination == destination)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Number of messages waiting on a queue (excluding in-flight ones).
    pub fn depth(&self, queue: &str) -> usize {
        self.shared
            .state
            .lock()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Number of delivered but not yet committed or rolled back messages.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Ids of committed messages.
    pub fn acknowledged(&self) -> Vec<String> {
        self.shared.state.lock().acked.clone()
    }

    /// Ids of rolled-back messages (one entry per rollback).
    pub fn rolled_back(&self) -> Vec<String> {
        self.shared.state.lock().rolled_back.clone()
    }

    /// Drop every queue, record and injected failure.
    pub fn clear(&self) {
        *self.shared.state.lock() = State::default();
    }
}

impl Sender for InMemoryBroker {
    fn send(&self, destination: &str, payload: &str) -> Result<(), BusError> {
        validate_destination(destination)?;

        let mut state = self.shared.state.lock();
        if let Some(reason) = state
            .fail_all
            .clone()
            .or_else(|| state.fail_destinations.get(destination).cloned())
        {
            return Err(BusError::ConnectionFailed(reason));
        }

        let message = Message::new(destination, payload);
        state.sent.push(message.clone());
        state
            .queues
            .entry(destination.to_string())
            .or_default()
            .push_back(message);
        drop(state);

        self.shared.available.notify_all();
        Ok(())
    }
}

impl Listener for InMemoryBroker {
    fn open(&self, queue: &str) -> Result<Box<dyn ListenerSession>, BusError> {
        validate_destination(queue)?;
        Ok(Box::new(InMemorySession {
            shared: Arc::clone(&self.shared),
            queue: queue.to_string(),
        }))
    }
}

impl ConnectionFactory for InMemoryBroker {
    fn sender(&self) -> Arc<dyn Sender> {
        Arc::new(self.clone())
    }

    fn listener(&self) -> Arc<dyn Listener> {
        Arc::new(self.clone())
    }

    fn describe(&self) -> String {
        "in-memory broker".to_string()
    }
}

/// A consumer session on one in-memory queue.
struct InMemorySession {
    shared: Arc<Shared>,
    queue: String,
}

impl ListenerSession for InMemorySession {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        loop {
            let next = state
                .queues
                .get_mut(&self.queue)
                .and_then(VecDeque::pop_front);

            if let Some(message) = next {
                state.in_flight.insert(message.id.clone(), message.clone());
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            self.shared.available.wait_for(&mut state, deadline - now);
        }
    }

    fn commit(&mut self, message: &Message) -> Result<(), BusError> {
        let mut state = self.shared.state.lock();
        if state.in_flight.remove(&message.id).is_none() {
            return Err(BusError::Protocol(format!(
                "message {} is not in flight",
                message.id
            )));
        }
        state.acked.push(message.id.clone());
        Ok(())
    }

    fn rollback(&mut self, message: &Message, _reason: &str) -> Result<(), BusError> {
        let mut state = self.shared.state.lock();
        let mut returned = state.in_flight.remove(&message.id).ok_or_else(|| {
            BusError::Protocol(format!("message {} is not in flight", message.id))
        })?;

        if !returned.is_redelivered() {
            returned.headers.retain(|(k, _)| k != "redelivered");
            returned = returned.with_header("redelivered", "true");
        }

        state.rolled_back.push(message.id.clone());
        state
            .queues
            .entry(self.queue.clone())
            .or_default()
            .push_front(returned);
        drop(state);

        self.shared.available.notify_all();
        Ok(())
    }
}
