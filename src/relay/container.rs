//! Listener container: consumer threads bound to one queue.
//!
//! A container owns between `min` and `max` consumer threads, each with its
//! own [`ListenerSession`]. Every received message is handed to the
//! [`MessageHandler`] on the consumer's thread; `Ok` commits the message and
//! `Err` (or a panic) rolls it back so the broker redelivers it.
//!
//! ## Scaling
//!
//! `min` consumers start immediately. Whenever a consumer picks up a message
//! while every other consumer is busy too, one more is started, up to `max`.
//! Consumers above `min` retire after `idle_receive_limit` empty receives
//! in a row.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use artemis_relay::bus::{InMemoryBroker, Message};
//! use artemis_relay::relay::{ContainerOptions, ListenerContainer, ListenerError};
//!
//! let broker = InMemoryBroker::new();
//! broker.enqueue("component2.queue", "hello");
//!
//! let handle = ListenerContainer::start(
//!     "component2",
//!     "component2.queue",
//!     Arc::new(broker.clone()),
//!     |message: &Message| -> Result<(), ListenerError> {
//!         println!("got {}", message.payload);
//!         Ok(())
//!     },
//!     ContainerOptions {
//!         receive_timeout: Duration::from_millis(20),
//!         ..ContainerOptions::default()
//!     },
//! );
//!
//! while broker.acknowledged().is_empty() {
//!     std::thread::sleep(Duration::from_millis(5));
//! }
//! let stats = handle.stop();
//! assert_eq!(stats.handled, 1);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::error::ListenerError;
use crate::bus::{Listener, ListenerSession, Message};

/// Number of consumers a container may run, parsed from `"N"` or `"min-max"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Concurrency {
    pub min: usize,
    pub max: usize,
}

impl Concurrency {
    /// Exactly `consumers` consumers.
    pub fn fixed(consumers: usize) -> Self {
        Self {
            min: consumers,
            max: consumers,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::fixed(1)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// A concurrency setting that is not `"N"` or `"min-max"` with `1 <= min <= max`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid concurrency {0:?}: expected \"N\" or \"min-max\" with 1 <= min <= max")]
pub struct InvalidConcurrency(pub String);

impl FromStr for Concurrency {
    type Err = InvalidConcurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidConcurrency(s.to_string());
        let parse = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());

        let concurrency = match s.split_once('-') {
            Some((min, max)) => Concurrency {
                min: parse(min)?,
                max: parse(max)?,
            },
            None => Concurrency::fixed(parse(s)?),
        };

        if concurrency.min == 0 || concurrency.min > concurrency.max {
            return Err(invalid());
        }
        Ok(concurrency)
    }
}

impl TryFrom<String> for Concurrency {
    type Error = InvalidConcurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Callback invoked once per received message.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        self(message)
    }
}

/// Tuning for a [`ListenerContainer`].
#[derive(Clone, Debug)]
pub struct ContainerOptions {
    pub concurrency: Concurrency,
    /// How long one receive call waits before counting as empty.
    pub receive_timeout: Duration,
    /// Pause before reopening a session that could not be opened or broke.
    pub recovery_interval: Duration,
    /// Empty receives in a row after which a surplus consumer retires.
    pub idle_receive_limit: u32,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::default(),
            receive_timeout: Duration::from_secs(1),
            recovery_interval: Duration::from_secs(5),
            idle_receive_limit: 10,
        }
    }
}

/// Counters collected while a container runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContainerStats {
    /// Messages handled and acknowledged.
    pub handled: usize,
    /// Messages whose handler failed (or whose acknowledgement failed).
    pub failed: usize,
    /// Receive calls made across all consumers.
    pub polls: usize,
    /// Highest number of consumers running at once.
    pub peak_consumers: usize,
}

struct Shared {
    name: String,
    queue: String,
    listener: Arc<dyn Listener>,
    handler: Arc<dyn MessageHandler>,
    options: ContainerOptions,
    running: AtomicBool,
    active: AtomicUsize,
    busy: AtomicUsize,
    next_consumer: AtomicUsize,
    handled: AtomicUsize,
    failed: AtomicUsize,
    polls: AtomicUsize,
    peak: AtomicUsize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stats(&self) -> ContainerStats {
        ContainerStats {
            handled: self.handled.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            polls: self.polls.load(Ordering::SeqCst),
            peak_consumers: self.peak.load(Ordering::SeqCst),
        }
    }

    /// Sleep for `duration` or until the container is stopped.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

/// Entry point for starting listener containers.
pub struct ListenerContainer;

impl ListenerContainer {
    /// Start consuming `queue` through `listener`, handing each message to
    /// `handler`. Returns immediately; consumers run on their own threads.
    pub fn start<H>(
        name: &str,
        queue: &str,
        listener: Arc<dyn Listener>,
        handler: H,
        options: ContainerOptions,
    ) -> ContainerHandle
    where
        H: MessageHandler + 'static,
    {
        info!(
            container = %name,
            %queue,
            concurrency = %options.concurrency,
            "Starting listener container"
        );

        let shared = Arc::new(Shared {
            name: name.to_string(),
            queue: queue.to_string(),
            listener,
            handler: Arc::new(handler),
            options,
            running: AtomicBool::new(true),
            active: AtomicUsize::new(0),
            busy: AtomicUsize::new(0),
            next_consumer: AtomicUsize::new(1),
            handled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
        });

        for _ in 0..shared.options.concurrency.min {
            spawn_consumer(&shared);
        }

        ContainerHandle { shared }
    }
}

/// Handle to a running container. Drop or call `stop()` to shut down.
pub struct ContainerHandle {
    shared: Arc<Shared>,
}

impl ContainerHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn queue(&self) -> &str {
        &self.shared.queue
    }

    /// Consumers currently running.
    pub fn active_consumers(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Consumer threads still tracked for joining, including retired ones
    /// not yet reaped.
    pub fn consumer_threads(&self) -> usize {
        self.shared.threads.lock().len()
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> ContainerStats {
        self.shared.stats()
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Stop every consumer and wait for them to finish. Returns stats.
    ///
    /// A message being handled when stop is called is finished first.
    pub fn stop(self) -> ContainerStats {
        self.signal_stop();

        // Consumers may start one more consumer while shutting down.
        loop {
            let handles = std::mem::take(&mut *self.shared.threads.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.join().is_err() {
                    error!(container = %self.shared.name, "consumer thread panicked");
                }
            }
        }

        let stats = self.shared.stats();
        info!(
            container = %self.shared.name,
            handled = stats.handled,
            failed = stats.failed,
            "Listener container stopped"
        );
        stats
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

/// Start one more consumer unless stopped or already at `max`.
fn spawn_consumer(shared: &Arc<Shared>) -> bool {
    if !shared.is_running() {
        return false;
    }

    let max = shared.options.concurrency.max;
    let reserved = shared
        .active
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1));
    let active = match reserved {
        Ok(previous) => previous + 1,
        Err(_) => return false,
    };
    shared.peak.fetch_max(active, Ordering::SeqCst);

    let id = shared.next_consumer.fetch_add(1, Ordering::SeqCst);
    let consumer = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name(format!("{}-{}", shared.name, id))
        .spawn(move || run_consumer(consumer, id));

    match spawned {
        Ok(handle) => {
            debug!(container = %shared.name, consumer = id, active, "consumer started");
            // Retired consumers have exited; drop their handles.
            let mut threads = shared.threads.lock();
            threads.retain(|thread| !thread.is_finished());
            threads.push(handle);
            true
        }
        Err(e) => {
            shared.active.fetch_sub(1, Ordering::SeqCst);
            error!(container = %shared.name, error = %e, "could not start consumer thread");
            false
        }
    }
}

enum Exit {
    Stopped,
    Retired,
}

fn run_consumer(shared: Arc<Shared>, id: usize) {
    let exit = consume(&shared, id);
    if let Exit::Stopped = exit {
        shared.active.fetch_sub(1, Ordering::SeqCst);
    }
    debug!(container = %shared.name, consumer = id, "consumer finished");
}

fn consume(shared: &Arc<Shared>, id: usize) -> Exit {
    let options = &shared.options;
    let mut idle_receives = 0_u32;

    while shared.is_running() {
        let mut session = match shared.listener.open(&shared.queue) {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    container = %shared.name,
                    queue = %shared.queue,
                    error = %e,
                    "Could not open consumer session, retrying in {:?}",
                    options.recovery_interval
                );
                shared.pause(options.recovery_interval);
                continue;
            }
        };

        while shared.is_running() {
            shared.polls.fetch_add(1, Ordering::SeqCst);

            match session.receive(options.receive_timeout) {
                Ok(Some(message)) => {
                    idle_receives = 0;
                    let busy = shared.busy.fetch_add(1, Ordering::SeqCst) + 1;
                    if busy >= shared.active.load(Ordering::SeqCst) {
                        spawn_consumer(shared);
                    }
                    dispatch(shared, session.as_mut(), &message);
                    shared.busy.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(None) => {
                    idle_receives += 1;
                    if idle_receives >= options.idle_receive_limit && try_retire(shared) {
                        debug!(container = %shared.name, consumer = id, "idle consumer retiring");
                        return Exit::Retired;
                    }
                }
                Err(e) => {
                    warn!(
                        container = %shared.name,
                        queue = %shared.queue,
                        error = %e,
                        "Consumer session failed, reconnecting in {:?}",
                        options.recovery_interval
                    );
                    break;
                }
            }
        }

        drop(session);
        shared.pause(options.recovery_interval);
    }

    Exit::Stopped
}

/// Give up this consumer's slot if more than `min` are running.
fn try_retire(shared: &Shared) -> bool {
    let min = shared.options.concurrency.min;
    shared
        .active
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > min).then(|| n - 1))
        .is_ok()
}

fn dispatch(shared: &Shared, session: &mut dyn ListenerSession, message: &Message) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.handler.on_message(message)))
        .unwrap_or_else(|payload| Err(ListenerError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(()) => match session.commit(message) {
            Ok(()) => {
                shared.handled.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    container = %shared.name,
                    message_id = %message.id,
                    error = %e,
                    "Failed to acknowledge message"
                );
            }
        },
        Err(e) => {
            shared.failed.fetch_add(1, Ordering::SeqCst);
            error!(
                container = %shared.name,
                message_id = %message.id,
                error = %e,
                "Listener failed, rolling back message"
            );
            if let Err(rollback_error) = session.rollback(message, &e.to_string()) {
                error!(
                    container = %shared.name,
                    message_id = %message.id,
                    error = %rollback_error,
                    "Failed to roll back message"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
