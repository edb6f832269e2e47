//! This module provides the [`EventBus`], which decouples keep state mutations from the delivery of
//! [`KeepEvent`]s to interested subscribers.
//!
//! Every subscription owns a dedicated delivery task fed by an unbounded queue. Publishing only
//! enqueues the event for every matching subscriber, so a slow subscriber never stalls the
//! publishing mutation and a panicking callback only tears down its own delivery task.
//!
//! Publishes are serialized by the mutex guarding the subscriber table, therefore every subscriber
//! observes events in the order `publish` was called. Callbacks of different subscribers run
//! concurrently with each other and with subsequent registry mutations.
//!
//! After [`EventBus::unsubscribe`] returns, no callback of the subscriber starts anymore and events
//! still queued for it are dropped. If a callback is running while another thread unsubscribes, the
//! unsubscribe waits for it to finish. A callback may unsubscribe its own subscription.
//!
//! Delivery tasks run on the tokio runtime the bus was created in (see [`EventBus::with_runtime`]),
//! or on the runtime of the subscribing thread. A bus used without any runtime delivers on a
//! dedicated thread per subscription.

use std::{
    cell::Cell,
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
};

use keep_types::{
    KeepAddress,
    events::{KeepEvent, Topic},
};
use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, sync::mpsc};

use crate::metrics::{
    METRICS_ID_BUS_DEAD_SUBSCRIBERS, METRICS_ID_BUS_DELIVERED, METRICS_ID_BUS_PUBLISHED,
    METRICS_ID_BUS_SUBSCRIPTIONS,
};


/// A handle for a registered callback.
///
/// The subscription stays registered as long as this handle exists. Dropping it, calling
/// [`Subscription::unsubscribe`] or [`EventBus::unsubscribe`] removes the registration.
/// Use [`Subscription::detach`] to keep the registration for the lifetime of the bus.
///
/// The handle does not expose any bus internals, it only wraps the action that removes the
/// registration. Other event sources can therefore hand out the same type.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Creates a subscription that calls `unsubscribe` at most once.
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Removes the registration. No event published afterwards is delivered.
    pub fn unsubscribe(mut self) {
        self.unsubscribe_inner();
    }

    /// Consumes the handle without removing the registration.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }

    fn unsubscribe_inner(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe_inner();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

thread_local! {
    /// The subscription whose callback runs on this thread, if any.
    static DELIVERING: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Marks the current thread as delivering for a subscription until dropped.
struct DeliveringGuard;

impl DeliveringGuard {
    fn enter(id: u64) -> Self {
        DELIVERING.with(|delivering| delivering.set(Some(id)));
        Self
    }
}

impl Drop for DeliveringGuard {
    fn drop(&mut self) {
        DELIVERING.with(|delivering| delivering.set(None));
    }
}

/// Shared between the subscriber table and the delivery of one subscription.
///
/// Every callback runs while holding `gate` for reading. Removing the subscription clears
/// `active` and then acquires `gate` for writing, which waits for a running callback.
struct DeliveryState {
    active: AtomicBool,
    gate: RwLock<()>,
}

impl DeliveryState {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            gate: RwLock::new(()),
        }
    }

    /// Stops the delivery. Returns after a callback running on another thread finished.
    fn deactivate(&self, id: u64) {
        self.active.store(false, Ordering::Release);
        if DELIVERING.with(Cell::get) != Some(id) {
            drop(self.gate.write());
        }
    }

    /// Runs `callback` unless the subscription was removed. Returns `false` in that case.
    fn deliver<F>(&self, id: u64, event: KeepEvent, callback: &F) -> bool
    where
        F: Fn(KeepEvent),
    {
        let _gate = self.gate.read();
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        let _delivering = DeliveringGuard::enter(id);
        callback(event);
        ::metrics::counter!(METRICS_ID_BUS_DELIVERED).increment(1);
        true
    }
}

/// A registered subscriber.
struct Subscriber {
    topic: Topic,
    scope: Option<KeepAddress>,
    queue: mpsc::UnboundedSender<KeepEvent>,
    state: Arc<DeliveryState>,
}

impl Subscriber {
    fn matches(&self, topic: Topic, scope: Option<KeepAddress>) -> bool {
        self.topic == topic && self.scope.is_none_or(|own| Some(own) == scope)
    }
}

#[derive(Default)]
struct EventBusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    runtime: Option<Handle>,
}

impl EventBusInner {
    fn remove(&self, id: u64) {
        // release the table before waiting for a running callback
        let removed = self.subscribers.lock().remove(&id);
        if let Some(subscriber) = removed {
            subscriber.state.deactivate(id);
            ::metrics::gauge!(METRICS_ID_BUS_SUBSCRIPTIONS).decrement(1);
            tracing::trace!("removed subscription {id} on {}", subscriber.topic);
        }
    }
}

/// Dispatches [`KeepEvent`]s to subscribers. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus(Arc<EventBusInner>);

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a new bus without subscribers.
    ///
    /// Captures the current tokio runtime, if any, to run the delivery tasks.
    pub fn new() -> Self {
        Self(Arc::new(EventBusInner {
            runtime: Handle::try_current().ok(),
            ..Default::default()
        }))
    }

    /// Creates a new bus without subscribers that runs its delivery tasks on `runtime`.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self(Arc::new(EventBusInner {
            runtime: Some(runtime),
            ..Default::default()
        }))
    }

    /// Registers `callback` for all events on `topic`.
    ///
    /// If `scope` is set, only events published for this keep are delivered. Unscoped
    /// subscriptions receive every event on the topic.
    ///
    /// The callback runs on the delivery task of this subscription and should return quickly,
    /// e.g., by forwarding the event into a channel.
    pub fn subscribe<F>(&self, topic: Topic, scope: Option<KeepAddress>, callback: F) -> Subscription
    where
        F: Fn(KeepEvent) + Send + Sync + 'static,
    {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        let (queue, events) = mpsc::unbounded_channel();
        let state = Arc::new(DeliveryState::new());
        self.spawn_delivery(id, events, Arc::clone(&state), callback);
        self.0.subscribers.lock().insert(
            id,
            Subscriber {
                topic,
                scope,
                queue,
                state,
            },
        );
        ::metrics::gauge!(METRICS_ID_BUS_SUBSCRIPTIONS).increment(1);
        tracing::trace!("added subscription {id} on {topic} (scope: {scope:?})");
        let bus: Weak<EventBusInner> = Arc::downgrade(&self.0);
        Subscription::new(move || {
            if let Some(bus) = bus.upgrade() {
                bus.remove(id);
            }
        })
    }

    /// Removes the registration of `subscription`. Same as [`Subscription::unsubscribe`].
    pub fn unsubscribe(&self, subscription: Subscription) {
        subscription.unsubscribe();
    }

    /// Dispatches `event` to every live subscriber of its topic whose scope matches `scope`.
    ///
    /// Returns the amount of subscribers the event was dispatched to. Never waits for a callback.
    pub fn publish(&self, event: KeepEvent, scope: Option<KeepAddress>) -> usize {
        let topic = event.topic();
        let mut subscribers = self.0.subscribers.lock();
        let mut dispatched = 0;
        let mut dead = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if !subscriber.matches(topic, scope) {
                continue;
            }
            if subscriber.queue.send(event).is_ok() {
                dispatched += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            // the delivery task is gone, most likely the callback panicked
            tracing::warn!("removing dead subscriber {id} on {topic}");
            subscribers.remove(&id);
            ::metrics::gauge!(METRICS_ID_BUS_SUBSCRIPTIONS).decrement(1);
            ::metrics::counter!(METRICS_ID_BUS_DEAD_SUBSCRIBERS).increment(1);
        }
        ::metrics::counter!(METRICS_ID_BUS_PUBLISHED, "topic" => topic.name()).increment(1);
        tracing::trace!("published {topic} event to {dispatched} subscribers");
        dispatched
    }

    /// Returns the amount of live subscriptions on `topic`, scoped or not.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.0
            .subscribers
            .lock()
            .values()
            .filter(|subscriber| subscriber.topic == topic)
            .count()
    }

    fn spawn_delivery<F>(
        &self,
        id: u64,
        events: mpsc::UnboundedReceiver<KeepEvent>,
        state: Arc<DeliveryState>,
        callback: F,
    ) where
        F: Fn(KeepEvent) + Send + Sync + 'static,
    {
        let runtime = self.0.runtime.clone().or_else(|| Handle::try_current().ok());
        if let Some(runtime) = runtime {
            runtime.spawn(deliver(id, events, state, callback));
            return;
        }
        let spawned = thread::Builder::new()
            .name(format!("keep-bus-delivery-{id}"))
            .spawn(move || deliver_blocking(id, events, state, callback));
        if let Err(err) = spawned {
            // the receiver is gone, the next publish removes the subscriber
            tracing::error!("cannot spawn delivery thread for subscription {id}: {err:?}");
        }
    }
}

/// Delivery task of a single subscription. Stops when the subscription is removed.
async fn deliver<F>(
    id: u64,
    mut events: mpsc::UnboundedReceiver<KeepEvent>,
    state: Arc<DeliveryState>,
    callback: F,
) where
    F: Fn(KeepEvent) + Send + Sync + 'static,
{
    while let Some(event) = events.recv().await {
        if !state.deliver(id, event, &callback) {
            break;
        }
    }
    tracing::trace!("delivery task of subscription {id} stopped");
}

/// Same as [`deliver`] for buses used outside of a tokio runtime.
fn deliver_blocking<F>(
    id: u64,
    mut events: mpsc::UnboundedReceiver<KeepEvent>,
    state: Arc<DeliveryState>,
    callback: F,
) where
    F: Fn(KeepEvent) + Send + Sync + 'static,
{
    while let Some(event) = events.blocking_recv() {
        if !state.deliver(id, event, &callback) {
            break;
        }
    }
    tracing::trace!("delivery thread of subscription {id} stopped");
}
