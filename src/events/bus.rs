//! In-process fan-out of registry events
//!
//! Every subscriber owns a bounded channel. Publishing never waits on a
//! consumer: a subscriber whose buffer is full is evicted and its watch ends
//! with `Unavailable`, a subscriber whose receiver is gone is dropped.
//!
//! The bus also owns the sequencing lock that orders commits against replay
//! snapshots. Mutations take it just before committing and release it after
//! publishing; a replaying watch takes it while it reads the snapshot and
//! registers. A watcher therefore sees every mutation exactly once, either in
//! its snapshot or live.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::types::{RegistryEvent, SubscriptionFilter};
use crate::errors::{CatalogError, Result};

/// Per-subscriber buffer used when none is configured
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Identifier of one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    sender: mpsc::Sender<RegistryEvent>,
    filter: SubscriptionFilter,
    evicted: Arc<AtomicBool>,
}

pub struct EventBus {
    subscribers: DashMap<SubscriptionId, Subscriber>,
    id_counter: AtomicU64,
    buffer: usize,
    sequencer: Mutex<()>,
}

impl EventBus {
    /// Bus whose subscribers buffer up to `buffer` undelivered events (at least one)
    pub fn new(buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            id_counter: AtomicU64::new(0),
            buffer: buffer.max(1),
            sequencer: Mutex::new(()),
        })
    }

    /// Serialize a commit-and-publish or snapshot-and-register section
    pub async fn sequence(&self) -> MutexGuard<'_, ()> {
        self.sequencer.lock().await
    }

    /// Register a subscriber. Dropping the returned handle unregisters it.
    pub fn subscribe(self: &Arc<Self>, filter: SubscriptionFilter) -> Subscription {
        let id = SubscriptionId(self.id_counter.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.buffer);
        let evicted = Arc::new(AtomicBool::new(false));

        debug!(
            subscription_id = %id,
            project_id = %filter.project_id,
            show_sensitive_info = filter.show_sensitive_info,
            "Registered registry event subscriber"
        );
        self.subscribers.insert(id, Subscriber { sender, filter, evicted: evicted.clone() });

        Subscription { id, receiver, evicted, eviction_reported: false, bus: Arc::downgrade(self) }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscription_id = %id, "Unregistered registry event subscriber");
        }
    }

    /// Deliver a batch to every matching subscriber without waiting on any of them
    pub fn publish(&self, events: &[RegistryEvent]) {
        if events.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            for event in events.iter().filter(|e| subscriber.filter.matches(e)) {
                match subscriber.sender.try_send(event.view_for(&subscriber.filter)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            subscription_id = %entry.key(),
                            buffer = self.buffer,
                            "Registry event subscriber is not keeping up, disconnecting it"
                        );
                        subscriber.evicted.store(true, Ordering::SeqCst);
                        dead.push(*entry.key());
                        break;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(*entry.key());
                        break;
                    }
                }
            }
        }

        for id in dead {
            self.unsubscribe(id);
        }

        debug!(events = events.len(), subscribers = self.subscribers.len(), "Published registry events");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Receiving side of one subscriber
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<RegistryEvent>,
    evicted: Arc<AtomicBool>,
    eviction_reported: bool,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next live event.
    ///
    /// Yields one `Unavailable` error after the bus evicted this subscriber, and
    /// `None` once the stream is over.
    pub async fn recv(&mut self) -> Option<Result<RegistryEvent>> {
        match self.receiver.recv().await {
            Some(event) => Some(Ok(event)),
            None if self.evicted.load(Ordering::SeqCst) && !self.eviction_reported => {
                self.eviction_reported = true;
                Some(Err(CatalogError::unavailable("watcher fell behind and was disconnected")))
            }
            None => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
