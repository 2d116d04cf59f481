//! The [EventBus] implementation.

use crate::event::{Event, EventKind};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc;

/// What `publish` does when the bus queue itself is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the event and count it.
    Drop,
    /// Wait for room, up to the timeout, then fail.
    Block {
        /// How long a publisher may wait for queue room.
        timeout: Duration,
    },
}

/// Construction parameters for an [EventBus].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Depth of the shared publish queue.
    pub queue_depth: usize,
    /// How many recent events the replay ring retains.
    pub history: usize,
    /// Default per-subscriber channel capacity.
    pub default_buffer: usize,
    /// Policy when the publish queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_depth: 1024,
            history: 256,
            default_buffer: 256,
            overflow: OverflowPolicy::Drop,
        }
    }
}

/// Errors surfaced by [EventBus::publish].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The bus pump has shut down.
    #[error("event bus is closed")]
    Closed,
    /// The queue stayed full past the configured blocking timeout.
    #[error("event bus queue full after {0:?}")]
    Timeout(Duration),
}

/// Selects which events a subscriber receives.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    kinds: Option<Vec<EventKind>>,
    chain_id: Option<u64>,
}

impl EventFilter {
    /// Matches every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches only the given kinds.
    pub fn kinds(kinds: &[EventKind]) -> Self {
        Self { kinds: Some(kinds.to_vec()), chain_id: None }
    }

    /// Restricts the filter to a single chain.
    pub fn for_chain(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Returns `true` if the event passes the filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(chain_id) = self.chain_id {
            if event.chain_id != chain_id {
                return false;
            }
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind),
            None => true,
        }
    }
}

struct SubscriberEntry {
    filter: EventFilter,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

struct Shared {
    subscribers: Mutex<HashMap<String, SubscriberEntry>>,
    history: Mutex<VecDeque<Event>>,
    history_cap: usize,
    publish_drops: AtomicU64,
}

/// The bounded in-process event bus.
pub struct EventBus {
    queue_tx: mpsc::Sender<Event>,
    shared: Arc<Shared>,
    overflow: OverflowPolicy,
    default_buffer: usize,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("overflow", &self.overflow)
            .finish()
    }
}

impl EventBus {
    /// Creates a bus and spawns its pump task on the current runtime.
    pub fn new(config: BusConfig) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth.max(1));
        let shared = Arc::new(Shared {
            subscribers: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(config.history)),
            history_cap: config.history,
            publish_drops: AtomicU64::new(0),
        });
        tokio::spawn(pump(Arc::clone(&shared), queue_rx));
        Arc::new(Self {
            queue_tx,
            shared,
            overflow: config.overflow,
            default_buffer: config.default_buffer.max(1),
        })
    }

    /// Publishes an event.
    ///
    /// Completes in bounded time regardless of subscriber state: the only
    /// wait is for room in the bus queue, and only under
    /// [OverflowPolicy::Block].
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        match self.overflow {
            OverflowPolicy::Drop => match self.queue_tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.shared.publish_drops.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(PublishError::Closed),
            },
            OverflowPolicy::Block { timeout } => {
                match tokio::time::timeout(timeout, self.queue_tx.send(event)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(PublishError::Closed),
                    Err(_) => {
                        self.shared.publish_drops.fetch_add(1, Ordering::Relaxed);
                        Err(PublishError::Timeout(timeout))
                    }
                }
            }
        }
    }

    /// Attaches a subscriber, replaying matching retained history into its
    /// channel. Re-subscribing an existing id replaces the prior
    /// subscription.
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        filter: EventFilter,
        buffer: Option<usize>,
    ) -> Subscription {
        let id = id.into();
        let capacity = buffer.unwrap_or(self.default_buffer).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        {
            let history = self.shared.history.lock().unwrap();
            for event in history.iter().filter(|e| filter.matches(e)) {
                if tx.try_send(event.clone()).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let entry = SubscriberEntry { filter, tx, dropped: Arc::clone(&dropped) };
        self.shared.subscribers.lock().unwrap().insert(id.clone(), entry);
        Subscription { id, receiver: rx, dropped }
    }

    /// Detaches a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: &str) {
        self.shared.subscribers.lock().unwrap().remove(id);
    }

    /// The number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().unwrap().len()
    }

    /// How many events were dropped at the publish queue.
    pub fn publish_drops(&self) -> u64 {
        self.shared.publish_drops.load(Ordering::Relaxed)
    }
}

async fn pump(shared: Arc<Shared>, mut queue_rx: mpsc::Receiver<Event>) {
    while let Some(event) = queue_rx.recv().await {
        if shared.history_cap > 0 {
            let mut history = shared.history.lock().unwrap();
            if history.len() == shared.history_cap {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let mut closed = Vec::new();
        {
            let subscribers = shared.subscribers.lock().unwrap();
            for (id, entry) in subscribers.iter() {
                if !entry.filter.matches(&event) {
                    continue;
                }
                match entry.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        entry.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id.clone()),
                }
            }
        }
        if !closed.is_empty() {
            let mut subscribers = shared.subscribers.lock().unwrap();
            for id in closed {
                subscribers.remove(&id);
                tracing::debug!(target: "bus", subscriber = %id, "removed closed subscriber");
            }
        }
    }
}

/// A live subscription handle.
#[derive(Debug)]
pub struct Subscription {
    /// The subscriber id used to attach.
    pub id: String,
    receiver: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Receives the next event; `None` once the bus shuts down.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// How many events were dropped for this subscriber because its channel
    /// was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quarry_primitives::BlockRecord;
    use std::sync::Arc;

    fn block_event(chain_id: u64, number: u64) -> Event {
        Event::block(chain_id, Arc::new(BlockRecord { number, ..Default::default() }))
    }

    async fn settle() {
        // Give the pump task a chance to drain the queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn delivers_matching_events_in_order() {
        let bus = EventBus::new(BusConfig::default());
        let mut sub = bus.subscribe("orderly", EventFilter::all(), None);

        for number in 0..5 {
            bus.publish(block_event(1, number)).await.unwrap();
        }
        settle().await;

        for number in 0..5 {
            let event = sub.try_recv().expect("event missing");
            assert_eq!(event.height(), Some(number));
        }
    }

    #[tokio::test]
    async fn chain_and_kind_filters_apply() {
        let bus = EventBus::new(BusConfig::default());
        let mut sub =
            bus.subscribe("picky", EventFilter::kinds(&[EventKind::Block]).for_chain(7), None);

        bus.publish(block_event(7, 1)).await.unwrap();
        bus.publish(block_event(8, 2)).await.unwrap();
        bus.publish(Event::progress(7, 1, 1)).await.unwrap();
        settle().await;

        assert_eq!(sub.try_recv().unwrap().height(), Some(1));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn full_subscriber_drops_without_stalling_others() {
        let bus = EventBus::new(BusConfig::default());
        let mut slow = bus.subscribe("slow", EventFilter::all(), Some(1));
        let mut fast = bus.subscribe("fast", EventFilter::all(), Some(16));

        for number in 0..4 {
            bus.publish(block_event(1, number)).await.unwrap();
        }
        settle().await;

        // The slow subscriber holds one event; the rest were dropped for it.
        assert_eq!(slow.dropped(), 3);
        assert_eq!(slow.try_recv().unwrap().height(), Some(0));
        for number in 0..4 {
            assert_eq!(fast.try_recv().unwrap().height(), Some(number));
        }
    }

    #[tokio::test]
    async fn late_subscriber_replays_history() {
        let bus = EventBus::new(BusConfig { history: 3, ..Default::default() });
        for number in 0..5 {
            bus.publish(block_event(1, number)).await.unwrap();
        }
        settle().await;

        let mut late = bus.subscribe("late", EventFilter::all(), None);
        for number in 2..5 {
            assert_eq!(late.try_recv().unwrap().height(), Some(number));
        }
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = EventBus::new(BusConfig::default());
        let _sub = bus.subscribe("gone", EventFilter::all(), None);
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe("gone");
        bus.unsubscribe("gone");
        assert_eq!(bus.subscriber_count(), 0);
    }
}
