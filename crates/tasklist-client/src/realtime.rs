//! Change-feed multiplexer.
//!
//! Many local listeners can watch the same [`Topic`] while only one
//! upstream channel per topic is open. The channel is opened by the first
//! subscriber and removed when the last one leaves.
//!
//! Delivery is a synchronous fan-out on the feed's callback: listeners run
//! inline, in registration order, over a snapshot of the listener set
//! taken when the change arrives. A listener removed during fan-out still
//! receives the in-flight change; a listener added during fan-out does
//! not. Listeners may subscribe and unsubscribe from inside a callback.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use tasklist_core::{ChangeFeed, ChannelHandler, ChannelId, ChannelStatus, FeedError, FeedMessage};
use tasklist_proto::{ChangeEvent, ListId, RowChange, TodoItem, TodoList, Topic};

/// A local change listener.
pub type Listener = Arc<dyn Fn(&RowChange) + Send + Sync>;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct TopicEntry {
    channel: ChannelId,
    listeners: Vec<(ListenerId, Listener)>,
    events_delivered: u64,
}

struct Inner {
    feed: Arc<dyn ChangeFeed>,
    topics: Mutex<HashMap<Topic, TopicEntry>>,
    next_listener_id: AtomicU64,
}

impl Inner {
    fn on_message(&self, topic: Topic, message: FeedMessage) {
        match message {
            FeedMessage::Status(ChannelStatus::Subscribed) => {
                tracing::debug!(topic = %topic, "channel subscribed");
            }
            FeedMessage::Status(ChannelStatus::Closed) => {
                tracing::debug!(topic = %topic, "channel closed");
            }
            FeedMessage::Status(ChannelStatus::ChannelError(reason)) => {
                tracing::warn!(topic = %topic, reason = %reason, "channel error");
            }
            FeedMessage::Change(change) => self.fan_out(topic, &change),
        }
    }

    fn fan_out(&self, topic: Topic, change: &RowChange) {
        let snapshot: Vec<(ListenerId, Listener)> = {
            let mut topics = self.topics.lock();
            match topics.get_mut(&topic) {
                Some(entry) => {
                    entry.events_delivered += 1;
                    entry.listeners.clone()
                }
                None => return,
            }
        };

        tracing::trace!(
            topic = %topic,
            kind = ?change.kind(),
            listeners = snapshot.len(),
            "delivering change"
        );

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
                tracing::error!(topic = %topic, listener = %id, "listener panicked");
            }
        }
    }

    fn remove_listener(&self, topic: Topic, id: ListenerId) {
        // Dropped after the topic lock is released; a listener may own a
        // Subscription whose drop re-enters here.
        let _removed = self.detach_listener(topic, id);
    }

    fn detach_listener(&self, topic: Topic, id: ListenerId) -> Option<Listener> {
        let mut topics = self.topics.lock();
        let entry = topics.get_mut(&topic)?;
        let position = entry.listeners.iter().position(|(listener, _)| *listener == id)?;
        let (_, removed) = entry.listeners.remove(position);
        tracing::debug!(
            topic = %topic,
            listener = %id,
            remaining = entry.listeners.len(),
            "listener removed"
        );

        if entry.listeners.is_empty() {
            // Removed under the topic lock, like opening, so a concurrent
            // first subscriber waits for the old channel to be gone.
            if let Some(entry) = topics.remove(&topic) {
                self.feed.remove_channel(entry.channel);
                tracing::debug!(
                    topic = %topic,
                    channel_id = %entry.channel,
                    events_delivered = entry.events_delivered,
                    "channel removed"
                );
            }
        }
        Some(removed)
    }
}

/// Multiplexes local listeners onto one upstream channel per topic.
///
/// Cloning yields another handle to the same multiplexer.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<Inner>,
}

impl RealtimeManager {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            inner: Arc::new(Inner {
                feed,
                topics: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `listener` for every future change on `topic`.
    ///
    /// The first listener on a topic opens its upstream channel; the
    /// channel is active when this returns. If opening fails nothing is
    /// registered.
    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> Result<Subscription, FeedError>
    where
        F: Fn(&RowChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let listener: Listener = Arc::new(listener);

        // The channel is opened under the topic lock so two concurrent
        // first subscribers cannot both open one.
        let mut topics = self.inner.topics.lock();
        match topics.get_mut(&topic) {
            Some(entry) => {
                entry.listeners.push((id, listener));
                tracing::debug!(
                    topic = %topic,
                    listener = %id,
                    listeners = entry.listeners.len(),
                    "listener added"
                );
            }
            None => {
                let weak = Arc::downgrade(&self.inner);
                let handler: ChannelHandler = Arc::new(move |message| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_message(topic, message);
                    }
                });

                let channel = self
                    .inner
                    .feed
                    .open_channel(&topic.channel_name(), topic.channel_spec(), handler)
                    .map_err(|err| {
                        tracing::warn!(topic = %topic, error = %err, "failed to open channel");
                        err
                    })?;

                topics.insert(
                    topic,
                    TopicEntry {
                        channel,
                        listeners: vec![(id, listener)],
                        events_delivered: 0,
                    },
                );
                tracing::debug!(
                    topic = %topic,
                    channel_id = %channel,
                    listener = %id,
                    "channel opened"
                );
            }
        }

        Ok(Subscription {
            topic,
            id,
            inner: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        })
    }

    /// Listen to every change on the list table.
    pub fn subscribe_lists<F>(&self, listener: F) -> Result<Subscription, FeedError>
    where
        F: Fn(&ChangeEvent<TodoList>) + Send + Sync + 'static,
    {
        self.subscribe(Topic::AllLists, move |change: &RowChange| {
            if let Some(event) = change.as_lists() {
                listener(event);
            }
        })
    }

    /// Listen to every change on the item table.
    pub fn subscribe_all_items<F>(&self, listener: F) -> Result<Subscription, FeedError>
    where
        F: Fn(&ChangeEvent<TodoItem>) + Send + Sync + 'static,
    {
        self.subscribe(Topic::AllItems, move |change: &RowChange| {
            if let Some(event) = change.as_items() {
                listener(event);
            }
        })
    }

    /// Listen to changes on the items of one list.
    pub fn subscribe_list_items<F>(
        &self,
        list_id: ListId,
        listener: F,
    ) -> Result<Subscription, FeedError>
    where
        F: Fn(&ChangeEvent<TodoItem>) + Send + Sync + 'static,
    {
        self.subscribe(Topic::ItemsForList(list_id), move |change: &RowChange| {
            if let Some(event) = change.as_items() {
                listener(event);
            }
        })
    }

    /// Remove every channel and forget every listener.
    ///
    /// Outstanding [`Subscription`] handles become no-ops.
    pub fn cleanup(&self) {
        let drained: Vec<TopicEntry> = {
            let mut topics = self.inner.topics.lock();
            topics
                .drain()
                .map(|(topic, entry)| {
                    self.inner.feed.remove_channel(entry.channel);
                    tracing::debug!(
                        topic = %topic,
                        channel_id = %entry.channel,
                        listeners = entry.listeners.len(),
                        "channel removed during cleanup"
                    );
                    entry
                })
                .collect()
        };
        drop(drained);
    }

    /// Number of open upstream channels.
    pub fn channel_count(&self) -> usize {
        self.inner.topics.lock().len()
    }

    /// Number of listeners registered on `topic`.
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map_or(0, |entry| entry.listeners.len())
    }

    /// Whether an upstream channel is open for `topic`.
    pub fn is_open(&self, topic: &Topic) -> bool {
        self.inner.topics.lock().contains_key(topic)
    }
}

/// Handle to one registered listener.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    topic: Topic,
    id: ListenerId,
    inner: Weak<Inner>,
    active: AtomicBool,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove this listener. Calls after the first do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.remove_listener(self.topic, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}
