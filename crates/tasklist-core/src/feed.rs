//! In-process change feed.
//!
//! The feed owns a set of named channels, each opened with a table/filter
//! spec and a handler. Every committed row change is delivered to the
//! handler of each matching channel, synchronously and in commit order.
//! The feed never buffers or replays: a channel only sees changes
//! published while it is registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use tasklist_proto::{ChannelSpec, RowChange};

use crate::error::FeedError;

/// Identifier of an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// Lifecycle status reported to a channel handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The channel is active; changes will be delivered from now on.
    Subscribed,
    /// The channel was removed.
    Closed,
    /// The transport dropped the channel.
    ChannelError(String),
}

/// Message delivered to a channel handler.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Status(ChannelStatus),
    Change(RowChange),
}

/// Callback attached to a channel.
pub type ChannelHandler = Arc<dyn Fn(FeedMessage) + Send + Sync>;

/// The change-feed collaborator contract.
pub trait ChangeFeed: Send + Sync {
    /// Open a named channel with `spec`, attach `handler` and activate it.
    ///
    /// The channel is active when this returns; the handler receives
    /// [`ChannelStatus::Subscribed`] before any change.
    fn open_channel(
        &self,
        name: &str,
        spec: ChannelSpec,
        handler: ChannelHandler,
    ) -> Result<ChannelId, FeedError>;

    /// Remove a channel. Returns false if it was not open.
    fn remove_channel(&self, id: ChannelId) -> bool;
}

impl<F: ChangeFeed + ?Sized> ChangeFeed for Arc<F> {
    fn open_channel(
        &self,
        name: &str,
        spec: ChannelSpec,
        handler: ChannelHandler,
    ) -> Result<ChannelId, FeedError> {
        (**self).open_channel(name, spec, handler)
    }

    fn remove_channel(&self, id: ChannelId) -> bool {
        (**self).remove_channel(id)
    }
}

struct ChannelEntry {
    name: String,
    spec: ChannelSpec,
    handler: ChannelHandler,
    opened_at: Instant,
    events_sent: u64,
}

/// Snapshot of an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub spec: ChannelSpec,
    pub events_sent: u64,
}

/// In-process implementation of [`ChangeFeed`].
pub struct FeedHub {
    channels: Mutex<HashMap<ChannelId, ChannelEntry>>,
    next_channel_id: AtomicU64,
    available: AtomicBool,
}

impl FeedHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_channel_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Deliver a committed change to every matching channel.
    ///
    /// Handlers run without the channel lock held, so they may open or
    /// remove channels. A channel removed while the change is being
    /// delivered does not receive it.
    pub fn publish(&self, change: &RowChange) {
        let mut targets: Vec<ChannelId> = {
            let channels = self.channels.lock();
            channels
                .iter()
                .filter(|(_, entry)| entry.spec.matches(change))
                .map(|(&id, _)| id)
                .collect()
        };

        if targets.is_empty() {
            return;
        }
        targets.sort();

        tracing::trace!(
            table = %change.table(),
            kind = ?change.kind(),
            channels = targets.len(),
            "publishing change"
        );

        for id in targets {
            let handler = {
                let mut channels = self.channels.lock();
                match channels.get_mut(&id) {
                    Some(entry) => {
                        entry.events_sent += 1;
                        entry.handler.clone()
                    }
                    None => continue,
                }
            };
            handler(FeedMessage::Change(change.clone()));
        }
    }

    /// Drop every channel as if the transport disconnected.
    ///
    /// Handlers receive [`ChannelStatus::ChannelError`]; nothing is reopened.
    pub fn disconnect_all(&self, reason: &str) {
        let dropped: Vec<(ChannelId, ChannelEntry)> = self.channels.lock().drain().collect();

        for (id, entry) in dropped {
            tracing::warn!(
                channel_id = %id,
                channel = %entry.name,
                reason,
                "channel dropped"
            );
            (entry.handler)(FeedMessage::Status(ChannelStatus::ChannelError(
                reason.to_string(),
            )));
        }
    }

    /// Toggle whether new channels can be opened.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Open channels ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let channels = self.channels.lock();
        let mut infos: Vec<ChannelInfo> = channels
            .iter()
            .map(|(&id, entry)| ChannelInfo {
                id,
                name: entry.name.clone(),
                spec: entry.spec,
                events_sent: entry.events_sent,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for FeedHub {
    fn open_channel(
        &self,
        name: &str,
        spec: ChannelSpec,
        handler: ChannelHandler,
    ) -> Result<ChannelId, FeedError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(FeedError::Unavailable);
        }

        let id = {
            let mut channels = self.channels.lock();
            if channels.values().any(|entry| entry.name == name) {
                return Err(FeedError::DuplicateChannel(name.to_string()));
            }

            let id = ChannelId(self.next_channel_id.fetch_add(1, Ordering::SeqCst));
            channels.insert(
                id,
                ChannelEntry {
                    name: name.to_string(),
                    spec,
                    handler: handler.clone(),
                    opened_at: Instant::now(),
                    events_sent: 0,
                },
            );
            id
        };

        tracing::debug!(
            channel_id = %id,
            channel = name,
            table = %spec.table,
            filter = ?spec.filter.map(|f| f.to_string()),
            "channel opened"
        );

        handler(FeedMessage::Status(ChannelStatus::Subscribed));
        Ok(id)
    }

    fn remove_channel(&self, id: ChannelId) -> bool {
        let entry = self.channels.lock().remove(&id);

        match entry {
            Some(entry) => {
                tracing::debug!(
                    channel_id = %id,
                    channel = %entry.name,
                    events_sent = entry.events_sent,
                    open_for_ms = entry.opened_at.elapsed().as_millis() as u64,
                    "channel removed"
                );
                (entry.handler)(FeedMessage::Status(ChannelStatus::Closed));
                true
            }
            None => false,
        }
    }
}
