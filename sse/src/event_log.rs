//! Ordered, append-only log of published events.

use crate::error::Result;
use crate::store::{Entry, EventStore};
use events::{Event, EventId};
use log::*;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// How much history the log keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep every event for the lifetime of the store.
    #[default]
    Unbounded,
    /// Keep only the newest `n` events; older ones are evicted after each append.
    MaxEvents(NonZeroUsize),
}

/// What to replay when a client resumes from an id the log does not hold,
/// either because it was never issued, was evicted, or is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCursorPolicy {
    /// Treat the cursor as "no history before this point" and replay nothing.
    #[default]
    ReplayNothing,
    /// Assume the client lost its position and replay the whole log.
    ReplayAll,
}

impl fmt::Display for UnknownCursorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnknownCursorPolicy::ReplayNothing => write!(f, "replay-nothing"),
            UnknownCursorPolicy::ReplayAll => write!(f, "replay-all"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCursorPolicyParseError;

impl FromStr for UnknownCursorPolicy {
    type Err = UnknownCursorPolicyParseError;
    fn from_str(policy: &str) -> std::result::Result<Self, Self::Err> {
        match policy.to_lowercase().as_str() {
            "replay-nothing" => Ok(UnknownCursorPolicy::ReplayNothing),
            "replay-all" => Ok(UnknownCursorPolicy::ReplayAll),
            _ => Err(UnknownCursorPolicyParseError),
        }
    }
}

pub struct EventLog {
    store: Arc<dyn EventStore>,
    retention: RetentionPolicy,
    unknown_cursor: UnknownCursorPolicy,
    // Serialises id assignment plus retention across concurrent appenders.
    append_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            retention: RetentionPolicy::default(),
            unknown_cursor: UnknownCursorPolicy::default(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_unknown_cursor(mut self, policy: UnknownCursorPolicy) -> Self {
        self.unknown_cursor = policy;
        self
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn unknown_cursor(&self) -> UnknownCursorPolicy {
        self.unknown_cursor
    }

    /// Persist a new event under the next id and return it.
    ///
    /// On failure nothing is recorded and no id is consumed.
    pub async fn append(&self, event_type: Option<String>, data: String) -> Result<Event> {
        let _guard = self.append_lock.lock().await;

        let entry = Entry { event_type, data };
        let id = self.store.append(&entry).await?;
        trace!("Appended event {id} to log");

        if let RetentionPolicy::MaxEvents(max) = self.retention {
            // The event is already durable; a failed eviction only delays trimming.
            if let Err(e) = self.evict_before(id, max).await {
                warn!("Failed to apply retention after event {id}: {e}");
            }
        }

        Ok(Event::new(id, entry.event_type, entry.data))
    }

    async fn evict_before(&self, newest: EventId, max: NonZeroUsize) -> Result<()> {
        let keep_from = newest.value().saturating_sub(max.get() as u64 - 1);
        for id in self.store.keys().await? {
            if id.value() >= keep_from {
                break;
            }
            self.store.remove(id).await?;
            trace!("Evicted event {id} from log");
        }
        Ok(())
    }

    /// Every retained event in ascending id order, as of the call.
    pub async fn all_ordered(&self) -> Result<Vec<Event>> {
        let keys = self.store.keys().await?;
        self.load(keys).await
    }

    /// Every retained event strictly after `last_seen`, in ascending id order.
    ///
    /// A cursor the log does not hold is resolved by the configured
    /// `UnknownCursorPolicy`.
    pub async fn suffix_after(&self, last_seen: &str) -> Result<Vec<Event>> {
        let keys = self.store.keys().await?;

        let cursor = match last_seen.parse::<EventId>() {
            Ok(id) if keys.binary_search(&id).is_ok() => Some(id),
            _ => None,
        };

        match (cursor, self.unknown_cursor) {
            (Some(id), _) => {
                let after: Vec<EventId> = keys.into_iter().filter(|k| *k > id).collect();
                self.load(after).await
            }
            (None, UnknownCursorPolicy::ReplayNothing) => {
                debug!("Last-Event-ID {last_seen:?} not in log, replaying nothing");
                Ok(Vec::new())
            }
            (None, UnknownCursorPolicy::ReplayAll) => {
                debug!("Last-Event-ID {last_seen:?} not in log, replaying everything");
                self.load(keys).await
            }
        }
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    async fn load(&self, keys: Vec<EventId>) -> Result<Vec<Event>> {
        let mut events = Vec::with_capacity(keys.len());
        for id in keys {
            // Entries evicted between listing and loading are skipped.
            if let Some(entry) = self.store.get(id).await? {
                events.push(Event::new(id, entry.event_type, entry.data));
            }
        }
        Ok(events)
    }
}
