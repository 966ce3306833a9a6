//! Event system infrastructure for the event publisher.
//!
//! This crate provides the types shared between the message pipeline that
//! produces events and the SSE infrastructure that records and streams them.
//!
//! # Architecture
//!
//! - **Event**: Immutable record of one published event (id, optional type, data)
//! - **EventSink**: Trait implemented by anything able to accept a publish
//! - **EventBuilder**: Derives the event type and data from an inbound message
//! - **PublishEvent**: Message processor that feeds inbound messages to a sink
//!
//! This crate has no dependencies on internal crates (sse, web, etc.),
//! avoiding circular dependencies. The SSE manager implements `EventSink`.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

pub mod builder;
pub mod processor;

pub use builder::{EventBuilder, InboundMessage, PointerEventBuilder};
pub use processor::PublishEvent;

/// Boxed error returned across the sink boundary so this crate stays
/// independent of the sink's own error type.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Identifier assigned to an event when it is appended to the event log.
/// Ids are dense and monotonically increasing, starting at 0. On the wire they
/// are rendered in decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(EventId)
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A published event. Created once by the event log at append time and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    /// Optional SSE event name. Absent events are delivered as the default
    /// `message` type by clients.
    pub event_type: Option<String>,
    /// Payload; may contain embedded line breaks.
    pub data: String,
}

impl Event {
    pub fn new(id: EventId, event_type: Option<String>, data: impl Into<String>) -> Self {
        Self {
            id,
            event_type,
            data: data.into(),
        }
    }
}

/// Trait for anything that accepts published events.
///
/// Implementations record the event, assign its id and deliver it to live
/// subscribers. Errors are returned so callers may retry or alert.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event_type: Option<String>, data: String) -> Result<Event, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_display_is_decimal() {
        assert_eq!(EventId::new(0).to_string(), "0");
        assert_eq!(EventId::new(42).to_string(), "42");
    }

    #[test]
    fn test_event_id_parses_decimal_with_surrounding_whitespace() {
        assert_eq!(" 17 ".parse::<EventId>().unwrap(), EventId::new(17));
    }

    #[test]
    fn test_event_id_rejects_non_numeric() {
        assert!("abc".parse::<EventId>().is_err());
        assert!("-1".parse::<EventId>().is_err());
        assert!("".parse::<EventId>().is_err());
    }
}
