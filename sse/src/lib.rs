//! Server-Sent Events (SSE) broadcast engine.
//!
//! This crate records published events in a durable, ordered log, streams them
//! live to every connected subscriber, and lets a reconnecting subscriber
//! resume from the last event it saw.
//!
//! # Architecture
//!
//! - **Event log**: append-only, ordered by a dense id assigned at append time.
//!   Backed by an `EventStore` (in memory or sled) with an explicit retention
//!   policy.
//! - **Connection registry**: one DashMap entry per connection identity
//!   (remote `host:port`). A reconnect replaces the entry; a failed write
//!   evicts it.
//! - **Manager**: the publish path (append, format once, broadcast) and the
//!   subscribe path (register, replay history, then live).
//! - **Lifecycle controller**: validates the subscription path and gates
//!   whether subscriptions are accepted.
//!
//! # Message Flow
//!
//! 1. A message arrives from the pipeline and is handed to `Manager::publish`
//! 2. The log assigns the next id and persists the event
//! 3. The event is formatted once and queued on every subscriber's channel
//! 4. Each connection's stream writes its queue to the socket independently,
//!    so a slow client never holds up a publish
//!
//! Independently, a subscription request registers a channel, receives the
//! optional retry advisory, then the full log (or the suffix after
//! `Last-Event-ID`), then live events.
//!
//! # Ordering
//!
//! Publishing and subscription replay are sequenced by one lock, so a
//! subscriber sees every event exactly once and in id order, even across the
//! window where it connects while events are being published.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and type-safe ConnectionId
//! - `event_log`: EventLog with retention and unknown-cursor policies
//! - `lifecycle`: Controller state machine
//! - `manager`: publish and subscribe
//! - `message`: SSE wire format and parser
//! - `path`: subscription path template validation
//! - `store`: EventStore trait, MemoryStore and SledStore

pub mod connection;
pub mod error;
pub mod event_log;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod path;
pub mod store;

pub use error::{Error, Result};
pub use manager::{Manager, Subscription};
