use crate::message;
use axum::body::Bytes;
use dashmap::DashMap;
use log::*;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Pre-formatted SSE text queued for one connection.
pub type Frame = Bytes;

/// Identity of a subscribing connection, derived from its remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ConnectionId {
    fn from(addr: SocketAddr) -> Self {
        Self(format!("{}:{}", addr.ip(), addr.port()))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to one registration. A reconnect from the same endpoint replaces the
/// entry under a new token, so cleanup for the old connection cannot remove
/// the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub connection_id: ConnectionId,
    token: Uuid,
}

#[derive(Debug)]
struct Subscriber {
    token: Uuid,
    sender: UnboundedSender<Frame>,
}

/// The set of live subscriber channels, keyed by connection identity.
///
/// Writes are queued onto each connection's unbounded channel, so a broadcast
/// never waits on network backpressure. A failed write means the connection
/// is gone and the subscriber is evicted on the spot.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Subscriber>,
    closed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Insert or replace the entry for `connection_id`. When `retry` is set the
    /// retry advisory is queued immediately.
    ///
    /// Returns `None` if the registry has been closed.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        sender: UnboundedSender<Frame>,
        retry: Option<u64>,
    ) -> Option<Registration> {
        if let Some(millis) = retry {
            if sender.send(Frame::from(message::retry(millis))).is_err() {
                debug!("Connection {connection_id} closed before registration");
                return None;
            }
        }

        let token = Uuid::new_v4();
        let replaced = self
            .connections
            .insert(connection_id.clone(), Subscriber { token, sender });
        if replaced.is_some() {
            info!("Replaced SSE subscriber for connection {connection_id}");
        } else {
            debug!("Registered SSE subscriber for connection {connection_id}");
        }

        let registration = Registration {
            connection_id,
            token,
        };

        // Checked after the insert so a concurrent close_all cannot miss it.
        if self.closed.load(Ordering::SeqCst) {
            self.unregister(&registration);
            return None;
        }

        Some(registration)
    }

    /// Remove the registration, unless it has since been replaced.
    pub fn unregister(&self, registration: &Registration) {
        let removed = self
            .connections
            .remove_if(&registration.connection_id, |_, s| {
                s.token == registration.token
            });
        if removed.is_some() {
            debug!(
                "Unregistered SSE subscriber for connection {}",
                registration.connection_id
            );
        }
    }

    /// Queue `frame` for one registration. Returns false if it is gone.
    pub fn send_to(&self, registration: &Registration, frame: Frame) -> bool {
        match self.connections.get(&registration.connection_id) {
            Some(s) if s.token == registration.token => s.sender.send(frame).is_ok(),
            _ => false,
        }
    }

    /// Queue `frame` for every subscriber. Subscribers whose connection has
    /// gone away are evicted; the others are unaffected.
    pub fn broadcast(&self, frame: &Frame) {
        let mut failed = Vec::new();
        for entry in self.connections.iter() {
            if let Err(e) = entry.value().sender.send(frame.clone()) {
                warn!(
                    "Failed to send broadcast to connection {}: {}. Evicting subscriber.",
                    entry.key(),
                    e
                );
                failed.push(Registration {
                    connection_id: entry.key().clone(),
                    token: entry.value().token,
                });
            }
        }

        // Removal happens outside the iteration to avoid holding shard locks.
        for registration in failed {
            self.unregister(&registration);
        }
    }

    /// Close every subscriber and refuse further registrations. Returns the
    /// number of subscribers that were still connected.
    pub fn close_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| e.key().clone()).collect();
        let mut closed = 0;
        for id in ids {
            if let Some((id, subscriber)) = self.connections.remove(&id) {
                // Dropping the sender ends the connection's stream.
                if subscriber.sender.is_closed() {
                    debug!("SSE subscriber {id} was already disconnected");
                } else {
                    debug!("Closed SSE subscriber {id}");
                    closed += 1;
                }
            }
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
