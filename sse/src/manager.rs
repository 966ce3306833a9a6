use crate::connection::{ConnectionId, ConnectionRegistry, Frame, Registration};
use crate::error::{Error, LifecycleErrorKind, Result};
use crate::event_log::EventLog;
use crate::message;
use async_stream::stream;
use async_trait::async_trait;
use events::{BoxError, Event, EventSink};
use futures::Stream;
use log::*;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;

/// Write path and subscription path over one event log and one registry.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    log: Arc<EventLog>,
    retry: Option<u64>,
    // Orders append+broadcast against other publishes and against
    // subscription replay, so every subscriber sees ids in ascending order
    // with no gap or duplicate between history and live events.
    sequencer: Mutex<()>,
}

impl Manager {
    pub fn new(log: EventLog) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            log: Arc::new(log),
            retry: None,
            sequencer: Mutex::new(()),
        }
    }

    /// Advertise `retry` milliseconds to every new subscriber. `None` sends no
    /// advisory.
    pub fn with_retry(mut self, retry: Option<u64>) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Record a new event and push it to every connected subscriber.
    ///
    /// The event is queued for every current subscriber before this returns.
    /// Only a store failure is reported; delivery failures evict the affected
    /// subscriber and are otherwise ignored.
    pub async fn publish(&self, event_type: Option<String>, data: String) -> Result<Event> {
        let _sequenced = self.sequencer.lock().await;

        let event = self.log.append(event_type, data).await?;
        let frame = Frame::from(message::format(&event));
        self.registry.broadcast(&frame);

        debug!(
            "Published event {} to {} subscriber(s)",
            event.id,
            self.registry.len()
        );
        Ok(event)
    }

    /// Register a subscriber and queue its history: everything after
    /// `last_event_id` when given, otherwise the whole log.
    ///
    /// A history read failure is logged and leaves the subscriber registered
    /// for live events.
    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        last_event_id: Option<&str>,
    ) -> Result<Subscription> {
        let _sequenced = self.sequencer.lock().await;

        let (sender, receiver) = unbounded_channel();
        let registration = self
            .registry
            .register(connection_id, sender, self.retry)
            .ok_or_else(|| Error::lifecycle(LifecycleErrorKind::NotStarted))?;
        info!(
            "Registered SSE connection {}",
            registration.connection_id
        );

        let history = match last_event_id {
            Some(last_event_id) => {
                debug!("Resuming {} after {last_event_id:?}", registration.connection_id);
                self.log.suffix_after(last_event_id).await
            }
            None => self.log.all_ordered().await,
        };

        match history {
            Ok(events) => {
                for event in &events {
                    if !self
                        .registry
                        .send_to(&registration, Frame::from(message::format(event)))
                    {
                        warn!(
                            "Connection {} went away during replay",
                            registration.connection_id
                        );
                        break;
                    }
                }
                trace!(
                    "Replayed {} event(s) to {}",
                    events.len(),
                    registration.connection_id
                );
            }
            Err(e) => error!(
                "Failed to replay history to {}: {e}",
                registration.connection_id
            ),
        }

        Ok(Subscription {
            receiver,
            guard: RegistrationGuard {
                registry: Arc::clone(&self.registry),
                registration,
            },
        })
    }

    /// Close every subscriber. Later publishes still reach the log but have
    /// nobody to deliver to.
    pub fn close_all(&self) -> usize {
        let closed = self.registry.close_all();
        info!("Closed {closed} SSE connection(s)");
        closed
    }
}

#[async_trait]
impl EventSink for Manager {
    async fn publish(
        &self,
        event_type: Option<String>,
        data: String,
    ) -> std::result::Result<Event, BoxError> {
        Manager::publish(self, event_type, data)
            .await
            .map_err(|e| Box::new(e) as BoxError)
    }
}

// Unregisters on drop, which covers both a finished stream and a client that
// disconnects while the transport still holds the stream.
struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    registration: Registration,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.registration);
    }
}

/// The receiving half of one subscriber. Frames arrive in id order: retry
/// advisory, then history, then live events.
pub struct Subscription {
    receiver: UnboundedReceiver<Frame>,
    guard: RegistrationGuard,
}

impl Subscription {
    pub fn registration(&self) -> &Registration {
        &self.guard.registration
    }

    /// Next queued frame; `None` once the subscriber has been closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Convert into a body stream for the transport.
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = std::result::Result<Frame, Infallible>> + Send + 'static {
        let Subscription {
            mut receiver,
            guard,
        } = self;

        stream! {
            while let Some(frame) = receiver.recv().await {
                yield Ok(frame);
            }

            // Subscriber closed, the guard unregisters on drop
            debug!("SSE stream closed for {}", guard.registration.connection_id);
        }
    }
}
