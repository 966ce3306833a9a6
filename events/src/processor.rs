use crate::{EventBuilder, EventSink, InboundMessage};
use log::*;
use std::sync::Arc;

/// Message processor that publishes each inbound message to an `EventSink`.
///
/// With an `EventBuilder` the event type and data are evaluated from the
/// message; without one the whole message becomes the data of an untyped
/// event. Publishing is fire-and-forget from the pipeline's point of view:
/// sink failures are logged and never raised to the caller.
#[derive(Clone)]
pub struct PublishEvent {
    sink: Arc<dyn EventSink>,
    builder: Option<Arc<dyn EventBuilder>>,
}

impl PublishEvent {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            builder: None,
        }
    }

    /// Attach an event builder.
    pub fn with_builder(mut self, builder: Arc<dyn EventBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Process one inbound message.
    pub async fn process(&self, message: &InboundMessage) {
        let (event_type, data) = match &self.builder {
            Some(builder) => (
                builder.evaluate_event(message),
                builder.evaluate_data(message),
            ),
            None => (None, message.as_str().to_string()),
        };

        match self.sink.publish(event_type, data).await {
            Ok(event) => trace!("Published event {}", event.id),
            Err(e) => error!("Failed to publish event: {e}"),
        }
    }
}
