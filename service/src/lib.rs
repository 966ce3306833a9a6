use config::{Config, StoreKind};
use events::{PointerEventBuilder, PublishEvent};
use log::info;
use sse::event_log::EventLog;
use sse::lifecycle::Controller;
use sse::store::{EventStore, MemoryStore, SledStore};
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Open the configured event store and wrap it in an `EventLog` carrying the
/// configured retention and unknown-cursor policies.
pub fn init_event_log(config: &Config) -> sse::Result<EventLog> {
    info!(
        "Event log config: store={}, retention={:?}, unknown_cursor={}",
        config.store,
        config.retention(),
        config.unknown_cursor,
    );

    let store: Arc<dyn EventStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sled => {
            info!(
                "Opening sled store at {} (tree {})",
                config.store_path.display(),
                config.name
            );
            Arc::new(SledStore::open(&config.store_path, &config.name)?)
        }
    };

    Ok(EventLog::new(store)
        .with_retention(config.retention())
        .with_unknown_cursor(config.unknown_cursor))
}

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub controller: Arc<Controller>,
    pub publish_event: PublishEvent,
}

impl AppState {
    /// Wire the inbound pipeline to the controller's manager, with an event
    /// builder when either expression is configured.
    pub fn new(app_config: Config, controller: &Arc<Controller>) -> Self {
        let mut publish_event = PublishEvent::new(controller.manager().clone());
        if app_config.has_event_builder() {
            publish_event = publish_event.with_builder(Arc::new(PointerEventBuilder::new(
                app_config.event_expression.as_deref(),
                app_config.data_expression.as_deref(),
            )));
        }

        Self {
            config: app_config,
            controller: Arc::clone(controller),
            publish_event,
        }
    }

    pub fn controller_ref(&self) -> &Controller {
        self.controller.as_ref()
    }
}
