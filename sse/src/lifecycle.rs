//! Start/stop coordination for one event publisher.
//!
//! States only move forward:
//! `Uninitialized -> Initialized -> Started -> Stopped -> Disposed`.

use crate::error::{Error, LifecycleErrorKind, Result};
use crate::path::PathTemplate;
use crate::Manager;
use log::*;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
    Disposed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Uninitialized => write!(f, "uninitialized"),
            State::Initialized => write!(f, "initialized"),
            State::Started => write!(f, "started"),
            State::Stopped => write!(f, "stopped"),
            State::Disposed => write!(f, "disposed"),
        }
    }
}

pub struct Controller {
    name: String,
    path: String,
    template: OnceLock<PathTemplate>,
    manager: Arc<Manager>,
    state: Mutex<State>,
}

impl Controller {
    pub fn new(name: impl Into<String>, path: impl Into<String>, manager: Arc<Manager>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            template: OnceLock::new(),
            manager,
            state: Mutex::new(State::Uninitialized),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn state(&self) -> State {
        *self.lock()
    }

    /// True only while subscriptions are being accepted.
    pub fn is_accepting(&self) -> bool {
        self.state() == State::Started
    }

    /// The validated subscription path; available once initialised.
    pub fn template(&self) -> Option<&PathTemplate> {
        self.template.get()
    }

    /// Validate the subscription path. Fails fatally on an invalid template.
    /// Calling it again after success returns the same template.
    pub fn initialise(&self) -> Result<&PathTemplate> {
        let mut state = self.lock();
        if *state != State::Uninitialized {
            return self
                .template
                .get()
                .ok_or_else(|| Error::lifecycle(LifecycleErrorKind::NotInitialized));
        }

        let template = PathTemplate::parse(&self.path)?;
        let template = self.template.get_or_init(|| template);
        *state = State::Initialized;
        debug!("Initialised SSE publisher {} on {}", self.name, template);
        Ok(template)
    }

    /// Begin accepting subscriptions. A no-op when already started.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        match *state {
            State::Started => Ok(()),
            State::Initialized => {
                *state = State::Started;
                info!(
                    "Listening for SSE requests for {} on {}",
                    self.name,
                    self.template().map(PathTemplate::as_str).unwrap_or(&self.path)
                );
                Ok(())
            }
            State::Uninitialized => Err(Error::lifecycle(LifecycleErrorKind::NotInitialized)),
            other => Err(Error::lifecycle(LifecycleErrorKind::InvalidTransition {
                from: other.to_string(),
                to: State::Started.to_string(),
            })),
        }
    }

    /// Close every live subscriber and stop accepting new ones. A no-op
    /// unless started.
    pub fn stop(&self) {
        let mut state = self.lock();
        if *state != State::Started {
            debug!("Stop requested for {} while {}", self.name, *state);
            return;
        }

        *state = State::Stopped;
        let closed = self.manager.close_all();
        info!("Stopped SSE listener {} ({closed} connection(s) closed)", self.name);
    }

    /// Stop if needed and flush the event log. Idempotent.
    pub async fn dispose(&self) -> Result<()> {
        self.stop();
        {
            let mut state = self.lock();
            if *state == State::Disposed {
                return Ok(());
            }
            *state = State::Disposed;
        }

        self.manager.log().flush().await?;
        info!("Disposed SSE publisher {}", self.name);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::error::{ConfigErrorKind, ErrorKind};
    use crate::event_log::EventLog;
    use crate::store::MemoryStore;

    fn controller(path: &str) -> Controller {
        let manager = Arc::new(Manager::new(EventLog::new(Arc::new(MemoryStore::new()))));
        Controller::new("test", path, manager)
    }

    #[test]
    fn test_initialise_then_start() {
        let controller = controller("events");

        assert_eq!(controller.initialise().unwrap().as_str(), "/events");
        assert_eq!(controller.state(), State::Initialized);
        assert!(!controller.is_accepting());

        controller.start().unwrap();
        assert!(controller.is_accepting());
    }

    #[test]
    fn test_initialise_rejects_invalid_path() {
        let controller = controller("/events/{id}/{id}");

        let err = controller.initialise().unwrap_err();

        assert!(matches!(
            err.error_kind,
            ErrorKind::Config(ConfigErrorKind::DuplicatePathParam(_))
        ));
        assert_eq!(controller.state(), State::Uninitialized);
    }

    #[test]
    fn test_start_before_initialise_fails() {
        let controller = controller("/events");

        assert!(controller.start().is_err());
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let controller = controller("/events");
        controller.initialise().unwrap();

        controller.start().unwrap();
        controller.start().unwrap();
        assert_eq!(controller.state(), State::Started);

        controller.stop();
        controller.stop();
        assert_eq!(controller.state(), State::Stopped);
    }

    #[test]
    fn test_start_after_stop_is_rejected() {
        let controller = controller("/events");
        controller.initialise().unwrap();
        controller.start().unwrap();
        controller.stop();

        let err = controller.start().unwrap_err();

        assert!(matches!(
            err.error_kind,
            ErrorKind::Lifecycle(LifecycleErrorKind::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_closes_live_subscribers() {
        let controller = controller("/events");
        controller.initialise().unwrap();
        controller.start().unwrap();
        let mut subscription = controller
            .manager()
            .subscribe(ConnectionId::new("c"), None)
            .await
            .unwrap();

        controller.stop();

        assert_eq!(subscription.recv().await, None);
        assert!(controller.manager().registry().is_empty());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let controller = controller("/events");
        controller.initialise().unwrap();
        controller.start().unwrap();

        controller.dispose().await.unwrap();
        controller.dispose().await.unwrap();

        assert_eq!(controller.state(), State::Disposed);
    }
}
