use log::*;
use service::{config::Config, init_event_log, logging::Logger, AppState};
use sse::lifecycle::Controller;
use sse::Manager;
use std::error::Error as StdError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError + Send + Sync>> {
    let config = Config::new();
    Logger::init_logger(&config)?;

    info!("Starting up event publisher {}...", config.name);

    let event_log = init_event_log(&config)?;
    let manager = Arc::new(Manager::new(event_log).with_retry(config.retry));
    let controller = Arc::new(Controller::new(
        config.name.clone(),
        config.subscribe_path.clone(),
        manager,
    ));
    controller.initialise()?;
    controller.start()?;

    let app_state = AppState::new(config, &controller);
    let served = web::init_server(app_state, shutdown_signal()).await;

    // Flush the log even when the server failed.
    controller.dispose().await?;
    served?;

    info!("Event publisher {} shut down", controller.name());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            },
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {e}");
                let _ = ctrl_c.await;
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received SIGINT");
    }
}
