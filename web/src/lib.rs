//! HTTP surface of the event publisher: the subscription stream, the publish
//! entry point, health and the OpenAPI document.

use log::*;
use service::AppState;
use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;

mod controller;
pub mod error;
mod router;
mod sse;

pub use router::define_routes;

/// Serve the publisher until `shutdown` resolves.
///
/// When `shutdown` resolves the controller is stopped first, which ends every
/// open event stream so in-flight connections can drain.
pub async fn init_server<F>(
    app_state: AppState,
    shutdown: F,
) -> Result<(), Box<dyn StdError + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server_url = app_state.config.bind_address();
    let controller = app_state.controller.clone();
    let app = define_routes(app_state)?;

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        info!("Shutdown requested, closing event streams");
        controller.stop();
    })
    .await?;

    Ok(())
}
