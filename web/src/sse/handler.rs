use crate::error::Result;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use log::*;
use service::AppState;
use sse::connection::ConnectionId;
use sse::error::{Error as SseError, LifecycleErrorKind};
use std::net::SocketAddr;

pub(crate) static LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// SSE handler that establishes a long-lived connection for published events.
/// One connection per remote endpoint; a reconnect from the same endpoint
/// replaces the previous one.
///
/// The client first receives the retry advisory (when configured), then the
/// recorded history, or only the events after `Last-Event-ID` when that header
/// is present, then every live event until it disconnects.
#[utoipa::path(
    get,
    path = "/events",
    params(
        ("Last-Event-ID" = Option<String>, Header, description = "Id of the last event the client received"),
    ),
    responses(
        (status = 200, description = "Stream of server-sent events", content_type = "text/event-stream", body = String),
        (status = 503, description = "The publisher is not accepting subscriptions"),
    )
)]
pub(crate) async fn subscribe(
    State(app_state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response> {
    let controller = app_state.controller_ref();
    if !controller.is_accepting() {
        debug!("Rejecting SSE request from {remote} while {}", controller.state());
        return Err(SseError::lifecycle(LifecycleErrorKind::NotStarted).into());
    }

    // Any header present is a cursor, even one that is not visible ASCII; an
    // id that is not in the log falls to the unknown-cursor policy.
    let last_event_id = headers
        .get(&LAST_EVENT_ID)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    debug!("Establishing SSE connection for {remote} (last event id: {last_event_id:?})");

    let subscription = controller
        .manager()
        .subscribe(ConnectionId::from(remote), last_event_id.as_deref())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(subscription.into_stream()),
    )
        .into_response())
}
