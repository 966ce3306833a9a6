use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use events::InboundMessage;
use log::*;
use service::AppState;

/// POST publish the request body as a new event
#[utoipa::path(
    post,
    path = "/publish",
    request_body(content = String, description = "Inbound message; with event/data expressions configured it is read as JSON", content_type = "text/plain"),
    responses(
        (status = 202, description = "Message accepted for publishing"),
    )
)]
pub async fn publish(State(app_state): State<AppState>, body: String) -> impl IntoResponse {
    trace!("Inbound message of {} byte(s)", body.len());

    app_state
        .publish_event
        .process(&InboundMessage::new(body))
        .await;

    StatusCode::ACCEPTED
}
