use crate::error::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use service::AppState;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    status: String,
    /// Lifecycle state of the publisher.
    state: String,
    subscribers: usize,
    /// Events currently retained in the log.
    events: usize,
}

/// GET the publisher's lifecycle state, subscriber count and retained event count
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API router is up and responding to requests", body = HealthStatus),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> Result<impl IntoResponse> {
    let controller = app_state.controller_ref();
    let manager = controller.manager();
    let events = manager.log().len().await?;

    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        state: controller.state().to_string(),
        subscribers: manager.registry().len(),
        events,
    }))
}
