use crate::controller::{event_controller, health_check_controller};
use crate::sse::handler::{self as sse_handler, LAST_EVENT_ID};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use log::*;
use service::AppState;
use sse::error::{ConfigErrorKind, Error, Result};
use sse::path::PathTemplate;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;

const HEALTH_PATH: &str = "/health";
const OPENAPI_PATH: &str = "/api-docs/openapi.json";

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
// The subscribe and publish paths are configurable; `openapi` rewrites them.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Event Publisher API"
        ),
        paths(
            event_controller::publish,
            health_check_controller::health_check,
            sse_handler::subscribe,
        ),
        components(
            schemas(
                health_check_controller::HealthStatus,
            )
        ),
        tags(
            (name = "event_publisher", description = "Server-Sent Events publisher with durable replay")
        )
    )]
struct ApiDoc;

/// The OpenAPI document with the documented default paths replaced by the
/// configured ones.
fn openapi(subscribe_path: &str, publish_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    for (documented, configured) in [("/events", subscribe_path), ("/publish", publish_path)] {
        if documented != configured {
            if let Some(item) = doc.paths.paths.remove(documented) {
                doc.paths.paths.insert(configured.to_string(), item);
            }
        }
    }
    doc
}

/// Build every route of the publisher. Fails when the configured subscription
/// or publish path collides with another route.
pub fn define_routes(app_state: AppState) -> Result<Router> {
    let subscribe = match app_state.controller_ref().template() {
        Some(template) => template.clone(),
        None => PathTemplate::parse(&app_state.config.subscribe_path)?,
    };
    let publish = PathTemplate::parse(&app_state.config.publish_path)?;

    let subscribe_route = subscribe.to_route();
    let publish_route = publish.to_route();
    ensure_distinct(&[
        subscribe_route.as_str(),
        publish_route.as_str(),
        HEALTH_PATH,
        OPENAPI_PATH,
    ])?;

    let doc = openapi(subscribe.as_str(), publish.as_str());
    let cors = cors_layer(&app_state.config.allowed_origins);

    Ok(Router::new()
        .merge(subscribe_routes(app_state.clone(), &subscribe_route))
        .merge(publish_routes(app_state.clone(), &publish_route))
        .merge(health_routes(app_state))
        .route(OPENAPI_PATH, get(|| async move { Json(doc) }))
        .layer(cors))
}

fn subscribe_routes(app_state: AppState, route: &str) -> Router {
    Router::new()
        .route(route, get(sse_handler::subscribe))
        .with_state(app_state)
}

fn publish_routes(app_state: AppState, route: &str) -> Router {
    Router::new()
        .route(route, post(event_controller::publish))
        .with_state(app_state)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_check_controller::health_check))
        .with_state(app_state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, LAST_EVENT_ID.clone()])
}

/// Routes that only differ in capture names match the same requests.
fn route_shape(route: &str) -> String {
    route
        .split('/')
        .map(|segment| match segment.chars().next() {
            Some(':') => ":",
            Some('*') => "*",
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn ensure_distinct(routes: &[&str]) -> Result<()> {
    for (i, route) in routes.iter().enumerate() {
        let shape = route_shape(route);
        if routes[..i].iter().any(|other| route_shape(other) == shape) {
            return Err(Error::config(ConfigErrorKind::DuplicateRoute(
                route.to_string(),
            )));
        }
    }
    Ok(())
}
