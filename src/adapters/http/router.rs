//! Top-level router: live sockets, sync API and health.

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::adapters::websocket::{live_router, LiveState};
use crate::config::ServerConfig;

use super::health::health;
use super::middleware::{auth_middleware, AuthState};
use super::sync::{sync_routes, SyncAppState};

/// Builds the application router.
///
/// # Routes
///
/// - `GET /health`
/// - `GET /api/live/:scope_id` - WebSocket upgrade, token in the query string
/// - `POST /api/sync/catchup` - Bearer authenticated
///
/// The request timeout applies to the sync API only; live sockets are
/// long-lived by nature.
pub fn build_router(
    live: LiveState,
    sync: SyncAppState,
    auth: AuthState,
    server: &ServerConfig,
) -> Router {
    let sync_api = sync_routes()
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .with_state(sync);

    Router::new()
        .route("/health", get(health))
        .nest("/api/sync", sync_api)
        .nest("/api/live", live_router().with_state(live))
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}
