//! Axum router configuration for sync endpoints.

use axum::{routing::post, Router};

use super::handlers::{catchup, SyncAppState};

/// # Routes
///
/// - `POST /catchup` - Reconcile a reconnecting client (requires authentication)
pub fn sync_routes() -> Router<SyncAppState> {
    Router::new().route("/catchup", post(catchup))
}
