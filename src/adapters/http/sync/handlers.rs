//! HTTP handlers for sync endpoints.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::CatchupReconciler;
use crate::domain::foundation::{DomainError, ErrorCode};

use super::dto::{CatchupRequest, CatchupResponse, ErrorResponse};

#[derive(Clone)]
pub struct SyncAppState {
    pub reconciler: Arc<CatchupReconciler>,
}

/// POST /api/sync/catchup - Changes since the client's last known state
///
/// Scopes the caller does not belong to are dropped from the request before
/// reconciliation; system admins keep every scope they ask for.
pub async fn catchup(
    State(state): State<SyncAppState>,
    RequireAuth(session): RequireAuth,
    Json(mut request): Json<CatchupRequest>,
) -> Result<Json<CatchupResponse>, SyncApiError> {
    let requested = request.scope_ids.len();
    request
        .scope_ids
        .retain(|scope_id| session.permissions.can_access_scope(scope_id));

    if request.scope_ids.len() < requested {
        tracing::debug!(
            user_id = %session.user_id,
            dropped = requested - request.scope_ids.len(),
            "Catch-up request named scopes outside the user's memberships"
        );
    }

    let response = state.reconciler.reconcile(request).await?;
    Ok(Json(response))
}

/// API error wrapper that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct SyncApiError(DomainError);

impl From<DomainError> for SyncApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Catch-up failed");
        }

        let body = ErrorResponse::new(self.0.code.to_string(), "Catch-up failed");
        (status, Json(body)).into_response()
    }
}
