//! HTTP adapter for catch-up reconciliation.
//!
//! - `POST /api/sync/catchup` - Counters and deletions since the client's cursor

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{catchup, SyncApiError, SyncAppState};
pub use routes::sync_routes;
