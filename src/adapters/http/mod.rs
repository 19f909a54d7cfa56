//! HTTP adapters - REST surface and router composition.
//!
//! - `middleware` - Bearer authentication
//! - `sync` - Catch-up endpoint
//! - `health` - Liveness probe

pub mod health;
pub mod middleware;
pub mod router;
pub mod sync;

pub use router::build_router;
pub use sync::SyncAppState;
