//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the distribution core to external systems:
//! - `events` - Activity bus and broadcast transports (in-memory, Redis)
//! - `postgres` - Counter and activity log reads
//! - `auth` - Session validation (JWT, mock)
//! - `security` - Cache token signing and visibility rules
//! - `websocket` - Live subscriber connections
//! - `http` - Catch-up API, health and router composition

pub mod auth;
pub mod events;
pub mod http;
pub mod postgres;
pub mod security;
pub mod websocket;

pub use auth::{JwtSessionValidator, MockSessionValidator};
pub use events::{
    ActivityBus, BroadcastRelay, EmitOutcome, HandlerId, InMemoryBroadcastTransport,
    RedisBroadcastTransport,
};
pub use postgres::PostgresActivityLogReader;
pub use security::{HmacTokenSigner, MembershipPermissionChecker};
