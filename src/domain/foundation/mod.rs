//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, auth snapshots, and error types
//! that form the vocabulary of the activity relay.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{
    AuthError, AuthenticatedSession, MembershipRole, PermissionSnapshot, SessionCredential,
    SystemRole,
};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ActivityId, EntityId, ScopeId, SubscriberId, UserId};
pub use timestamp::Timestamp;
