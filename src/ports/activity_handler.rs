//! ActivityHandler port - Interface for consumers of bus events.
//!
//! Handlers register with the activity bus for one event type, for every
//! type, or for a single delivery, without knowing where events come from.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::activity::ActivityEvent;
use crate::domain::foundation::DomainError;

/// Handler for validated activity events.
///
/// Implementations should be:
/// - **Quick** - the bus awaits handlers in turn
/// - **Isolated** - an error is reported back to the emitter, never retried
///
/// # Example
///
/// ```ignore
/// struct AuditTrail { /* ... */ }
///
/// #[async_trait]
/// impl ActivityHandler for AuditTrail {
///     async fn handle(&self, event: Arc<ActivityEvent>) -> Result<(), DomainError> {
///         tracing::info!(activity_id = %event.id, "recorded");
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "AuditTrail"
///     }
/// }
/// ```
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Process one event. The event is shared between all handlers.
    async fn handle(&self, event: Arc<ActivityEvent>) -> Result<(), DomainError>;

    /// Handler name for logging and error messages.
    fn name(&self) -> &'static str;
}
