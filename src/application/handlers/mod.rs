//! Application handlers.
//!
//! - `live` - Subscriber registry and the dispatcher feeding it
//! - `sync` - Catch-up reconciliation for reconnecting clients

pub mod live;
pub mod sync;

pub use live::{ActivityDispatcher, DispatchReport, Subscriber, SubscriberRegistry};
pub use sync::CatchupReconciler;
