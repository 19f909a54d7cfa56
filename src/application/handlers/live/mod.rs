//! Live delivery handlers.
//!
//! - `SubscriberRegistry` - Connected subscribers grouped by channel
//! - `ActivityDispatcher` - Bus handler fanning activities out to subscribers

mod dispatch_activity;
mod registry;

pub use dispatch_activity::{ActivityDispatcher, DispatchReport};
pub use registry::{Subscriber, SubscriberRegistry};
