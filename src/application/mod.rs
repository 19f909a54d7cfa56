//! Application layer - Handlers orchestrating the domain and ports.
//!
//! Live delivery (registry + dispatcher) is driven by the activity bus;
//! catch-up is a query handler called from the HTTP surface.

pub mod handlers;

pub use handlers::{
    ActivityDispatcher, CatchupReconciler, DispatchReport, Subscriber, SubscriberRegistry,
};
