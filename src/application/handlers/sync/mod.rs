//! Sync handlers.
//!
//! Query handlers for clients recovering after a disconnect.

mod reconcile_catchup;

pub use reconcile_catchup::CatchupReconciler;
