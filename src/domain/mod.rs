//! Domain layer containing distribution logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, auth snapshots, errors)
//! - `activity` - Event catalog, activity events, channels, notifications
//! - `sync` - Catch-up protocol types and per-scope counters

pub mod activity;
pub mod foundation;
pub mod sync;
