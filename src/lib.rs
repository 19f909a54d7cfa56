//! Activity Relay - Tenant-scoped activity distribution
//!
//! Turns change-data-capture messages into live, permission-filtered
//! notifications for connected clients, and lets reconnecting clients catch
//! up from per-scope counters instead of replaying the log.
//!
//! ```text
//! BroadcastTransport ─▶ BroadcastRelay ─▶ ActivityBus ─▶ ActivityDispatcher ─▶ subscribers
//!                                            (catalog)      (registry, permissions, signer)
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
