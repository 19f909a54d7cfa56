//! WebSocket adapter for live activity delivery.
//!
//! ```text
//!   ActivityDispatcher ──send──▶ ChannelSink (bounded queue, never waits)
//!                                    │
//!                                    ▼
//!                              socket task ──▶ client
//! ```
//!
//! - [`handler`] - Upgrade handler, admission and connection lifecycle
//! - [`messages`] - Frame protocol
//! - [`sink`] - `SubscriberSink` backed by a bounded queue

pub mod handler;
pub mod messages;
pub mod sink;

pub use handler::{live_handler, live_router, LiveQuery, LiveState};
pub use messages::{ClientMessage, ConnectedMessage, ErrorMessage, PongMessage, ServerMessage};
pub use sink::ChannelSink;
