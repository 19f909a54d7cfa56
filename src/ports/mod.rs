//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the distribution core and the outside world. Adapters implement these ports.
//!
//! ## Distribution Ports
//!
//! - `ActivityHandler` - Consumer of validated bus events
//! - `SubscriberSink` - Output stream of one live subscriber
//! - `BroadcastTransport` - Cross-instance delivery of change messages
//!
//! ## Security Ports
//!
//! - `PermissionChecker` - Per-subscriber visibility predicate
//! - `TokenSigner` - Binds cache tokens to a session
//! - `SessionValidator` - Bearer token to session resolution
//!
//! ## Storage Ports
//!
//! - `ContextCounterReader` - Per-scope `seq`/`mSeq` counters
//! - `ActivityLogReader` - Bounded reads over the append-only log

mod activity_handler;
mod activity_log;
mod broadcast_transport;
mod permission_checker;
mod session_validator;
mod subscriber_sink;
mod token_signer;

pub use activity_handler::ActivityHandler;
pub use activity_log::{ActivityLogReader, ContextCounterReader};
pub use broadcast_transport::{BroadcastTransport, TransportError};
pub use permission_checker::PermissionChecker;
pub use session_validator::SessionValidator;
pub use subscriber_sink::{SinkError, SubscriberSink};
pub use token_signer::TokenSigner;
