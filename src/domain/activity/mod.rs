//! Activity module - the vocabulary of change distribution.
//!
//! - [`catalog`] - closed set of valid event types
//! - [`event`] - raw change messages and validated activity events
//! - [`channel`] - per-tenant channel keys
//! - [`notification`] - what a live subscriber receives

pub mod catalog;
pub mod channel;
pub mod event;
pub mod notification;

pub use catalog::{ActivityAction, CatalogError, EventCatalog, EventType, TrackedKind, Verb};
pub use channel::ChannelKey;
pub use event::{ActivityEvent, MalformedMessage, RawChangeMessage, Subject, TraceContext};
pub use notification::ActivityNotification;
