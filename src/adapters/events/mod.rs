//! Activity bus and broadcast adapters.
//!
//! - `ActivityBus` - Validates change messages and republishes them in-process
//! - `InMemoryBroadcastTransport` - Single-instance transport, also used in tests
//! - `RedisBroadcastTransport` - Cross-instance transport over Redis pub/sub
//! - `BroadcastRelay` - Background service feeding the bus from a transport

mod activity_bus;
mod broadcast_relay;
mod in_memory_broadcast;
mod redis_broadcast;

pub use activity_bus::{ActivityBus, EmitOutcome, HandlerId};
pub use broadcast_relay::BroadcastRelay;
pub use in_memory_broadcast::InMemoryBroadcastTransport;
pub use redis_broadcast::{RedisBroadcastTransport, DEFAULT_CHANNEL};
