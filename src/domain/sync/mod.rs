//! Sync module - catch-up protocol types.

mod catchup;
mod counters;

pub use catchup::{
    CatchupRequest, CatchupResponse, DeletedEntity, DeletionScan, ScopeChanges,
    DELETION_SCAN_LIMIT,
};
pub use counters::{ClientCounters, ContextCounter, MEMBERSHIP_COUNTER_SUFFIX};
