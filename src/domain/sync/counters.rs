//! Per-scope change counters.
//!
//! Each scope carries two monotonic counters maintained by the store in the
//! same transaction as the change that bumps them:
//!
//! - `seq` counts business-entity changes,
//! - `m_seq` counts membership changes.
//!
//! Comparing a client's last-known counters with the server's answers "did
//! anything change in this scope" in O(1), without touching the log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ScopeId;

/// Suffix marking the membership counter in the flat wire map.
pub const MEMBERSHIP_COUNTER_SUFFIX: &str = ":m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextCounter {
    pub seq: u64,
    pub m_seq: u64,
}

impl ContextCounter {
    pub fn new(seq: u64, m_seq: u64) -> Self {
        Self { seq, m_seq }
    }
}

/// Counters a client last saw, keyed by scope.
///
/// On the wire this is one flat map: `{"org1": 5, "org1:m": 2}`. Entries that
/// are absent read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientCounters {
    seq: HashMap<String, u64>,
    m_seq: HashMap<String, u64>,
}

impl ClientCounters {
    /// Splits the flat wire map into `seq` and `mSeq` halves.
    pub fn from_wire(wire: HashMap<String, u64>) -> Self {
        let mut counters = Self::default();
        for (key, value) in wire {
            match key.strip_suffix(MEMBERSHIP_COUNTER_SUFFIX) {
                Some(scope) => counters.m_seq.insert(scope.to_string(), value),
                None => counters.seq.insert(key, value),
            };
        }
        counters
    }

    /// Sets both counters for a scope.
    pub fn with_scope(mut self, scope_id: &ScopeId, counter: ContextCounter) -> Self {
        self.seq.insert(scope_id.to_string(), counter.seq);
        self.m_seq.insert(scope_id.to_string(), counter.m_seq);
        self
    }

    /// What the client last saw for a scope; missing entries are zero.
    pub fn get(&self, scope_id: &ScopeId) -> ContextCounter {
        ContextCounter {
            seq: self.seq.get(scope_id.as_str()).copied().unwrap_or(0),
            m_seq: self.m_seq.get(scope_id.as_str()).copied().unwrap_or(0),
        }
    }

    /// Renders back to the flat wire form.
    pub fn to_wire(&self) -> HashMap<String, u64> {
        let mut wire: HashMap<String, u64> = self.seq.clone();
        for (scope, value) in &self.m_seq {
            wire.insert(format!("{}{}", scope, MEMBERSHIP_COUNTER_SUFFIX), *value);
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(id: &str) -> ScopeId {
        ScopeId::new(id).unwrap()
    }

    #[test]
    fn from_wire_splits_membership_counters() {
        let wire = HashMap::from([("orgA".to_string(), 5), ("orgA:m".to_string(), 2)]);
        let counters = ClientCounters::from_wire(wire);

        assert_eq!(counters.get(&scope("orgA")), ContextCounter::new(5, 2));
    }

    #[test]
    fn missing_entries_read_as_zero() {
        let wire = HashMap::from([("orgA".to_string(), 5)]);
        let counters = ClientCounters::from_wire(wire);

        assert_eq!(counters.get(&scope("orgA")), ContextCounter::new(5, 0));
        assert_eq!(counters.get(&scope("orgB")), ContextCounter::default());
    }

    #[test]
    fn to_wire_restores_flat_map() {
        let counters = ClientCounters::default().with_scope(&scope("orgA"), ContextCounter::new(3, 1));
        let wire = counters.to_wire();

        assert_eq!(wire.get("orgA"), Some(&3));
        assert_eq!(wire.get("orgA:m"), Some(&1));
    }
}
