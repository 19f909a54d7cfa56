//! Channel keys - the fan-out unit.
//!
//! One channel per tenant scope. Tenant updates, membership changes and
//! business-entity changes for a scope all travel on the same channel;
//! per-event filtering happens at dispatch time.

use std::fmt;

use crate::domain::foundation::ScopeId;

const SCOPE_PREFIX: &str = "org:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Channel carrying every event of a scope: `org:{scopeId}`.
    pub fn for_scope(scope_id: &ScopeId) -> Self {
        Self(format!("{}{}", SCOPE_PREFIX, scope_id))
    }

    /// Recovers the scope a channel belongs to.
    pub fn scope_id(&self) -> Option<ScopeId> {
        self.0
            .strip_prefix(SCOPE_PREFIX)
            .and_then(|id| ScopeId::new(id).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
