//! Event catalog configuration

use serde::Deserialize;

use crate::domain::activity::{EventCatalog, TrackedKind};

use super::error::ValidationError;

/// Tracked names per kind, each a comma-separated list.
///
/// `ACTIVITY_RELAY__CATALOG__PRODUCT_ENTITIES=page,attachment`
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_context_entities")]
    pub context_entities: String,

    #[serde(default = "default_product_entities")]
    pub product_entities: String,

    #[serde(default = "default_membership")]
    pub membership: String,

    #[serde(default)]
    pub resources: String,
}

impl CatalogConfig {
    /// Builds the catalog these settings describe.
    pub fn build(&self) -> Result<EventCatalog, ValidationError> {
        let tracked = [
            (&self.context_entities, TrackedKind::ContextEntity),
            (&self.product_entities, TrackedKind::ProductEntity),
            (&self.membership, TrackedKind::Membership),
            (&self.resources, TrackedKind::Resource),
        ]
        .into_iter()
        .flat_map(|(names, kind)| split_names(names).map(move |name| (name, kind)));

        EventCatalog::new(tracked).map_err(|e| ValidationError::InvalidCatalog(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.build().map(|_| ())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            context_entities: default_context_entities(),
            product_entities: default_product_entities(),
            membership: default_membership(),
            resources: String::new(),
        }
    }
}

fn split_names(names: &str) -> impl Iterator<Item = String> + '_ {
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn default_context_entities() -> String {
    "organization".to_string()
}

fn default_product_entities() -> String {
    "attachment,page".to_string()
}

fn default_membership() -> String {
    "membership".to_string()
}
