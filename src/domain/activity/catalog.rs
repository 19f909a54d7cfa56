//! Event catalog - the closed set of valid event types.
//!
//! Every tracked entity or resource name yields exactly three event types:
//! `{name}.created`, `{name}.updated` and `{name}.deleted`. The catalog is the
//! validation oracle for everything downstream; an event type that the catalog
//! does not know is never delivered to anyone.
//!
//! Only the catalog can mint an [`EventType`], so a handler table keyed by
//! `EventType` can never hold a key for an untracked type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a tracked name refers to. Drives counters and the deletion scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedKind {
    /// Tenant-level entity, e.g. `organization`.
    ContextEntity,
    /// Business entity living inside a tenant, counted by `seq`.
    ProductEntity,
    /// Membership resource, counted by `mSeq`.
    Membership,
    /// Any other non-entity resource, e.g. `request`.
    Resource,
}

impl TrackedKind {
    /// Entities are reported as `entityType`, everything else as `resourceType`.
    pub fn is_entity(&self) -> bool {
        matches!(self, TrackedKind::ContextEntity | TrackedKind::ProductEntity)
    }
}

/// Verb half of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Created,
    Updated,
    Deleted,
}

impl Verb {
    pub const ALL: [Verb; 3] = [Verb::Created, Verb::Updated, Verb::Deleted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Created => "created",
            Verb::Updated => "updated",
            Verb::Deleted => "deleted",
        }
    }

    /// The log action recorded for this verb.
    pub fn action(&self) -> ActivityAction {
        match self {
            Verb::Created => ActivityAction::Create,
            Verb::Updated => ActivityAction::Update,
            Verb::Deleted => ActivityAction::Delete,
        }
    }
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Verb::Created),
            "updated" => Ok(Verb::Updated),
            "deleted" => Ok(Verb::Deleted),
            _ => Err(()),
        }
    }
}

/// Action column of the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::Delete => "delete",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ActivityAction::Create),
            "update" => Ok(ActivityAction::Update),
            "delete" => Ok(ActivityAction::Delete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog member: tracked name plus verb.
///
/// Cheap to clone; obtained only through [`EventCatalog::parse`] or
/// [`EventCatalog::event_types`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType {
    tracked: Arc<str>,
    verb: Verb,
}

impl EventType {
    pub fn tracked_type(&self) -> &str {
        &self.tracked
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tracked, self.verb.as_str())
    }
}

/// Errors raised while building a catalog from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Catalog must track at least one type")]
    Empty,

    #[error("Invalid tracked type name '{0}': expected lowercase identifier")]
    InvalidName(String),

    #[error("Tracked type '{0}' is configured more than once")]
    Duplicate(String),
}

/// The closed set of valid `{type}.{verb}` strings.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    tracked: BTreeMap<Arc<str>, TrackedKind>,
}

impl EventCatalog {
    /// Builds a catalog from `(name, kind)` pairs.
    ///
    /// Names must be lowercase identifiers (`[a-z][a-z0-9_]*`) and unique.
    pub fn new<I, S>(tracked: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (S, TrackedKind)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, kind) in tracked {
            let name: String = name.into();
            if !is_identifier(&name) {
                return Err(CatalogError::InvalidName(name));
            }
            let key: Arc<str> = Arc::from(name.as_str());
            if map.insert(key, kind).is_some() {
                return Err(CatalogError::Duplicate(name));
            }
        }
        if map.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { tracked: map })
    }

    /// Whether `event_type` is a member of the catalog.
    pub fn is_valid(&self, event_type: &str) -> bool {
        self.parse(event_type).is_some()
    }

    /// Parses a catalog string into a typed event type.
    pub fn parse(&self, event_type: &str) -> Option<EventType> {
        let (name, verb) = event_type.split_once('.')?;
        let verb: Verb = verb.parse().ok()?;
        let (tracked, _) = self.tracked.get_key_value(name)?;
        Some(EventType {
            tracked: Arc::clone(tracked),
            verb,
        })
    }

    /// Kind of a tracked name, if tracked.
    pub fn kind_of(&self, tracked_type: &str) -> Option<TrackedKind> {
        self.tracked.get(tracked_type).copied()
    }

    /// All catalog members, sorted by name then verb.
    pub fn event_types(&self) -> Vec<EventType> {
        self.tracked
            .keys()
            .flat_map(|name| {
                Verb::ALL.into_iter().map(move |verb| EventType {
                    tracked: Arc::clone(name),
                    verb,
                })
            })
            .collect()
    }

    /// Names of tracked types of the given kind, sorted.
    pub fn types_of_kind(&self, kind: TrackedKind) -> Vec<String> {
        self.tracked
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Business entity names; the deletion scan is restricted to these.
    pub fn product_entity_types(&self) -> Vec<String> {
        self.types_of_kind(TrackedKind::ProductEntity)
    }

    pub fn len(&self) -> usize {
        self.tracked.len() * Verb::ALL.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> EventCatalog {
        EventCatalog::new([
            ("organization", TrackedKind::ContextEntity),
            ("attachment", TrackedKind::ProductEntity),
            ("page", TrackedKind::ProductEntity),
            ("membership", TrackedKind::Membership),
            ("request", TrackedKind::Resource),
        ])
        .unwrap()
    }

    #[test]
    fn every_tracked_type_has_three_verbs() {
        let catalog = catalog();
        for name in ["organization", "attachment", "page", "membership", "request"] {
            for verb in ["created", "updated", "deleted"] {
                assert!(catalog.is_valid(&format!("{}.{}", name, verb)));
            }
        }
        assert_eq!(catalog.len(), 15);
        assert_eq!(catalog.event_types().len(), 15);
    }

    #[test]
    fn rejects_unknown_types_and_verbs() {
        let catalog = catalog();
        assert!(!catalog.is_valid("user.created"));
        assert!(!catalog.is_valid("membership.archived"));
        assert!(!catalog.is_valid("membership"));
        assert!(!catalog.is_valid("membership.created.v1"));
        assert!(!catalog.is_valid(".created"));
        assert!(!catalog.is_valid(""));
        assert!(!catalog.is_valid("Membership.created"));
    }

    #[test]
    fn parse_returns_typed_event() {
        let event_type = catalog().parse("membership.created").unwrap();
        assert_eq!(event_type.tracked_type(), "membership");
        assert_eq!(event_type.verb(), Verb::Created);
        assert_eq!(event_type.verb().action(), ActivityAction::Create);
        assert_eq!(event_type.to_string(), "membership.created");
    }

    #[test]
    fn event_types_are_sorted_and_deterministic() {
        let first: Vec<String> = catalog().event_types().iter().map(|t| t.to_string()).collect();
        let second: Vec<String> = catalog().event_types().iter().map(|t| t.to_string()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], "attachment.created");
        assert_eq!(first[14], "request.deleted");
    }

    #[test]
    fn product_entity_types_lists_business_entities() {
        assert_eq!(catalog().product_entity_types(), vec!["attachment", "page"]);
    }

    #[test]
    fn construction_rejects_bad_configuration() {
        let empty: [(&str, TrackedKind); 0] = [];
        assert_eq!(EventCatalog::new(empty).unwrap_err(), CatalogError::Empty);
        assert!(matches!(
            EventCatalog::new([("Page", TrackedKind::ProductEntity)]),
            Err(CatalogError::InvalidName(_))
        ));
        assert!(matches!(
            EventCatalog::new([("page.x", TrackedKind::ProductEntity)]),
            Err(CatalogError::InvalidName(_))
        ));
        assert!(matches!(
            EventCatalog::new([
                ("page", TrackedKind::ProductEntity),
                ("page", TrackedKind::Resource)
            ]),
            Err(CatalogError::Duplicate(_))
        ));
    }

    #[test]
    fn kind_of_reports_entity_or_resource() {
        let catalog = catalog();
        assert!(catalog.kind_of("page").unwrap().is_entity());
        assert!(!catalog.kind_of("membership").unwrap().is_entity());
        assert_eq!(catalog.kind_of("user"), None);
    }

    proptest! {
        #[test]
        fn strings_outside_the_catalog_are_invalid(s in "\\PC{0,40}") {
            let catalog = catalog();
            let expected = match s.split_once('.') {
                Some((name, verb)) => catalog.kind_of(name).is_some()
                    && matches!(verb, "created" | "updated" | "deleted"),
                None => false,
            };
            prop_assert_eq!(catalog.is_valid(&s), expected);
        }

        #[test]
        fn parse_agrees_with_is_valid(name in "[a-z]{1,12}", verb in "[a-z]{1,8}") {
            let catalog = catalog();
            let s = format!("{}.{}", name, verb);
            prop_assert_eq!(catalog.parse(&s).is_some(), catalog.is_valid(&s));
        }
    }
}
