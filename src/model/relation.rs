//! Relation (typed edge) between two documents.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Opaque document identifier. The engine never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId { fn from(v: &str) -> Self { DocId(v.to_owned()) } }
impl From<String> for DocId { fn from(v: String) -> Self { DocId(v) } }

/// Traversal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    All,
}

impl Direction {
    /// Parse the lowercase / uppercase names used by the API layer.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Some(Direction::Outgoing),
            "incoming" | "in" => Some(Direction::Incoming),
            "all" | "both" => Some(Direction::All),
            _ => None,
        }
    }
}

/// Identity of a relation: `(source, target, type)`.
///
/// Properties never take part in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    pub source: DocId,
    pub target: DocId,
    pub rel_type: String,
}

impl RelationKey {
    pub fn new(
        source: impl Into<DocId>,
        target: impl Into<DocId>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self { source: source.into(), target: target.into(), rel_type: rel_type.into() }
    }

    /// The key of the implied reverse edge.
    pub fn mirror(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
            rel_type: self.rel_type.clone(),
        }
    }

    /// The "other" end of the edge as seen from `from`.
    pub fn other_end(&self, from: &DocId) -> Option<&DocId> {
        if *from == self.source { Some(&self.target) }
        else if *from == self.target { Some(&self.source) }
        else { None }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.source, self.rel_type, self.target)
    }
}

/// A stored relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: DocId,
    pub target: DocId,
    pub rel_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bidirectional: bool,
}

impl Relation {
    pub fn key(&self) -> RelationKey {
        RelationKey {
            source: self.source.clone(),
            target: self.target.clone(),
            rel_type: self.rel_type.clone(),
        }
    }

    pub fn has_key(&self, key: &RelationKey) -> bool {
        self.source == key.source && self.target == key.target && self.rel_type == key.rel_type
    }

    /// Whether the index carries a derived reverse edge for this relation.
    /// Self-loops never get one: their mirror is the relation itself.
    pub fn is_mirrored(&self) -> bool {
        self.bidirectional && self.source != self.target
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A relation as submitted by a caller, before validation and timestamping.
///
/// Endpoint kinds may be supplied here; when absent they are resolved
/// through the [`DocumentStore`](crate::document::DocumentStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDraft {
    pub source: DocId,
    pub target: DocId,
    pub rel_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<String>,
}

impl RelationDraft {
    pub fn new(
        source: impl Into<DocId>,
        target: impl Into<DocId>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
            bidirectional: false,
            source_kind: None,
            target_kind: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn bidirectional(mut self, yes: bool) -> Self {
        self.bidirectional = yes;
        self
    }

    pub fn with_kinds(mut self, source_kind: impl Into<String>, target_kind: impl Into<String>) -> Self {
        self.source_kind = Some(source_kind.into());
        self.target_kind = Some(target_kind.into());
        self
    }

    pub fn key(&self) -> RelationKey {
        RelationKey {
            source: self.source.clone(),
            target: self.target.clone(),
            rel_type: self.rel_type.clone(),
        }
    }
}
