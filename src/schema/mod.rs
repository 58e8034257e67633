//! # Relation Type Registry
//!
//! Every relation type carries a [`RelationTypeSpec`]: which document kinds
//! may sit at either end, how many edges of the type a document may have,
//! and the structural rules (symmetry, acyclicity, incompatibilities) that
//! are checked on every write.
//!
//! Specs are registered once. Re-registering identical rules is a no-op;
//! changing the rules of a type that already has relations is refused,
//! because existing data was validated against the old rules.

pub mod catalog;
mod rules;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use rules::WritePlan;

// ============================================================================
// RelationTypeSpec
// ============================================================================

/// Validation contract for one relation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeSpec {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Kinds allowed at the source end. Empty means any kind.
    #[serde(default)]
    pub allowed_source_kinds: BTreeSet<String>,
    /// Kinds allowed at the target end. Empty means any kind.
    #[serde(default)]
    pub allowed_target_kinds: BTreeSet<String>,
    #[serde(default)]
    pub max_out_degree: Option<usize>,
    #[serde(default)]
    pub max_in_degree: Option<usize>,
    /// Every relation of a symmetric type is bidirectional.
    #[serde(default)]
    pub symmetric: bool,
    /// Opt-in for transitive inference.
    #[serde(default)]
    pub transitive: bool,
    /// Relations of this type may not close a cycle.
    #[serde(default)]
    pub acyclic: bool,
    /// Name of the inverse type (REFERENCES ↔ CITED_BY).
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub required_properties: Vec<String>,
    /// Types that may not coexist with this one between the same ordered pair.
    #[serde(default)]
    pub incompatible_with: Vec<String>,
}

impl RelationTypeSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            description: String::new(),
            allowed_source_kinds: BTreeSet::new(),
            allowed_target_kinds: BTreeSet::new(),
            max_out_degree: None,
            max_in_degree: None,
            symmetric: false,
            transitive: false,
            acyclic: false,
            inverse: None,
            required_properties: Vec::new(),
            incompatible_with: Vec::new(),
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn sources<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_source_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn targets<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_target_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_out(mut self, n: usize) -> Self {
        self.max_out_degree = Some(n);
        self
    }

    pub fn max_in(mut self, n: usize) -> Self {
        self.max_in_degree = Some(n);
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    pub fn transitive(mut self) -> Self {
        self.transitive = true;
        self
    }

    pub fn acyclic(mut self) -> Self {
        self.acyclic = true;
        self
    }

    pub fn inverse(mut self, type_name: impl Into<String>) -> Self {
        self.inverse = Some(type_name.into());
        self
    }

    pub fn require(mut self, property: impl Into<String>) -> Self {
        self.required_properties.push(property.into());
        self
    }

    pub fn incompatible_with(mut self, type_name: impl Into<String>) -> Self {
        self.incompatible_with.push(type_name.into());
        self
    }

    /// Structural sanity of the spec itself.
    pub fn check(&self) -> Result<()> {
        let invalid = |message: &str| Error::InvalidTypeSpec {
            type_name: self.type_name.clone(),
            message: message.to_owned(),
        };
        if self.type_name.trim().is_empty() {
            return Err(invalid("type name must not be empty"));
        }
        if self.type_name.chars().any(char::is_whitespace) {
            return Err(invalid("type name must not contain whitespace"));
        }
        if self.symmetric && self.acyclic {
            return Err(invalid("a symmetric type cannot be acyclic"));
        }
        if self.incompatible_with.iter().any(|t| *t == self.type_name) {
            return Err(invalid("a type cannot be incompatible with itself"));
        }
        Ok(())
    }
}

// ============================================================================
// RelationTypeRegistry
// ============================================================================

/// Registered relation types, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RelationTypeRegistry {
    specs: IndexMap<String, RelationTypeSpec>,
}

impl RelationTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Returns `true` if it was new, `false` if identical
    /// rules were already registered.
    pub fn register(&mut self, spec: RelationTypeSpec) -> Result<bool> {
        spec.check()?;
        match self.specs.get(&spec.type_name) {
            Some(existing) if *existing == spec => Ok(false),
            Some(_) => Err(Error::DuplicateType(spec.type_name)),
            None => {
                tracing::info!(rel_type = %spec.type_name, "relation type registered");
                self.specs.insert(spec.type_name.clone(), spec);
                Ok(true)
            }
        }
    }

    /// Replace the rules of a registered type. `in_use` is the number of
    /// stored relations of that type; a populated type cannot be redefined.
    pub fn redefine(&mut self, spec: RelationTypeSpec, in_use: usize) -> Result<()> {
        spec.check()?;
        if !self.specs.contains_key(&spec.type_name) {
            return Err(Error::UnknownType(spec.type_name));
        }
        if in_use > 0 {
            return Err(Error::TypeInUse { type_name: spec.type_name, count: in_use });
        }
        tracing::info!(rel_type = %spec.type_name, "relation type redefined");
        self.specs.insert(spec.type_name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Result<&RelationTypeSpec> {
        self.specs
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_owned()))
    }

    pub fn lookup(&self, type_name: &str) -> Option<&RelationTypeSpec> {
        self.specs.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.specs.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationTypeSpec> {
        self.specs.values()
    }

    /// Whether `a` and `b` may not coexist between the same ordered pair.
    /// Declared on either side is enough.
    pub fn incompatible(&self, a: &str, b: &str) -> bool {
        let declares = |from: &str, other: &str| {
            self.specs
                .get(from)
                .is_some_and(|s| s.incompatible_with.iter().any(|t| t == other))
        };
        declares(a, b) || declares(b, a)
    }
}
