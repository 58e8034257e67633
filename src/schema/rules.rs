//! Write-time validation of a relation against its type spec and the
//! current index. Runs under the write lock, before anything is committed.

use std::collections::BTreeSet;

use crate::model::{DocId, RelationDraft};
use crate::storage::GraphIndex;
use crate::{Error, Result};

use super::{RelationTypeRegistry, RelationTypeSpec};

/// What a validated write will commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    /// Effective bidirectionality: requested on the draft or forced by a symmetric type.
    pub bidirectional: bool,
}

impl RelationTypeRegistry {
    /// Check a draft against every rule of its type.
    ///
    /// Checks run in a fixed order (type, kinds, properties, duplicates,
    /// incompatibilities, cycles, cardinality) so callers always see the
    /// same error for the same input.
    pub fn check_write(
        &self,
        draft: &RelationDraft,
        index: &GraphIndex,
        max_per_document: Option<usize>,
    ) -> Result<WritePlan> {
        let spec = self.get(&draft.rel_type)?;

        check_kind(spec, &spec.allowed_source_kinds, "source", &draft.source, draft.source_kind.as_deref())?;
        check_kind(spec, &spec.allowed_target_kinds, "target", &draft.target, draft.target_kind.as_deref())?;

        for property in &spec.required_properties {
            if !draft.properties.contains_key(property) {
                return Err(Error::MissingProperty {
                    rel_type: spec.type_name.clone(),
                    property: property.clone(),
                });
            }
        }

        let bidirectional = draft.bidirectional || spec.symmetric;
        let mirrored = bidirectional && draft.source != draft.target;
        let key = draft.key();

        // Duplicates: the edge itself, then the mirror it would imply.
        if let Some(existing) = index.find_edge(&draft.source, &draft.target, &draft.rel_type) {
            let implied_by = (*existing != key).then(|| existing.clone());
            return Err(Error::DuplicateRelation { key, implied_by });
        }
        if mirrored {
            if let Some(existing) = index.find_edge(&draft.target, &draft.source, &draft.rel_type) {
                return Err(Error::DuplicateRelation { key, implied_by: Some(existing.clone()) });
            }
        }

        // Incompatible types between the same ordered pair, both orientations
        // when the new relation will also be reported in reverse.
        let mut pairs = vec![(&draft.source, &draft.target)];
        if mirrored {
            pairs.push((&draft.target, &draft.source));
        }
        for (from, to) in pairs {
            for other in index.types_between(from, to) {
                if self.incompatible(&draft.rel_type, other) {
                    let existing = index
                        .find_edge(from, to, other)
                        .cloned()
                        .unwrap_or_else(|| crate::model::RelationKey::new(from.clone(), to.clone(), other));
                    return Err(Error::IncompatibleRelation { key, existing });
                }
            }
        }

        if spec.acyclic {
            if mirrored || draft.source == draft.target {
                return Err(Error::CyclicRelation(key));
            }
            if index.reaches(&draft.target, &draft.source, &draft.rel_type) {
                return Err(Error::CyclicRelation(key));
            }
        }

        check_cardinality(spec, draft, index, mirrored, max_per_document)?;

        Ok(WritePlan { bidirectional })
    }
}

fn check_kind(
    spec: &RelationTypeSpec,
    allowed: &BTreeSet<String>,
    endpoint: &'static str,
    doc: &DocId,
    kind: Option<&str>,
) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    match kind {
        Some(k) if allowed.contains(k) => Ok(()),
        other => Err(Error::KindMismatch {
            rel_type: spec.type_name.clone(),
            endpoint,
            document: doc.clone(),
            kind: other.unwrap_or("<none>").to_owned(),
        }),
    }
}

/// Post-write degrees must stay within the spec's maxima. A mirrored
/// relation adds one outgoing and one incoming edge at each end.
fn check_cardinality(
    spec: &RelationTypeSpec,
    draft: &RelationDraft,
    index: &GraphIndex,
    mirrored: bool,
    max_per_document: Option<usize>,
) -> Result<()> {
    let t = spec.type_name.as_str();

    let mut out_ends: Vec<&DocId> = vec![&draft.source];
    let mut in_ends: Vec<&DocId> = vec![&draft.target];
    if mirrored {
        out_ends.push(&draft.target);
        in_ends.push(&draft.source);
    }

    if let Some(limit) = spec.max_out_degree {
        for doc in out_ends {
            if index.out_degree(doc, t) + 1 > limit {
                return Err(Error::CardinalityExceeded {
                    document: doc.clone(),
                    scope: format!("outgoing {t} relations"),
                    limit,
                });
            }
        }
    }
    if let Some(limit) = spec.max_in_degree {
        for doc in in_ends {
            if index.in_degree(doc, t) + 1 > limit {
                return Err(Error::CardinalityExceeded {
                    document: doc.clone(),
                    scope: format!("incoming {t} relations"),
                    limit,
                });
            }
        }
    }

    if let Some(limit) = max_per_document {
        let mut ends = vec![&draft.source];
        if draft.target != draft.source {
            ends.push(&draft.target);
        }
        for doc in ends {
            if index.relation_count(doc) + 1 > limit {
                return Err(Error::CardinalityExceeded {
                    document: doc.clone(),
                    scope: "relations in total".to_owned(),
                    limit,
                });
            }
        }
    }
    Ok(())
}
