//! Snapshots and Cypher DUMP export.
//!
//! A [`GraphSnapshot`] is the durable form of a graph: the registered type
//! specs plus every stored relation, as JSON. Mirrors are not written; they
//! are re-derived when the snapshot is restored.
//!
//! ```text
//! Graph::snapshot() → GraphSnapshot → to_json() / write_to(path)
//!                                   → export_cypher_dump() → MERGE statements
//!                                     → paste into Neo4j Browser or cypher-shell
//! ```

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::schema::RelationTypeSpec;
use crate::{Error, Result};

/// Version written into new snapshots; older or newer ones are refused.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub relation_types: Vec<RelationTypeSpec>,
    /// Stored relations in commit order. Restoring replays them in this order.
    pub relations: Vec<Relation>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(text)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Config(format!(
                "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT_VERSION})",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }

    /// Write as JSON, replacing the file atomically via a sibling temp file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, self.to_json()?)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), relations = self.relations.len(), "snapshot written");
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }
}

/// Export a snapshot as a Cypher DUMP script.
///
/// Documents become `(:Document {id})` nodes, merged so the script can be
/// applied on top of an existing document import. Bidirectional relations
/// are written once with a `bidirectional: true` property.
pub fn export_cypher_dump(snapshot: &GraphSnapshot, writer: &mut dyn Write) -> Result<()> {
    let mut documents: Vec<&DocId> = snapshot
        .relations
        .iter()
        .flat_map(|r| [&r.source, &r.target])
        .collect();
    documents.sort();
    documents.dedup();

    writeln!(writer, "// docgraph Cypher DUMP")?;
    writeln!(writer, "// Exported: {}", snapshot.exported_at.to_rfc3339())?;
    writeln!(writer, "// Documents: {}", documents.len())?;
    writeln!(writer, "// Relations: {}", snapshot.relations.len())?;
    writeln!(writer)?;

    for doc in &documents {
        writeln!(writer, "MERGE (:Document {{id: {}}});", quote(doc.as_str()))?;
    }

    writeln!(writer)?;
    writeln!(writer, "// Relations")?;

    for rel in &snapshot.relations {
        let mut parts = vec![format!("created_at: {}", quote(&rel.created_at.to_rfc3339()))];
        if rel.bidirectional {
            parts.push("bidirectional: true".to_owned());
        }
        parts.extend(rel.properties.iter().map(|(k, v)| format!("{}: {}", escape_name(k), format_value(v))));

        writeln!(
            writer,
            "MATCH (a:Document {{id: {}}}), (b:Document {{id: {}}}) MERGE (a)-[:{} {{{}}}]->(b);",
            quote(rel.source.as_str()),
            quote(rel.target.as_str()),
            escape_name(&rel.rel_type),
            parts.join(", "),
        )?;
    }
    Ok(())
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Backtick-quote identifiers that are not plain `[A-Za-z_][A-Za-z0-9_]*`.
fn escape_name(name: &str) -> String {
    let plain = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_owned()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Format a Value as a Cypher literal. Floats keep a decimal point so they
/// are not re-read as integers.
fn format_value(value: &Value) -> String {
    match value {
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{f:.1}"),
        other => other.to_string(),
    }
}
