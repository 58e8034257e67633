//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! max_relations_per_document = 50
//! max_query_depth = 10
//! support_catalog = true
//!
//! [[relation_types]]
//! type_name = "SUPERSEDES"
//! acyclic = true
//! max_in_degree = 1
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::schema::RelationTypeSpec;
use crate::{Error, Result};

/// Environment variable naming a config file for [`EngineConfig::from_env`].
pub const CONFIG_ENV: &str = "DOCGRAPH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cap on stored relations touching one document, any type. `None` disables it.
    pub max_relations_per_document: Option<usize>,
    /// Upper bound accepted for any traversal, path or inference depth.
    pub max_query_depth: usize,
    pub default_traversal_depth: usize,
    pub default_path_depth: usize,
    pub max_inference_depth: usize,
    /// Largest accepted all-or-nothing batch.
    pub max_batch_size: usize,
    /// Register unknown relation types on first use (no constraints) instead
    /// of rejecting them.
    pub auto_register_types: bool,
    /// Preload the built-in support-desk relation types.
    pub support_catalog: bool,
    /// Where `Graph::shutdown` writes a JSON snapshot, if anywhere.
    pub snapshot_path: Option<PathBuf>,
    /// Additional relation types registered at open.
    pub relation_types: Vec<RelationTypeSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_relations_per_document: Some(50),
            max_query_depth: 10,
            default_traversal_depth: 3,
            default_path_depth: 5,
            max_inference_depth: 3,
            max_batch_size: 1000,
            auto_register_types: false,
            support_catalog: true,
            snapshot_path: None,
            relation_types: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// A configuration with no built-in types, for callers that register
    /// their own.
    pub fn bare() -> Self {
        Self { support_catalog: false, ..Self::default() }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), types = config.relation_types.len(), "configuration loaded");
        Ok(config)
    }

    /// Load from the file named by `DOCGRAPH_CONFIG`, or defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_query_depth == 0 {
            return Err(Error::Config("max_query_depth must be at least 1".into()));
        }
        for (name, depth) in [
            ("default_traversal_depth", self.default_traversal_depth),
            ("default_path_depth", self.default_path_depth),
            ("max_inference_depth", self.max_inference_depth),
        ] {
            if depth == 0 || depth > self.max_query_depth {
                return Err(Error::Config(format!(
                    "{name} must be between 1 and max_query_depth ({}), got {depth}",
                    self.max_query_depth
                )));
            }
        }
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be at least 1".into()));
        }
        if self.max_relations_per_document == Some(0) {
            return Err(Error::Config("max_relations_per_document must be at least 1".into()));
        }
        for spec in &self.relation_types {
            spec.check().map_err(|e| Error::Config(e.to_string()))?;
        }
        Ok(())
    }
}
