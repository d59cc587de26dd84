//! Mapper configuration
//!
//! Loaded from YAML; every field has a default so a partial file is enough.
//!
//! ```yaml
//! base_graph_uri: "http://opensilex.dev/"
//! generation_prefix: "http://opensilex.dev/id"
//! default_language: "fr"
//! documents:
//!   path: "./data/documents"
//! journal:
//!   path: "./data/journal"
//!   sync: true
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rdf::{NamedNode, NamespaceManager};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Value rejected by validation
    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Document store settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// RocksDB directory (None = in-memory only)
    pub path: Option<PathBuf>,
}

/// Transaction journal settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Journal directory (None = in-memory only)
    pub path: Option<PathBuf>,
    /// Flush and fsync the journal file after every entry
    pub sync: bool,
}

/// Mapper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Base IRI under which relative class graphs live
    pub base_graph_uri: String,
    /// Base IRI for generated resource URIs
    pub generation_prefix: String,
    /// Path segment between the base graph and a class graph
    pub default_graph_keyword: String,
    /// Language given to untagged labels and preferred when reading
    pub default_language: String,
    /// Collisions tolerated before URI generation gives up
    pub max_uri_retries: u32,
    /// Relation used to build class trees (compact or full IRI)
    pub tree_relation: String,
    /// Extra prefixes for compact IRIs
    pub prefixes: IndexMap<String, String>,
    pub documents: DocumentConfig,
    pub journal: JournalConfig,
    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            base_graph_uri: "http://opensilex.dev/".to_string(),
            generation_prefix: "http://opensilex.dev/id".to_string(),
            default_graph_keyword: "set".to_string(),
            default_language: "en".to_string(),
            max_uri_retries: 1000,
            tree_relation: "rdfs:subClassOf".to_string(),
            prefixes: IndexMap::new(),
            documents: DocumentConfig::default(),
            journal: JournalConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl MapperConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Check IRIs and limits
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [
            ("base_graph_uri", &self.base_graph_uri),
            ("generation_prefix", &self.generation_prefix),
        ] {
            oxiri::Iri::parse(value.as_str()).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?;
        }
        if self.default_graph_keyword.is_empty() || self.default_graph_keyword.contains('/') {
            return Err(ConfigError::Invalid {
                key: "default_graph_keyword",
                reason: "must be a single non-empty path segment".to_string(),
            });
        }
        if self.max_uri_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "max_uri_retries",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.tree_relation()?;
        Ok(())
    }

    /// Namespace manager with the configured prefixes added
    pub fn namespaces(&self) -> NamespaceManager {
        let mut namespaces = NamespaceManager::new();
        for (prefix, iri) in &self.prefixes {
            namespaces.add_prefix(prefix.clone(), iri.clone());
        }
        namespaces
    }

    /// Expanded tree relation
    pub fn tree_relation(&self) -> ConfigResult<NamedNode> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: "tree_relation",
            reason,
        };
        let expanded = self
            .namespaces()
            .expand(&self.tree_relation)
            .map_err(|e| invalid(e.to_string()))?;
        NamedNode::new(expanded).map_err(|e| invalid(e.to_string()))
    }

    /// Base graph IRI with a trailing slash
    pub fn base_graph(&self) -> String {
        if self.base_graph_uri.ends_with('/') || self.base_graph_uri.ends_with('#') {
            self.base_graph_uri.clone()
        } else {
            format!("{}/", self.base_graph_uri)
        }
    }
}
