//! Configuration for negotiation runs
//!
//! [`NegotiationConfig`] controls the policy knobs of `freeze`: how roots are
//! found, whether orphans are errors, and how strict reachability is. It is
//! plain serde data, stored as TOML:
//!
//! ```toml
//! implicit_roots = true
//! orphans = "warn"
//! strict_reachability = false
//! trace_evaluations = false
//! ```
//!
//! Every field has a default, so a partial file (or an empty one) is valid.
//!
//! # Example
//!
//! ```ignore
//! use diplomacy_rs::{config::NegotiationConfig, graph::Graph};
//!
//! let config = NegotiationConfig::load("negotiation.toml")?;
//! let mut graph = Graph::with_config(config);
//! ```

use crate::error::{DiplomacyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config filename
pub const CONFIG_FILE: &str = "negotiation.toml";

/// How `freeze` treats a node with no connections at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Report a violation.
    #[default]
    Error,
    /// Log a warning and carry on.
    Warn,
}

/// Negotiation policy settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// When no root is declared, treat nodes without input ports as roots.
    pub implicit_roots: bool,

    pub orphans: OrphanPolicy,

    /// Report edges unreachable from every root as violations instead of
    /// skipping them with a warning.
    pub strict_reachability: bool,

    /// Emit a `trace` event for every evaluation the engine performs.
    pub trace_evaluations: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            implicit_roots: true,
            orphans: OrphanPolicy::Error,
            strict_reachability: false,
            trace_evaluations: false,
        }
    }
}

impl NegotiationConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DiplomacyError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Render the config as TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DiplomacyError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiplomacyError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default negotiation config: {}", e);
                Self::default()
            }
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DiplomacyError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            DiplomacyError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
