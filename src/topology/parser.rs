// src/topology/parser.rs

//! Parser for the build topology TOML description.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};

/// The topology document as written on disk
///
/// Keyed by stage name under `[stages.<name>]`, with a companion artifact
/// table under `[artifacts.<name>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDoc {
    /// Pipeline stages keyed by name
    #[serde(default)]
    pub stages: HashMap<String, StageEntry>,

    /// Artifact declarations keyed by name
    #[serde(default)]
    pub artifacts: HashMap<String, ArtifactEntry>,
}

/// What kind of pipeline phase a stage is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StageKind {
    /// Compiles sources and produces artifacts
    #[default]
    Build,
    /// Consumes artifacts to run a test suite
    Test,
    /// Collects artifacts from other stages without building anything
    Aggregate,
}

/// One stage entry in the topology document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    /// Stage kind (defaults to `build`)
    #[serde(default)]
    pub kind: StageKind,

    /// Human description
    #[serde(default)]
    pub description: String,

    /// Names of stages whose outputs this stage consumes
    #[serde(default)]
    pub inbound: Vec<String>,

    /// Names of artifacts this stage produces
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// One artifact entry in the companion artifact table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Owning compile-time feature name
    pub feature: String,

    /// Whether the artifact is built per GPU architecture family
    #[serde(default, rename = "gfx-arch-specific")]
    pub gfx_arch_specific: bool,
}

/// Load and parse a topology document from disk
pub fn load_doc(path: &Path) -> Result<TopologyDoc> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read topology file {}: {e}",
            path.display()
        ))
    })?;
    parse_doc(&contents)
        .map_err(|e| Error::ConfigError(format!("In topology file {}: {e}", path.display())))
}

/// Parse a topology document from a TOML string
pub fn parse_doc(contents: &str) -> Result<TopologyDoc> {
    toml::from_str(contents)
        .map_err(|e| Error::ConfigError(format!("Malformed topology TOML: {e}")))
}
