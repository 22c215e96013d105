// src/topology/mod.rs

//! Build topology model
//!
//! Answers "what artifacts and features does stage X need or produce"
//! without callers walking the dependency graph themselves. Separating
//! produced from inbound lets a configuration generator enable exactly the
//! minimal feature set per stage, which is what makes incremental,
//! artifact-cached multi-stage builds possible.

mod parser;

pub use parser::{load_doc, parse_doc, ArtifactEntry, StageEntry, StageKind, TopologyDoc};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// A named phase of the build pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub description: String,
    /// Declared inbound stage names, in declaration order
    pub inbound: Vec<String>,
    /// Artifact names this stage produces
    pub artifacts: Vec<String>,
}

/// A named unit of build output, parameterized by GPU family when
/// `gfx_arch_specific` is set
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    /// Owning compile-time feature name
    pub feature: String,
    pub gfx_arch_specific: bool,
    /// The single stage that produces this artifact
    pub produced_by: String,
}

/// Validated topology: stages, artifacts, and the queries over them
///
/// Owns all stage and artifact records for the duration of one process
/// invocation. Construction validates the document; queries cannot observe
/// an inconsistent graph.
#[derive(Debug)]
pub struct Topology {
    stages: BTreeMap<String, Stage>,
    artifacts: BTreeMap<String, Artifact>,
}

impl Topology {
    /// Load and validate a topology from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let doc = parser::load_doc(path)?;
        Self::from_doc(doc)
    }

    /// Validate a parsed document into a queryable topology
    ///
    /// Rejects: artifacts referenced by a stage but not declared, artifacts
    /// declared but produced by no stage or by more than one stage, inbound
    /// references to unknown stages, and cycles among inbound edges.
    pub fn from_doc(doc: TopologyDoc) -> Result<Self> {
        let mut stages = BTreeMap::new();
        for (name, entry) in doc.stages {
            stages.insert(
                name.clone(),
                Stage {
                    name,
                    kind: entry.kind,
                    description: entry.description,
                    inbound: entry.inbound,
                    artifacts: entry.artifacts,
                },
            );
        }

        let mut artifacts: BTreeMap<String, Artifact> = BTreeMap::new();
        for (name, entry) in doc.artifacts {
            artifacts.insert(
                name.clone(),
                Artifact {
                    name,
                    feature: entry.feature,
                    gfx_arch_specific: entry.gfx_arch_specific,
                    produced_by: String::new(),
                },
            );
        }

        // Bind each artifact to its single producing stage
        for stage in stages.values() {
            for artifact_name in &stage.artifacts {
                let artifact = artifacts.get_mut(artifact_name).ok_or_else(|| {
                    Error::ConfigError(format!(
                        "Stage '{}' produces undeclared artifact '{}'",
                        stage.name, artifact_name
                    ))
                })?;
                if !artifact.produced_by.is_empty() {
                    return Err(Error::ConfigError(format!(
                        "Artifact '{}' is produced by both '{}' and '{}'",
                        artifact_name, artifact.produced_by, stage.name
                    )));
                }
                artifact.produced_by = stage.name.clone();
            }
        }
        for artifact in artifacts.values() {
            if artifact.produced_by.is_empty() {
                return Err(Error::ConfigError(format!(
                    "Artifact '{}' is not produced by any stage",
                    artifact.name
                )));
            }
        }

        // Inbound references must name known stages
        for stage in stages.values() {
            for inbound in &stage.inbound {
                if !stages.contains_key(inbound) {
                    return Err(Error::ConfigError(format!(
                        "Stage '{}' declares unknown inbound stage '{}'",
                        stage.name, inbound
                    )));
                }
            }
        }

        let topology = Self { stages, artifacts };
        if let Some(cycle) = topology.find_inbound_cycle() {
            return Err(Error::ConfigError(format!(
                "Cycle among stage inbound edges: {}",
                cycle.join(" -> ")
            )));
        }

        debug!(
            "Loaded topology: {} stages, {} artifacts",
            topology.stages.len(),
            topology.artifacts.len()
        );
        Ok(topology)
    }

    /// Look up a stage, failing with the set of valid alternatives
    pub fn stage(&self, name: &str) -> Result<&Stage> {
        self.stages.get(name).ok_or_else(|| Error::UnknownStage {
            stage: name.to_string(),
            available: self.stage_names().join(", "),
        })
    }

    /// All stage names, lexicographically sorted
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.keys().cloned().collect()
    }

    /// Look up an artifact, failing with the set of valid alternatives
    pub fn artifact(&self, name: &str) -> Result<&Artifact> {
        self.artifacts
            .get(name)
            .ok_or_else(|| Error::UnknownArtifact {
                artifact: name.to_string(),
                available: self.artifacts.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    /// Artifacts the given stage produces
    pub fn produced_artifacts(&self, stage: &str) -> Result<BTreeSet<String>> {
        let stage = self.stage(stage)?;
        Ok(stage.artifacts.iter().cloned().collect())
    }

    /// Artifacts the given stage needs as prebuilt inputs
    ///
    /// Union, over every stage transitively reachable through inbound edges,
    /// of that ancestor's produced artifacts. Each ancestor is walked once
    /// even when reachable via multiple paths.
    pub fn inbound_artifacts(&self, stage: &str) -> Result<BTreeSet<String>> {
        let stage = self.stage(stage)?;

        let mut result = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&str> = stage.inbound.iter().map(String::as_str).collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.to_string()) {
                continue;
            }
            // Validated at load time, so the lookup cannot fail here
            let ancestor = self.stage(name)?;
            result.extend(ancestor.artifacts.iter().cloned());
            queue.extend(ancestor.inbound.iter().map(String::as_str));
        }

        Ok(result)
    }

    /// The feature name owning the given artifact
    pub fn artifact_feature(&self, artifact: &str) -> Result<&str> {
        Ok(&self.artifact(artifact)?.feature)
    }

    /// Feature names for everything the stage builds or consumes
    ///
    /// Covers produced and inbound artifacts: prebuilt inputs still need
    /// their feature flag enabled for the build system's own dependency
    /// resolution even though their binaries are not rebuilt. Sorted
    /// lexicographically for diff-friendly generated configuration.
    pub fn stage_features(&self, stage: &str) -> Result<BTreeSet<String>> {
        let mut names = self.produced_artifacts(stage)?;
        names.extend(self.inbound_artifacts(stage)?);

        let mut features = BTreeSet::new();
        for name in &names {
            features.insert(self.artifact_feature(name)?.to_string());
        }
        Ok(features)
    }

    /// DFS over inbound edges looking for a cycle; returns its members
    fn find_inbound_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        let mut cycle = Vec::new();

        for name in self.stages.keys() {
            if !visited.contains(name)
                && self.dfs_cycle(name, &mut visited, &mut stack, &mut cycle)
            {
                cycle.reverse();
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        name: &str,
        visited: &mut BTreeSet<String>,
        stack: &mut BTreeSet<String>,
        cycle: &mut Vec<String>,
    ) -> bool {
        visited.insert(name.to_string());
        stack.insert(name.to_string());

        if let Some(stage) = self.stages.get(name) {
            for inbound in &stage.inbound {
                if !visited.contains(inbound) {
                    if self.dfs_cycle(inbound, visited, stack, cycle) {
                        cycle.push(name.to_string());
                        return true;
                    }
                } else if stack.contains(inbound) {
                    cycle.push(inbound.clone());
                    cycle.push(name.to_string());
                    return true;
                }
            }
        }

        stack.remove(name);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_topology() -> Topology {
        let doc = parse_doc(
            r#"
            [stages.foundation]
            description = "Base runtime and support libraries"
            artifacts = ["core-lib"]

            [stages.compilers]
            description = "Device compiler toolchain"
            inbound = ["foundation"]
            artifacts = ["device-compiler"]

            [stages.math-libs]
            description = "Dense and sparse math libraries"
            inbound = ["compilers"]
            artifacts = ["blas-lib", "fft-lib"]

            [stages.frameworks]
            description = "Framework integration layer"
            inbound = ["math-libs", "compilers"]
            artifacts = ["framework-shim"]

            [artifacts.core-lib]
            feature = "CORE"

            [artifacts.device-compiler]
            feature = "COMPILER"

            [artifacts.blas-lib]
            feature = "BLAS"
            gfx-arch-specific = true

            [artifacts.fft-lib]
            feature = "FFT"
            gfx-arch-specific = true

            [artifacts.framework-shim]
            feature = "FRAMEWORKS"
            "#,
        )
        .unwrap();
        Topology::from_doc(doc).unwrap()
    }

    #[test]
    fn test_produced_artifacts() {
        let topology = sample_topology();
        let produced = topology.produced_artifacts("math-libs").unwrap();
        assert_eq!(
            produced.into_iter().collect::<Vec<_>>(),
            vec!["blas-lib", "fft-lib"]
        );
    }

    #[test]
    fn test_unknown_stage_names_alternatives() {
        let topology = sample_topology();
        let err = topology.produced_artifacts("does-not-exist").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("does-not-exist"), "got: {message}");
        assert!(
            message.contains("foundation") && message.contains("math-libs"),
            "error should enumerate available stages, got: {message}"
        );
    }

    #[test]
    fn test_no_inbound_means_empty_set() {
        let topology = sample_topology();
        assert!(topology.inbound_artifacts("foundation").unwrap().is_empty());
    }

    #[test]
    fn test_inbound_is_transitive() {
        let topology = sample_topology();
        let inbound = topology.inbound_artifacts("math-libs").unwrap();
        assert!(inbound.contains("device-compiler"), "direct ancestor");
        assert!(inbound.contains("core-lib"), "transitive ancestor");
        assert!(!inbound.contains("blas-lib"), "own artifacts are not inbound");
    }

    #[test]
    fn test_diamond_counts_each_artifact_once() {
        // frameworks reaches compilers both directly and through math-libs
        let topology = sample_topology();
        let inbound = topology.inbound_artifacts("frameworks").unwrap();
        assert_eq!(
            inbound.into_iter().collect::<Vec<_>>(),
            vec!["blas-lib", "core-lib", "device-compiler", "fft-lib"]
        );
    }

    #[test]
    fn test_stage_features_sorted_union() {
        let topology = sample_topology();
        let features = topology.stage_features("math-libs").unwrap();
        assert_eq!(
            features.into_iter().collect::<Vec<_>>(),
            vec!["BLAS", "COMPILER", "CORE", "FFT"]
        );
    }

    #[test]
    fn test_artifact_feature_lookup() {
        let topology = sample_topology();
        assert_eq!(topology.artifact_feature("blas-lib").unwrap(), "BLAS");
        assert!(topology.artifact_feature("nope").is_err());
    }

    #[test]
    fn test_rejects_undeclared_artifact() {
        let doc = parse_doc(
            r#"
            [stages.foundation]
            artifacts = ["ghost"]
            "#,
        )
        .unwrap();
        let err = Topology::from_doc(doc).unwrap_err();
        assert!(err.to_string().contains("ghost"), "got: {err}");
    }

    #[test]
    fn test_rejects_duplicate_producer() {
        let doc = parse_doc(
            r#"
            [stages.a]
            artifacts = ["shared"]
            [stages.b]
            artifacts = ["shared"]
            [artifacts.shared]
            feature = "SHARED"
            "#,
        )
        .unwrap();
        let err = Topology::from_doc(doc).unwrap_err();
        assert!(err.to_string().contains("produced by both"), "got: {err}");
    }

    #[test]
    fn test_rejects_unknown_inbound() {
        let doc = parse_doc(
            r#"
            [stages.a]
            inbound = ["missing"]
            "#,
        )
        .unwrap();
        let err = Topology::from_doc(doc).unwrap_err();
        assert!(err.to_string().contains("missing"), "got: {err}");
    }

    #[test]
    fn test_rejects_inbound_cycle() {
        let doc = parse_doc(
            r#"
            [stages.a]
            inbound = ["b"]
            [stages.b]
            inbound = ["a"]
            "#,
        )
        .unwrap();
        let err = Topology::from_doc(doc).unwrap_err();
        assert!(err.to_string().contains("Cycle"), "got: {err}");
    }

    #[test]
    fn test_unproduced_artifact_rejected() {
        let doc = parse_doc(
            r#"
            [artifacts.orphan]
            feature = "ORPHAN"
            "#,
        )
        .unwrap();
        let err = Topology::from_doc(doc).unwrap_err();
        assert!(err.to_string().contains("orphan"), "got: {err}");
    }
}
