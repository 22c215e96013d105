// src/packages/metadata.rs

//! Package metadata model
//!
//! Loads the declarative package list and derives install-time package
//! names. The list is loaded fresh for every invocation and never mutated
//! after load; install/uninstall act on this read-only view plus the OS
//! package manager's own state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::manager::OsFamily;
use crate::error::{Error, Result};

/// One entry of the declarative package list
///
/// Field names mirror the on-disk JSON keys. Dependency lists are
/// OS-family-specific because Debian and RPM ecosystems name the same
/// library differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMeta {
    #[serde(rename = "Package")]
    pub name: String,

    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "Architecture", default)]
    pub architecture: String,

    #[serde(rename = "BuildArch", default)]
    pub build_arch: String,

    /// Debian dependency names
    #[serde(rename = "DEBDepends", default)]
    pub deb_depends: Vec<String>,

    /// RPM dependency names
    #[serde(rename = "RPMRequires", default)]
    pub rpm_requires: Vec<String>,

    /// Explicit composite flag: bundles other packages vs a single leaf
    /// artifact. This flag is the sole classification rule.
    #[serde(rename = "Composite", default, with = "yes_no")]
    pub composite: bool,

    /// Whether the package is built per GPU architecture
    #[serde(rename = "Gfxarch", default)]
    pub gfxarch: bool,

    /// Backing artifact name
    #[serde(rename = "Artifact", default)]
    pub artifact: String,

    /// Subdirectory of the artifact holding this package's payload
    #[serde(rename = "Artifact_Subdir", default)]
    pub artifact_subdir: String,

    #[serde(rename = "License", default)]
    pub license: String,

    #[serde(rename = "Vendor", default)]
    pub vendor: String,

    #[serde(rename = "Description", default)]
    pub description: String,
}

impl PackageMeta {
    /// The dependency name list for the given OS family
    pub fn deps_for(&self, family: OsFamily) -> &[String] {
        match family {
            OsFamily::Debian => &self.deb_depends,
            OsFamily::Rhel | OsFamily::Suse => &self.rpm_requires,
        }
    }

    /// Development/header packages are never GPU-architecture suffixed
    pub fn is_devel(&self) -> bool {
        self.name.ends_with("-devel") || self.name.ends_with("-dev")
    }
}

/// Serde codec for the `Composite` yes/no field
mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "Composite must be 'yes' or 'no', got '{other}'"
            ))),
        }
    }
}

/// Knobs for deriving installable package names
#[derive(Debug, Clone, Copy)]
pub struct NameOptions<'a> {
    pub os_family: OsFamily,
    /// Append the stack version to the base name
    pub include_version: bool,
    /// Stack version string used when `include_version` is set
    pub stack_version: &'a str,
    /// GPU architecture tag for gfx-arch-specific packages
    pub gfx_target: Option<&'a str>,
}

/// The loaded package list with a name index
#[derive(Debug, Clone)]
pub struct PackageSet {
    packages: Vec<PackageMeta>,
    index: BTreeMap<String, usize>,
}

impl PackageSet {
    /// Load a package list from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read package list {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
            .map_err(|e| Error::ConfigError(format!("In package list {}: {e}", path.display())))
    }

    /// Parse a package list from a JSON string
    pub fn from_json(contents: &str) -> Result<Self> {
        let packages: Vec<PackageMeta> = serde_json::from_str(contents)
            .map_err(|e| Error::ConfigError(format!("Malformed package list JSON: {e}")))?;
        Ok(Self::from_packages(packages))
    }

    /// Build a set from already-constructed metadata
    pub fn from_packages(packages: Vec<PackageMeta>) -> Self {
        let index = packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self { packages, index }
    }

    /// Every loaded package, in file order
    pub fn all(&self) -> &[PackageMeta] {
        &self.packages
    }

    /// Packages with the composite flag set
    pub fn composite(&self) -> Vec<&PackageMeta> {
        self.packages.iter().filter(|p| p.composite).collect()
    }

    /// Packages without the composite flag
    pub fn non_composite(&self) -> Vec<&PackageMeta> {
        self.packages.iter().filter(|p| !p.composite).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PackageMeta> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Install-time name for a single package
    ///
    /// Base name (with the Debian `-devel` to `-dev` rewrite), then the
    /// stack version suffix, then the GPU architecture tag for
    /// gfx-arch-specific non-devel packages.
    pub fn installable_name(&self, package: &PackageMeta, opts: &NameOptions) -> String {
        let mut name = package.name.clone();
        if opts.os_family == OsFamily::Debian {
            if let Some(base) = name.strip_suffix("-devel") {
                name = format!("{base}-dev");
            }
        }
        if opts.include_version {
            name.push_str(opts.stack_version);
        }
        if package.gfxarch && !package.is_devel() {
            if let Some(gfx) = opts.gfx_target {
                name = format!("{name}-{gfx}");
            }
        }
        name
    }

    /// Install-time names for a package's valid dependencies
    ///
    /// Dependency names not present in the loaded set are dropped, not
    /// errors: dependency lists are shared across OS families with
    /// different package name availability.
    pub fn derive_package_names(&self, package: &PackageMeta, opts: &NameOptions) -> Vec<String> {
        let mut names = Vec::new();
        for dep in package.deps_for(opts.os_family) {
            match self.get(dep) {
                Some(dep_package) => names.push(self.installable_name(dep_package, opts)),
                None => {
                    debug!(
                        "Dropping dependency '{}' of '{}': not in the loaded package set",
                        dep, package.name
                    );
                }
            }
        }
        names
    }
}
