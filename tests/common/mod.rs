// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stagekit::packages::PackageSet;
use stagekit::topology::Topology;

/// Topology used across the integration tests: a foundation stage feeding
/// compilers, math libraries, and a framework layer.
pub const SAMPLE_TOPOLOGY: &str = r#"
[stages.foundation]
kind = "build"
description = "Base runtime and support libraries"
inbound = []
artifacts = ["core-lib"]

[stages.compilers]
kind = "build"
description = "Device compiler toolchain"
inbound = ["foundation"]
artifacts = ["device-compiler"]

[stages.math-libs]
kind = "build"
description = "Dense and sparse math libraries"
inbound = ["foundation"]
artifacts = ["blas-lib"]

[stages.frameworks]
kind = "build"
description = "Framework integration shims"
inbound = ["math-libs", "compilers"]
artifacts = ["framework-shim"]

[artifacts.core-lib]
feature = "CORE"
gfx-arch-specific = false

[artifacts.device-compiler]
feature = "COMPILER"
gfx-arch-specific = false

[artifacts.blas-lib]
feature = "BLAS"
gfx-arch-specific = true

[artifacts.framework-shim]
feature = "FRAMEWORKS"
gfx-arch-specific = false
"#;

/// Package list mirroring the shape of the shipped packages.json.
pub const SAMPLE_PACKAGES: &str = r#"[
  {"Package": "rocm-core", "Version": "6.4.0", "Composite": "no",
   "DEBDepends": ["libc6"], "RPMRequires": ["glibc"],
   "Artifact": "core-lib", "Artifact_Subdir": "lib"},
  {"Package": "rocblas", "Version": "6.4.0", "Composite": "no", "Gfxarch": true,
   "DEBDepends": ["rocm-core"], "RPMRequires": ["rocm-core"],
   "Artifact": "blas-lib", "Artifact_Subdir": "lib"},
  {"Package": "rocm-full", "Version": "6.4.0", "Composite": "yes",
   "DEBDepends": ["rocm-core", "rocblas"], "RPMRequires": ["rocm-core", "rocblas"]}
]"#;

/// Parse the shared sample topology.
#[allow(dead_code)]
pub fn sample_topology() -> Topology {
    Topology::from_doc(stagekit::topology::parse_doc(SAMPLE_TOPOLOGY).unwrap()).unwrap()
}

/// Parse the shared sample package list.
#[allow(dead_code)]
pub fn sample_package_set() -> PackageSet {
    PackageSet::from_json(SAMPLE_PACKAGES).unwrap()
}

/// Write the sample topology to disk and return its path.
///
/// Returns (TempDir, path) - keep the TempDir alive to prevent cleanup.
#[allow(dead_code)]
pub fn write_sample_topology() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("topology.toml");
    std::fs::write(&path, SAMPLE_TOPOLOGY).unwrap();
    (temp_dir, path)
}

/// Create a build tree with one populated subdirectory per unit name.
///
/// Each subdirectory gets a small payload file whose content embeds the
/// unit name, so round-trip tests can verify byte-identical extraction.
#[allow(dead_code)]
pub fn make_build_tree(root: &Path, unit_dirs: &[&str]) {
    for unit in unit_dirs {
        let dir = root.join(unit).join("lib");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("payload.so"), format!("payload for {unit}")).unwrap();
        std::fs::write(root.join(unit).join("manifest.txt"), format!("{unit} 6.4.0")).unwrap();
    }
}
