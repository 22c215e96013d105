// src/packages/mod.rs

//! Package metadata, dependency ordering, and install/uninstall
//!
//! This module owns the declarative package list, classifies composite vs
//! non-composite packages, orders them by dependency edges, and drives the
//! OS package manager over the result.

pub mod graph;
pub mod manager;
pub mod metadata;

pub use graph::{sort_packages_by_dependencies, PackageGraph};
pub use manager::{
    detect_os_family, parse_os_release, CommandRunner, FailurePolicy, Orchestrator, OsFamily,
    PackageManager, SystemRunner,
};
pub use metadata::{NameOptions, PackageMeta, PackageSet};
