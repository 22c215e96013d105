// src/lib.rs

//! Stagekit
//!
//! Stage-aware artifact staging and packaging toolkit for a multi-component
//! GPU software stack.
//!
//! # Architecture
//!
//! - Topology-first: a declarative stage/artifact graph answers what each
//!   pipeline stage produces and needs
//! - Independent transfers: every (artifact, GPU family) pair fetches and
//!   pushes on its own, in parallel, with per-unit retry
//! - Read-only package model: the package list loads fresh per invocation;
//!   ordering comes from a deterministic topological sort
//! - Backend-agnostic staging: local directory or object storage, selected
//!   by environment toggle

pub mod config;
mod error;
pub mod packages;
pub mod progress;
pub mod topology;
pub mod transfer;

pub use config::Config;
pub use error::{Error, Result};
pub use packages::{
    sort_packages_by_dependencies, CommandRunner, FailurePolicy, NameOptions, Orchestrator,
    OsFamily, PackageGraph, PackageManager, PackageMeta, PackageSet, SystemRunner,
};
pub use progress::{BarReporter, LogReporter, SilentReporter, TransferReporter};
pub use topology::{Artifact, Stage, StageKind, Topology};
pub use transfer::{
    artifact_key, store_from_env, ArtifactStore, BatchSummary, LocalStore, S3Store,
    StageTransferInfo, TransferEngine, TransferUnit, GENERIC_FAMILY,
};
