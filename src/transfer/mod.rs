// src/transfer/mod.rs

//! Parallel artifact transfer engine
//!
//! Moves artifact archives between a build tree and a storage backend.
//! Every (artifact, GPU family) pair is an independent unit of work: units
//! run concurrently on a rayon pool, one unit's failure never cancels its
//! siblings, and the batch reports an aggregate error only after every
//! unit has completed. Re-fetching a unit that is already extracted
//! locally is a skip, not an error, so interrupted CI runs can simply be
//! re-run.

pub mod archive;
pub mod backend;

pub use archive::{extract_archive, extract_archive_atomic, pack_directory, ArchiveFormat};
pub use backend::{store_from_env, ArtifactStore, LocalStore, S3Store};

use rayon::prelude::*;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::progress::TransferReporter;
use crate::topology::Topology;

/// Family slot for artifacts that are not GPU-architecture-specific
pub const GENERIC_FAMILY: &str = "generic";

/// Archive suffix for stored artifact blobs
pub const ARCHIVE_SUFFIX: &str = ".tar.xz";

/// Attempts per transfer before a failure is terminal
const MAX_TRANSFER_ATTEMPTS: u32 = 3;

/// Base backoff delay, doubled after each failed attempt
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Storage key for one artifact blob
///
/// `{run_id}-{platform}/{gpu_family}/{artifact}.tar.xz` - reconstructable
/// from its parts alone, so fetch and push need no separate index.
pub fn artifact_key(run_id: &str, platform: &str, family: &str, artifact: &str) -> String {
    format!("{run_id}-{platform}/{family}/{artifact}{ARCHIVE_SUFFIX}")
}

/// One independently transferable (artifact, family) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferUnit {
    pub artifact: String,
    pub family: String,
    /// Storage key of the blob
    pub key: String,
    /// Unique subdirectory name in the build/output tree
    pub dir_name: String,
}

/// Pure description of a stage's transfer surface
#[derive(Debug, Clone)]
pub struct StageTransferInfo {
    pub stage: String,
    /// Units the stage produces (push targets)
    pub produced: Vec<TransferUnit>,
    /// Units the stage needs as prebuilt inputs (fetch targets)
    pub required: Vec<TransferUnit>,
}

/// Counts for a completed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
}

enum UnitStatus {
    Done,
    Skipped,
}

/// Expand artifact names into transfer units
///
/// GPU-architecture-specific artifacts get one unit per requested family;
/// everything else occupies the generic slot exactly once.
fn expand_units<'n>(
    topology: &Topology,
    run_id: &str,
    platform: &str,
    artifacts: impl IntoIterator<Item = &'n String>,
    families: &[String],
) -> Result<Vec<TransferUnit>> {
    let mut units = Vec::new();
    for name in artifacts {
        let artifact = topology.artifact(name)?;
        if artifact.gfx_arch_specific {
            if families.is_empty() {
                warn!("Artifact '{}' is gfx-arch-specific but no GPU families were requested", name);
            }
            for family in families {
                units.push(make_unit(run_id, platform, name, family));
            }
        } else {
            units.push(make_unit(run_id, platform, name, GENERIC_FAMILY));
        }
    }
    Ok(units)
}

fn make_unit(run_id: &str, platform: &str, artifact: &str, family: &str) -> TransferUnit {
    let dir_name = if family == GENERIC_FAMILY {
        artifact.to_string()
    } else {
        format!("{artifact}_{family}")
    };
    TransferUnit {
        artifact: artifact.to_string(),
        family: family.to_string(),
        key: artifact_key(run_id, platform, family, artifact),
        dir_name,
    }
}

/// Describe a stage's transfer surface - a pure query, no backend involved
pub fn plan_stage(
    topology: &Topology,
    run_id: &str,
    platform: &str,
    stage: &str,
    families: &[String],
) -> Result<StageTransferInfo> {
    let produced = topology.produced_artifacts(stage)?;
    let required = topology.inbound_artifacts(stage)?;
    Ok(StageTransferInfo {
        stage: stage.to_string(),
        produced: expand_units(topology, run_id, platform, &produced, families)?,
        required: expand_units(topology, run_id, platform, &required, families)?,
    })
}

/// Fetches and pushes a stage's artifact set through a storage backend
pub struct TransferEngine<'a> {
    topology: &'a Topology,
    store: &'a dyn ArtifactStore,
    reporter: &'a dyn TransferReporter,
    run_id: String,
    platform: String,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        topology: &'a Topology,
        store: &'a dyn ArtifactStore,
        reporter: &'a dyn TransferReporter,
        run_id: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            topology,
            store,
            reporter,
            run_id: run_id.into(),
            platform: platform.into(),
        }
    }

    fn units_for<'n>(
        &self,
        artifacts: impl IntoIterator<Item = &'n String>,
        families: &[String],
    ) -> Result<Vec<TransferUnit>> {
        expand_units(self.topology, &self.run_id, &self.platform, artifacts, families)
    }

    /// List a stage's transfer surface without performing any I/O
    pub fn info(&self, stage: &str, families: &[String]) -> Result<StageTransferInfo> {
        plan_stage(self.topology, &self.run_id, &self.platform, stage, families)
    }

    /// Fetch and extract every inbound artifact of a stage
    ///
    /// Units already extracted under `output_dir` are skipped. A missing
    /// remote blob is a hard per-unit failure: the downstream build cannot
    /// proceed without a declared dependency.
    pub fn fetch(&self, stage: &str, families: &[String], output_dir: &Path) -> Result<BatchSummary> {
        let required = self.topology.inbound_artifacts(stage)?;
        let units = self.units_for(&required, families)?;
        std::fs::create_dir_all(output_dir)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", output_dir.display())))?;
        self.run_batch("fetch", &units, |unit| self.fetch_unit(unit, output_dir))
    }

    /// Pack and upload every artifact a stage produced
    pub fn push(&self, stage: &str, families: &[String], build_dir: &Path) -> Result<BatchSummary> {
        let produced = self.topology.produced_artifacts(stage)?;
        let units = self.units_for(&produced, families)?;
        self.run_batch("push", &units, |unit| self.push_unit(unit, build_dir))
    }

    fn fetch_unit(&self, unit: &TransferUnit, output_dir: &Path) -> Result<UnitStatus> {
        let final_dir = output_dir.join(&unit.dir_name);
        if final_dir.exists() {
            debug!("{} already extracted, skipping", unit.dir_name);
            return Ok(UnitStatus::Skipped);
        }

        let blob = tempfile::Builder::new()
            .prefix(".")
            .suffix(ARCHIVE_SUFFIX)
            .tempfile_in(output_dir)
            .map_err(|e| Error::IoError(format!("Failed to create temp file: {e}")))?;

        self.with_retry(&unit.key, || self.store.get(&unit.key, blob.path()))?;
        extract_archive_atomic(blob.path(), &final_dir)?;
        Ok(UnitStatus::Done)
    }

    fn push_unit(&self, unit: &TransferUnit, build_dir: &Path) -> Result<UnitStatus> {
        let source_dir = build_dir.join(&unit.dir_name);
        if !source_dir.is_dir() {
            return Err(Error::TransferError(format!(
                "No build output at {} for artifact '{}'",
                source_dir.display(),
                unit.artifact
            )));
        }

        let blob = tempfile::Builder::new()
            .prefix(".")
            .suffix(ARCHIVE_SUFFIX)
            .tempfile()
            .map_err(|e| Error::IoError(format!("Failed to create temp file: {e}")))?;
        pack_directory(&source_dir, blob.path())?;

        self.with_retry(&unit.key, || self.store.put(&unit.key, blob.path()))?;
        Ok(UnitStatus::Done)
    }

    /// Run `op` for every unit concurrently and fail together
    ///
    /// Collects a per-unit result; sibling transfers keep running after a
    /// failure, and the aggregate error is raised only once all units have
    /// completed.
    fn run_batch(
        &self,
        action: &str,
        units: &[TransferUnit],
        op: impl Fn(&TransferUnit) -> Result<UnitStatus> + Sync,
    ) -> Result<BatchSummary> {
        self.reporter.batch_started(action, units.len());

        let results: Vec<(String, Result<UnitStatus>)> = units
            .par_iter()
            .map(|unit| {
                self.reporter.unit_started(&unit.dir_name);
                let result = op(unit);
                match &result {
                    Ok(UnitStatus::Done) => self.reporter.unit_finished(&unit.dir_name),
                    Ok(UnitStatus::Skipped) => self.reporter.unit_skipped(&unit.dir_name),
                    Err(e) => self.reporter.unit_failed(&unit.dir_name, &e.to_string()),
                }
                (unit.dir_name.clone(), result)
            })
            .collect();

        let mut summary = BatchSummary::default();
        let mut failures = Vec::new();
        for (name, result) in &results {
            match result {
                Ok(UnitStatus::Done) => summary.succeeded += 1,
                Ok(UnitStatus::Skipped) => summary.skipped += 1,
                Err(e) => failures.push(format!("  {name}: {e}")),
            }
        }
        self.reporter
            .batch_finished(summary.succeeded, summary.skipped, failures.len());

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(Error::TransferBatchFailed {
                failed: failures.len(),
                total: units.len(),
                details: failures.join("\n"),
            })
        }
    }

    /// Retry transient failures with bounded exponential backoff
    ///
    /// `NotFoundError` is terminal immediately: absent blobs do not appear
    /// by retrying.
    fn with_retry(&self, what: &str, op: impl Fn() -> Result<()>) -> Result<()> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e @ Error::NotFoundError(_)) => return Err(e),
                Err(e) if attempt < MAX_TRANSFER_ATTEMPTS => {
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        what, attempt, MAX_TRANSFER_ATTEMPTS, e, delay
                    );
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use crate::topology::parse_doc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn sample_topology() -> Topology {
        Topology::from_doc(
            parse_doc(
                r#"
                [stages.foundation]
                artifacts = ["core-lib"]

                [stages.math-libs]
                inbound = ["foundation"]
                artifacts = ["blas-lib"]

                [artifacts.core-lib]
                feature = "CORE"

                [artifacts.blas-lib]
                feature = "BLAS"
                gfx-arch-specific = true
                "#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn families(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_scheme_is_reconstructable() {
        assert_eq!(
            artifact_key("12345", "linux-x86_64", "gfx942", "blas-lib"),
            "12345-linux-x86_64/gfx942/blas-lib.tar.xz"
        );
    }

    #[test]
    fn test_units_expand_per_family_only_when_gfx_specific() {
        let topology = sample_topology();
        let store = LocalStore::new(tempfile::tempdir().unwrap().path().join("s")).unwrap();
        let reporter = SilentReporter::new();
        let engine = TransferEngine::new(&topology, &store, &reporter, "1", "linux-x86_64");

        let info = engine
            .info("math-libs", &families(&["gfx942", "gfx1100"]))
            .unwrap();
        // blas-lib is gfx-specific: one unit per family
        let produced: Vec<&str> = info.produced.iter().map(|u| u.dir_name.as_str()).collect();
        assert_eq!(produced, vec!["blas-lib_gfx942", "blas-lib_gfx1100"]);
        // core-lib is generic: exactly one unit regardless of family count
        let required: Vec<&str> = info.required.iter().map(|u| u.dir_name.as_str()).collect();
        assert_eq!(required, vec!["core-lib"]);
    }

    #[test]
    fn test_info_performs_no_io() {
        let topology = sample_topology();
        let temp = tempfile::tempdir().unwrap();
        let store_root = temp.path().join("store");
        let store = LocalStore::new(&store_root).unwrap();
        let reporter = SilentReporter::new();
        let engine = TransferEngine::new(&topology, &store, &reporter, "1", "linux-x86_64");

        engine.info("math-libs", &families(&["gfx942"])).unwrap();
        let entries: Vec<_> = std::fs::read_dir(&store_root).unwrap().collect();
        assert!(entries.is_empty(), "info must not touch the store");
    }

    /// Store wrapper that counts get() calls and can fail the first N
    struct FlakyStore {
        inner: LocalStore,
        gets: AtomicU32,
        fail_first: u32,
        failed_so_far: AtomicU32,
    }

    impl FlakyStore {
        fn new(inner: LocalStore, fail_first: u32) -> Self {
            Self {
                inner,
                gets: AtomicU32::new(0),
                fail_first,
                failed_so_far: AtomicU32::new(0),
            }
        }
    }

    impl ArtifactStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }
        fn put(&self, key: &str, source: &Path) -> Result<()> {
            self.inner.put(key, source)
        }
        fn get(&self, key: &str, dest: &Path) -> Result<()> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.failed_so_far.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                return Err(Error::TransferError("simulated network failure".into()));
            }
            self.inner.get(key, dest)
        }
        fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix)
        }
        fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key)
        }
    }

    fn seed_store(store: &dyn ArtifactStore, key: &str) {
        let temp = tempfile::tempdir().unwrap();
        let tree = temp.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("payload.bin"), b"payload").unwrap();
        let archive = temp.path().join("a.tar.xz");
        pack_directory(&tree, &archive).unwrap();
        store.put(key, &archive).unwrap();
    }

    #[test]
    fn test_fetch_retries_transient_failures() {
        let topology = sample_topology();
        let temp = tempfile::tempdir().unwrap();
        let store = FlakyStore::new(LocalStore::new(temp.path().join("store")).unwrap(), 2);
        seed_store(&store.inner, "1-linux-x86_64/generic/core-lib.tar.xz");

        let reporter = SilentReporter::new();
        let engine = TransferEngine::new(&topology, &store, &reporter, "1", "linux-x86_64");
        let out = temp.path().join("out");
        let summary = engine.fetch("math-libs", &families(&[]), &out).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(store.gets.load(Ordering::SeqCst), 3, "two failures then success");
        assert!(out.join("core-lib/payload.bin").exists());
    }

    #[test]
    fn test_missing_blob_is_not_retried() {
        let topology = sample_topology();
        let temp = tempfile::tempdir().unwrap();
        let store = FlakyStore::new(LocalStore::new(temp.path().join("store")).unwrap(), 0);

        let reporter = SilentReporter::new();
        let engine = TransferEngine::new(&topology, &store, &reporter, "1", "linux-x86_64");
        let out = temp.path().join("out");
        let err = engine.fetch("math-libs", &families(&[]), &out).unwrap_err();

        assert_eq!(store.gets.load(Ordering::SeqCst), 1, "no retry for a missing blob");
        match err {
            Error::TransferBatchFailed { failed, total, details } => {
                assert_eq!((failed, total), (1, 1));
                assert!(details.contains("core-lib"), "failure names the artifact: {details}");
            }
            other => panic!("expected TransferBatchFailed, got {other}"),
        }
        assert!(!out.join("core-lib").exists(), "no partial extraction left behind");
    }

    /// Reporter that records per-unit outcomes
    #[derive(Default)]
    struct RecordingReporter {
        finished: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    impl TransferReporter for RecordingReporter {
        fn batch_started(&self, _action: &str, _total: usize) {}
        fn unit_started(&self, _unit: &str) {}
        fn unit_finished(&self, unit: &str) {
            self.finished.lock().unwrap().push(unit.to_string());
        }
        fn unit_skipped(&self, _unit: &str) {}
        fn unit_failed(&self, unit: &str, _error: &str) {
            self.failed.lock().unwrap().push(unit.to_string());
        }
        fn batch_finished(&self, _succeeded: usize, _skipped: usize, _failed: usize) {}
    }

    #[test]
    fn test_one_failure_does_not_cancel_siblings() {
        // Push two gfx families where only one build dir exists
        let topology = sample_topology();
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path().join("store")).unwrap();

        let build = temp.path().join("build");
        std::fs::create_dir_all(build.join("blas-lib_gfx942/lib")).unwrap();
        std::fs::write(build.join("blas-lib_gfx942/lib/libblas.so"), b"so").unwrap();
        // no build output for gfx1100

        let reporter = RecordingReporter::default();
        let engine = TransferEngine::new(&topology, &store, &reporter, "1", "linux-x86_64");
        let err = engine
            .push("math-libs", &families(&["gfx942", "gfx1100"]), &build)
            .unwrap_err();

        assert_eq!(
            reporter.finished.lock().unwrap().as_slice(),
            ["blas-lib_gfx942".to_string()],
            "healthy sibling completes"
        );
        assert_eq!(
            reporter.failed.lock().unwrap().as_slice(),
            ["blas-lib_gfx1100".to_string()]
        );
        assert!(matches!(err, Error::TransferBatchFailed { failed: 1, total: 2, .. }));
        assert!(
            store.exists("1-linux-x86_64/gfx942/blas-lib.tar.xz").unwrap(),
            "successful unit is uploaded despite sibling failure"
        );
    }
}
