// src/progress.rs

//! Transfer progress reporting
//!
//! Reporting is an injected trait rather than a process-wide singleton so
//! the transfer engine can run silently under test and with progress bars
//! interactively. Implementations must be thread-safe: the engine reports
//! from rayon worker threads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

/// Per-unit and per-batch reporting for parallel artifact transfers
pub trait TransferReporter: Send + Sync {
    /// A batch of `total` transfer units is starting
    fn batch_started(&self, action: &str, total: usize);

    /// A unit began transferring
    fn unit_started(&self, unit: &str);

    /// A unit completed successfully
    fn unit_finished(&self, unit: &str);

    /// A unit was skipped (already present locally)
    fn unit_skipped(&self, unit: &str);

    /// A unit failed terminally (retries exhausted or blob missing)
    fn unit_failed(&self, unit: &str, error: &str);

    /// All units have completed
    fn batch_finished(&self, succeeded: usize, skipped: usize, failed: usize);
}

/// No-op reporter for tests and scripted usage
#[derive(Debug, Default)]
pub struct SilentReporter;

impl SilentReporter {
    pub fn new() -> Self {
        Self
    }
}

impl TransferReporter for SilentReporter {
    fn batch_started(&self, _action: &str, _total: usize) {}
    fn unit_started(&self, _unit: &str) {}
    fn unit_finished(&self, _unit: &str) {}
    fn unit_skipped(&self, _unit: &str) {}
    fn unit_failed(&self, _unit: &str, _error: &str) {}
    fn batch_finished(&self, _succeeded: usize, _skipped: usize, _failed: usize) {}
}

/// Reporter that logs through tracing, for non-interactive environments
#[derive(Debug, Default)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl TransferReporter for LogReporter {
    fn batch_started(&self, action: &str, total: usize) {
        info!("{} {} artifacts", action, total);
    }

    fn unit_started(&self, unit: &str) {
        info!("{}: started", unit);
    }

    fn unit_finished(&self, unit: &str) {
        info!("{}: done", unit);
    }

    fn unit_skipped(&self, unit: &str) {
        info!("{}: already present, skipped", unit);
    }

    fn unit_failed(&self, unit: &str, error: &str) {
        warn!("{}: FAILED: {}", unit, error);
    }

    fn batch_finished(&self, succeeded: usize, skipped: usize, failed: usize) {
        if failed > 0 {
            warn!(
                "batch complete: {} succeeded, {} skipped, {} failed",
                succeeded, skipped, failed
            );
        } else {
            info!("batch complete: {} succeeded, {} skipped", succeeded, skipped);
        }
    }
}

/// Interactive reporter drawing one spinner per in-flight unit plus an
/// overall bar
pub struct BarReporter {
    multi: MultiProgress,
    overall: Mutex<Option<ProgressBar>>,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: Mutex::new(None),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn overall_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("Total: [{bar:40.green/dim}] {pos}/{len} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("=>-")
    }

    fn unit_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Invalid spinner template")
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferReporter for BarReporter {
    fn batch_started(&self, action: &str, total: usize) {
        let overall = ProgressBar::new(total as u64);
        overall.set_style(Self::overall_style());
        overall.set_message(action.to_string());
        let overall = self.multi.add(overall);
        *self.overall.lock().expect("progress lock poisoned") = Some(overall);
    }

    fn unit_started(&self, unit: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::unit_style());
        pb.set_message(unit.to_string());
        let pb = self.multi.add(pb);
        self.bars
            .lock()
            .expect("progress lock poisoned")
            .insert(unit.to_string(), pb);
    }

    fn unit_finished(&self, unit: &str) {
        if let Some(pb) = self.bars.lock().expect("progress lock poisoned").remove(unit) {
            pb.finish_with_message(format!("{unit} [done]"));
        }
        if let Some(overall) = self.overall.lock().expect("progress lock poisoned").as_ref() {
            overall.inc(1);
        }
    }

    fn unit_skipped(&self, unit: &str) {
        if let Some(overall) = self.overall.lock().expect("progress lock poisoned").as_ref() {
            overall.inc(1);
        }
        info!("{}: already present, skipped", unit);
    }

    fn unit_failed(&self, unit: &str, error: &str) {
        if let Some(pb) = self.bars.lock().expect("progress lock poisoned").remove(unit) {
            pb.abandon_with_message(format!("{unit} [FAILED: {error}]"));
        }
        if let Some(overall) = self.overall.lock().expect("progress lock poisoned").as_ref() {
            overall.inc(1);
        }
    }

    fn batch_finished(&self, succeeded: usize, skipped: usize, failed: usize) {
        if let Some(overall) = self.overall.lock().expect("progress lock poisoned").take() {
            if failed > 0 {
                overall.finish_with_message(format!(
                    "{succeeded} succeeded, {skipped} skipped, {failed} failed"
                ));
            } else {
                overall.finish_with_message(format!("{succeeded} succeeded, {skipped} skipped"));
            }
        }
    }
}
