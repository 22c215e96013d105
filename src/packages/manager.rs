// src/packages/manager.rs

//! OS package-manager orchestration
//!
//! Drives `apt-get` / `dnf` / `zypper` over a dependency-sorted package
//! list: install walks the order forward, uninstall walks it in reverse so
//! dependents are removed before their dependencies. The continue-vs-abort
//! policy on command failure is an explicit parameter, not an accident of
//! the call site.

use std::process::Command;
use strum_macros::{Display, EnumString};
use tracing::{debug, info, warn};

use super::metadata::{NameOptions, PackageMeta, PackageSet};
use crate::error::{Error, Result};

/// OS families with distinct package ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Debian,
    Rhel,
    Suse,
}

/// Detect the host OS family from `/etc/os-release`
pub fn detect_os_family() -> Result<OsFamily> {
    let contents = std::fs::read_to_string("/etc/os-release")
        .map_err(|e| Error::UnsupportedPlatform(format!("Cannot read /etc/os-release: {e}")))?;
    parse_os_release(&contents)
}

/// Classify an os-release document by its `ID` and `ID_LIKE` fields
pub fn parse_os_release(contents: &str) -> Result<OsFamily> {
    let mut ids = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if let Some(value) = line
            .strip_prefix("ID=")
            .or_else(|| line.strip_prefix("ID_LIKE="))
        {
            let value = value.trim_matches('"');
            ids.extend(value.split_whitespace().map(str::to_ascii_lowercase));
        }
    }

    for id in &ids {
        match id.as_str() {
            "debian" | "ubuntu" => return Ok(OsFamily::Debian),
            "rhel" | "fedora" | "centos" | "almalinux" | "rocky" => return Ok(OsFamily::Rhel),
            "suse" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" => {
                return Ok(OsFamily::Suse)
            }
            _ => {}
        }
    }

    Err(Error::UnsupportedPlatform(format!(
        "No supported package manager for OS id(s): {}",
        if ids.is_empty() {
            "<none>".to_string()
        } else {
            ids.join(", ")
        }
    )))
}

/// Runs package-manager commands
///
/// A seam for tests: the orchestrator never shells out directly, so test
/// runs record invocations instead of touching the system.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Executes commands on the host system
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()> {
        debug!("Running: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::CommandFailed(format!("Failed to run {program}: {e}")))?;

        if !output.status.success() {
            return Err(Error::CommandFailed(format!(
                "{program} {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// A resolved package manager binary for one OS family
#[derive(Debug, Clone)]
pub struct PackageManager {
    family: OsFamily,
    program: String,
}

impl PackageManager {
    /// Resolve the manager binary for a family via PATH lookup
    ///
    /// A missing binary is a hard unsupported-platform failure, not a skip.
    pub fn for_family(family: OsFamily) -> Result<Self> {
        let candidates: &[&str] = match family {
            OsFamily::Debian => &["apt-get"],
            OsFamily::Rhel => &["dnf", "yum"],
            OsFamily::Suse => &["zypper"],
        };

        for candidate in candidates {
            if which::which(candidate).is_ok() {
                return Ok(Self {
                    family,
                    program: (*candidate).to_string(),
                });
            }
        }

        Err(Error::UnsupportedPlatform(format!(
            "None of [{}] found on PATH for {family}",
            candidates.join(", ")
        )))
    }

    /// Detect the host family and resolve its manager
    pub fn detect() -> Result<Self> {
        Self::for_family(detect_os_family()?)
    }

    /// Construct with an explicit program, bypassing PATH lookup
    pub fn with_program(family: OsFamily, program: impl Into<String>) -> Self {
        Self {
            family,
            program: program.into(),
        }
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument vector to install one package
    pub fn install_args(&self, package_name: &str) -> Vec<String> {
        match self.family {
            OsFamily::Debian => vec!["install".into(), "-y".into(), package_name.into()],
            OsFamily::Rhel => vec!["install".into(), "-y".into(), package_name.into()],
            OsFamily::Suse => vec![
                "--non-interactive".into(),
                "install".into(),
                package_name.into(),
            ],
        }
    }

    /// Argument vector to remove one package
    pub fn remove_args(&self, package_name: &str) -> Vec<String> {
        match self.family {
            OsFamily::Debian => vec!["remove".into(), "-y".into(), package_name.into()],
            OsFamily::Rhel => vec!["remove".into(), "-y".into(), package_name.into()],
            OsFamily::Suse => vec![
                "--non-interactive".into(),
                "remove".into(),
                package_name.into(),
            ],
        }
    }
}

/// What to do when a package-manager command fails mid-walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure
    FailFast,
    /// Attempt every package and report failures in aggregate
    Continue,
}

/// Walks sorted package lists driving the package manager
pub struct Orchestrator<'a> {
    manager: PackageManager,
    runner: &'a dyn CommandRunner,
    policy: FailurePolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        manager: PackageManager,
        runner: &'a dyn CommandRunner,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            manager,
            runner,
            policy,
        }
    }

    /// Install packages in dependency order
    ///
    /// `sorted` must already be in install order (dependencies first); the
    /// OS package manager enforces dependency presence, so order is part of
    /// the contract, not an optimization.
    pub fn install(
        &self,
        sorted: &[PackageMeta],
        set: &PackageSet,
        opts: &NameOptions,
    ) -> Result<()> {
        self.walk("install", sorted.iter(), set, opts, |name| {
            self.manager.install_args(name)
        })
    }

    /// Remove packages in reverse dependency order (dependents first)
    pub fn uninstall(
        &self,
        sorted: &[PackageMeta],
        set: &PackageSet,
        opts: &NameOptions,
    ) -> Result<()> {
        self.walk("remove", sorted.iter().rev(), set, opts, |name| {
            self.manager.remove_args(name)
        })
    }

    fn walk<'p>(
        &self,
        action: &str,
        packages: impl Iterator<Item = &'p PackageMeta>,
        set: &PackageSet,
        opts: &NameOptions,
        args_for: impl Fn(&str) -> Vec<String>,
    ) -> Result<()> {
        let mut failures = Vec::new();
        let mut total = 0;

        for package in packages {
            total += 1;
            let name = set.installable_name(package, opts);
            info!("{} {}", action, name);
            match self.runner.run(self.manager.program(), &args_for(&name)) {
                Ok(()) => {}
                Err(e) => {
                    warn!("{} {} failed: {}", action, name, e);
                    if self.policy == FailurePolicy::FailFast {
                        return Err(e);
                    }
                    failures.push(format!("  {name}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PackageBatchFailed {
                failed: failures.len(),
                total,
                details: failures.join("\n"),
            })
        }
    }
}
