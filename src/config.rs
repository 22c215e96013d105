// src/config.rs

//! Environment-driven configuration
//!
//! Backend selection and run identification are environment toggles so that
//! local reproduction of a CI run needs no code changes: point
//! `STAGEKIT_STAGING_DIR` at a directory and every fetch/push goes through
//! the local filesystem instead of object storage.

use std::env;
use std::path::PathBuf;

/// Local staging directory override; selects the filesystem backend
pub const ENV_STAGING_DIR: &str = "STAGEKIT_STAGING_DIR";

/// Object storage bucket name
pub const ENV_BUCKET: &str = "STAGEKIT_BUCKET";

/// Object storage region
pub const ENV_REGION: &str = "STAGEKIT_REGION";

/// Custom object storage endpoint (S3-compatible services)
pub const ENV_ENDPOINT: &str = "STAGEKIT_ENDPOINT";

/// Run id override for local reproduction
pub const ENV_RUN_ID: &str = "STAGEKIT_RUN_ID";

/// Platform override for local reproduction
pub const ENV_PLATFORM: &str = "STAGEKIT_PLATFORM";

/// Resolved environment configuration for one invocation
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// When set, the transfer engine uses a local directory backend
    pub staging_dir: Option<PathBuf>,
    /// Object storage bucket (ignored when `staging_dir` is set)
    pub bucket: Option<String>,
    /// Object storage region
    pub region: Option<String>,
    /// Custom S3-compatible endpoint
    pub endpoint: Option<String>,
    /// Run id override
    pub run_id: Option<String>,
    /// Platform override
    pub platform: Option<String>,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self {
            staging_dir: env::var(ENV_STAGING_DIR).ok().map(PathBuf::from),
            bucket: env::var(ENV_BUCKET).ok(),
            region: env::var(ENV_REGION).ok(),
            endpoint: env::var(ENV_ENDPOINT).ok(),
            run_id: env::var(ENV_RUN_ID).ok(),
            platform: env::var(ENV_PLATFORM).ok(),
        }
    }

    /// Resolve the effective run id: CLI value wins, then environment
    pub fn resolve_run_id(&self, cli_value: Option<&str>) -> Option<String> {
        cli_value
            .map(str::to_string)
            .or_else(|| self.run_id.clone())
    }

    /// Resolve the effective platform string
    ///
    /// CLI value wins, then environment, then `{os}-{arch}` from the host.
    pub fn resolve_platform(&self, cli_value: Option<&str>) -> String {
        cli_value
            .map(str::to_string)
            .or_else(|| self.platform.clone())
            .unwrap_or_else(default_platform)
    }
}

/// Default platform identifier, e.g. `linux-x86_64`
pub fn default_platform() -> String {
    format!("{}-{}", env::consts::OS, env::consts::ARCH)
}
