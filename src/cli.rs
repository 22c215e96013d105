// src/cli.rs
//! CLI definitions for stagekit
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "stagekit")]
#[command(author = "Stagekit Project")]
#[command(version)]
#[command(about = "Stage-aware artifact staging and packaging for multi-stage GPU builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a stage's inbound artifacts into a build tree
    Fetch {
        /// Stage whose inbound artifact set to fetch
        #[arg(short, long)]
        stage: String,

        /// GPU families to fetch gfx-arch-specific artifacts for
        #[arg(long, value_delimiter = ',', alias = "amdgpu-families")]
        gpu_families: Vec<String>,

        /// Pipeline run id (or set STAGEKIT_RUN_ID)
        #[arg(long)]
        run_id: Option<String>,

        /// Platform override (default: host os-arch)
        #[arg(long)]
        platform: Option<String>,

        /// Directory to extract artifacts into
        #[arg(short, long)]
        output_dir: String,

        /// Path to the topology description
        #[arg(short, long, default_value = "topology.toml")]
        topology: String,

        /// Worker pool size (default: available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Log transfers instead of drawing progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Pack and upload a stage's produced artifacts
    Push {
        /// Stage whose produced artifact set to push
        #[arg(short, long)]
        stage: String,

        /// GPU families to push gfx-arch-specific artifacts for
        #[arg(long, value_delimiter = ',', alias = "amdgpu-families")]
        gpu_families: Vec<String>,

        /// Pipeline run id (or set STAGEKIT_RUN_ID)
        #[arg(long)]
        run_id: Option<String>,

        /// Platform override (default: host os-arch)
        #[arg(long)]
        platform: Option<String>,

        /// Build tree holding one subdirectory per artifact
        #[arg(short, long)]
        build_dir: String,

        /// Path to the topology description
        #[arg(short, long, default_value = "topology.toml")]
        topology: String,

        /// Worker pool size (default: available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Log transfers instead of drawing progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// List a stage's required and produced artifacts without any I/O
    Info {
        /// Stage to describe
        #[arg(short, long)]
        stage: String,

        /// GPU families to expand gfx-arch-specific artifacts for
        #[arg(long, value_delimiter = ',', alias = "amdgpu-families")]
        gpu_families: Vec<String>,

        /// Path to the topology description
        #[arg(short, long, default_value = "topology.toml")]
        topology: String,
    },

    /// List all stages in the topology
    List {
        /// Path to the topology description
        #[arg(short, long, default_value = "topology.toml")]
        topology: String,
    },

    /// Print the dependency-resolved package install order
    Order {
        /// Path to the package list
        #[arg(short, long, default_value = "packages.json")]
        package_list: String,

        /// Restrict to composite packages
        #[arg(long, conflicts_with = "non_composite")]
        composite: bool,

        /// Restrict to non-composite packages
        #[arg(long)]
        non_composite: bool,

        /// OS family override: debian, rhel, or suse (default: detect)
        #[arg(long)]
        os_family: Option<String>,
    },

    /// Install packages in dependency order
    Install {
        /// Path to the package list
        #[arg(short, long, default_value = "packages.json")]
        package_list: String,

        /// Restrict to composite packages
        #[arg(long, conflicts_with = "non_composite")]
        composite: bool,

        /// Restrict to non-composite packages
        #[arg(long)]
        non_composite: bool,

        /// Append this stack version to installable package names
        #[arg(long)]
        stack_version: Option<String>,

        /// GPU architecture tag for gfx-arch-specific packages
        #[arg(long)]
        gfx_target: Option<String>,

        /// OS family override: debian, rhel, or suse (default: detect)
        #[arg(long)]
        os_family: Option<String>,

        /// Keep installing after a package-manager failure
        #[arg(long)]
        keep_going: bool,

        /// Show what would be installed without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove packages in reverse dependency order
    Uninstall {
        /// Path to the package list
        #[arg(short, long, default_value = "packages.json")]
        package_list: String,

        /// Restrict to composite packages
        #[arg(long, conflicts_with = "non_composite")]
        composite: bool,

        /// Restrict to non-composite packages
        #[arg(long)]
        non_composite: bool,

        /// Append this stack version to installable package names
        #[arg(long)]
        stack_version: Option<String>,

        /// GPU architecture tag for gfx-arch-specific packages
        #[arg(long)]
        gfx_target: Option<String>,

        /// OS family override: debian, rhel, or suse (default: detect)
        #[arg(long)]
        os_family: Option<String>,

        /// Stop at the first package-manager failure
        #[arg(long)]
        fail_fast: bool,

        /// Show what would be removed without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
