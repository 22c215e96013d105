// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging (default: info level, override with RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Fetch {
            stage,
            gpu_families,
            run_id,
            platform,
            output_dir,
            topology,
            jobs,
            no_progress,
        }) => commands::cmd_fetch(
            &stage,
            &gpu_families,
            run_id.as_deref(),
            platform.as_deref(),
            &output_dir,
            &topology,
            jobs,
            no_progress,
        ),
        Some(Commands::Push {
            stage,
            gpu_families,
            run_id,
            platform,
            build_dir,
            topology,
            jobs,
            no_progress,
        }) => commands::cmd_push(
            &stage,
            &gpu_families,
            run_id.as_deref(),
            platform.as_deref(),
            &build_dir,
            &topology,
            jobs,
            no_progress,
        ),
        Some(Commands::Info {
            stage,
            gpu_families,
            topology,
        }) => commands::cmd_info(&stage, &gpu_families, &topology),
        Some(Commands::List { topology }) => commands::cmd_list(&topology),
        Some(Commands::Order {
            package_list,
            composite,
            non_composite,
            os_family,
        }) => commands::cmd_order(&package_list, composite, non_composite, os_family.as_deref()),
        Some(Commands::Install {
            package_list,
            composite,
            non_composite,
            stack_version,
            gfx_target,
            os_family,
            keep_going,
            dry_run,
        }) => commands::cmd_install(
            &package_list,
            composite,
            non_composite,
            stack_version.as_deref(),
            gfx_target.as_deref(),
            os_family.as_deref(),
            keep_going,
            dry_run,
        ),
        Some(Commands::Uninstall {
            package_list,
            composite,
            non_composite,
            stack_version,
            gfx_target,
            os_family,
            fail_fast,
            dry_run,
        }) => commands::cmd_uninstall(
            &package_list,
            composite,
            non_composite,
            stack_version.as_deref(),
            gfx_target.as_deref(),
            os_family.as_deref(),
            fail_fast,
            dry_run,
        ),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "stagekit",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        None => {
            println!("stagekit v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'stagekit --help' for usage");
            Ok(())
        }
    }
}
