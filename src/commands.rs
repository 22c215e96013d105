// src/commands.rs
//! Command handlers for the stagekit CLI

use anyhow::Result;
use std::path::Path;
use tracing::info;

use stagekit::packages::{
    detect_os_family, sort_packages_by_dependencies, FailurePolicy, NameOptions, Orchestrator,
    OsFamily, PackageManager, PackageMeta, PackageSet, SystemRunner,
};
use stagekit::progress::{BarReporter, LogReporter, TransferReporter};
use stagekit::topology::Topology;
use stagekit::transfer::{store_from_env, TransferEngine};
use stagekit::Config;

/// Fetch a stage's inbound artifacts into a build tree
#[allow(clippy::too_many_arguments)]
pub fn cmd_fetch(
    stage: &str,
    gpu_families: &[String],
    run_id: Option<&str>,
    platform: Option<&str>,
    output_dir: &str,
    topology_path: &str,
    jobs: Option<usize>,
    no_progress: bool,
) -> Result<()> {
    let topology = Topology::load(Path::new(topology_path))?;
    let config = Config::from_env();
    let run_id = config.resolve_run_id(run_id).ok_or_else(|| {
        anyhow::anyhow!("A run id is required: pass --run-id or set STAGEKIT_RUN_ID")
    })?;
    let platform = config.resolve_platform(platform);
    let store = store_from_env(&config)?;
    configure_pool(jobs)?;

    info!("Fetching inbound artifacts for stage '{}' (run {})", stage, run_id);
    let reporter = make_reporter(no_progress);
    let engine = TransferEngine::new(&topology, store.as_ref(), reporter.as_ref(), run_id, platform);
    let summary = engine.fetch(stage, gpu_families, Path::new(output_dir))?;
    println!(
        "Fetched {} artifacts into {} ({} already present)",
        summary.succeeded, output_dir, summary.skipped
    );
    Ok(())
}

/// Pack and upload a stage's produced artifacts
#[allow(clippy::too_many_arguments)]
pub fn cmd_push(
    stage: &str,
    gpu_families: &[String],
    run_id: Option<&str>,
    platform: Option<&str>,
    build_dir: &str,
    topology_path: &str,
    jobs: Option<usize>,
    no_progress: bool,
) -> Result<()> {
    let topology = Topology::load(Path::new(topology_path))?;
    let config = Config::from_env();
    let run_id = config.resolve_run_id(run_id).ok_or_else(|| {
        anyhow::anyhow!("A run id is required: pass --run-id or set STAGEKIT_RUN_ID")
    })?;
    let platform = config.resolve_platform(platform);
    let store = store_from_env(&config)?;
    configure_pool(jobs)?;

    info!("Pushing produced artifacts for stage '{}' (run {})", stage, run_id);
    let reporter = make_reporter(no_progress);
    let engine = TransferEngine::new(&topology, store.as_ref(), reporter.as_ref(), run_id, platform);
    let summary = engine.push(stage, gpu_families, Path::new(build_dir))?;
    println!("Pushed {} artifacts from {}", summary.succeeded, build_dir);
    Ok(())
}

/// Describe a stage's transfer surface without performing I/O
pub fn cmd_info(stage: &str, gpu_families: &[String], topology_path: &str) -> Result<()> {
    let topology = Topology::load(Path::new(topology_path))?;
    let config = Config::from_env();
    let run_id = config.resolve_run_id(None).unwrap_or_else(|| "local".to_string());
    let platform = config.resolve_platform(None);

    let transfer_info =
        stagekit::transfer::plan_stage(&topology, &run_id, &platform, stage, gpu_families)?;
    println!("Stage: {}", transfer_info.stage);
    println!("Required artifacts ({}):", transfer_info.required.len());
    for unit in &transfer_info.required {
        println!("  {}", unit.dir_name);
    }
    println!("Produced artifacts ({}):", transfer_info.produced.len());
    for unit in &transfer_info.produced {
        println!("  {}", unit.dir_name);
    }
    let features = topology.stage_features(stage)?;
    println!("Features: {}", features.into_iter().collect::<Vec<_>>().join(", "));
    Ok(())
}

/// List all stages in the topology
pub fn cmd_list(topology_path: &str) -> Result<()> {
    let topology = Topology::load(Path::new(topology_path))?;
    for name in topology.stage_names() {
        let stage = topology.stage(&name)?;
        println!("{} [{}]", stage.name, stage.kind);
        if !stage.description.is_empty() {
            println!("    {}", stage.description);
        }
        if !stage.inbound.is_empty() {
            println!("    inbound: {}", stage.inbound.join(", "));
        }
        if !stage.artifacts.is_empty() {
            println!("    produces: {}", stage.artifacts.join(", "));
        }
    }
    Ok(())
}

/// Print the dependency-resolved install order
pub fn cmd_order(
    package_list: &str,
    composite: bool,
    non_composite: bool,
    os_family: Option<&str>,
) -> Result<()> {
    let set = PackageSet::load(Path::new(package_list))?;
    let family = resolve_family(os_family)?;
    let subset = select_packages(&set, composite, non_composite);
    let sorted = sort_packages_by_dependencies(&subset, family)?;
    for package in &sorted {
        println!("{}", package.name);
    }
    Ok(())
}

/// Install packages in dependency order
#[allow(clippy::too_many_arguments)]
pub fn cmd_install(
    package_list: &str,
    composite: bool,
    non_composite: bool,
    stack_version: Option<&str>,
    gfx_target: Option<&str>,
    os_family: Option<&str>,
    keep_going: bool,
    dry_run: bool,
) -> Result<()> {
    let set = PackageSet::load(Path::new(package_list))?;
    let family = resolve_family(os_family)?;
    let subset = select_packages(&set, composite, non_composite);
    let sorted = sort_packages_by_dependencies(&subset, family)?;
    let opts = NameOptions {
        os_family: family,
        include_version: stack_version.is_some(),
        stack_version: stack_version.unwrap_or(""),
        gfx_target,
    };

    if dry_run {
        println!("Would install (in order):");
        for package in &sorted {
            println!("  {}", set.installable_name(package, &opts));
        }
        return Ok(());
    }

    let manager = PackageManager::for_family(family)?;
    let runner = SystemRunner::new();
    let policy = if keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::FailFast
    };
    Orchestrator::new(manager, &runner, policy).install(&sorted, &set, &opts)?;
    println!("Installed {} packages", sorted.len());
    Ok(())
}

/// Remove packages in reverse dependency order
#[allow(clippy::too_many_arguments)]
pub fn cmd_uninstall(
    package_list: &str,
    composite: bool,
    non_composite: bool,
    stack_version: Option<&str>,
    gfx_target: Option<&str>,
    os_family: Option<&str>,
    fail_fast: bool,
    dry_run: bool,
) -> Result<()> {
    let set = PackageSet::load(Path::new(package_list))?;
    let family = resolve_family(os_family)?;
    let subset = select_packages(&set, composite, non_composite);
    let sorted = sort_packages_by_dependencies(&subset, family)?;
    let opts = NameOptions {
        os_family: family,
        include_version: stack_version.is_some(),
        stack_version: stack_version.unwrap_or(""),
        gfx_target,
    };

    if dry_run {
        println!("Would remove (in order):");
        for package in sorted.iter().rev() {
            println!("  {}", set.installable_name(package, &opts));
        }
        return Ok(());
    }

    let manager = PackageManager::for_family(family)?;
    let runner = SystemRunner::new();
    let policy = if fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Continue
    };
    Orchestrator::new(manager, &runner, policy).uninstall(&sorted, &set, &opts)?;
    println!("Removed {} packages", sorted.len());
    Ok(())
}

/// Parse an OS family override or detect from the host
fn resolve_family(cli_value: Option<&str>) -> Result<OsFamily> {
    match cli_value {
        Some(value) => value.parse().map_err(|_| {
            anyhow::anyhow!("Unknown OS family '{value}' (expected debian, rhel, or suse)")
        }),
        None => Ok(detect_os_family()?),
    }
}

/// Apply the composite/non-composite subset flags
fn select_packages(set: &PackageSet, composite: bool, non_composite: bool) -> Vec<PackageMeta> {
    if composite {
        set.composite().into_iter().cloned().collect()
    } else if non_composite {
        set.non_composite().into_iter().cloned().collect()
    } else {
        set.all().to_vec()
    }
}

/// Size the rayon pool when --jobs is given
fn configure_pool(jobs: Option<usize>) -> Result<()> {
    if let Some(jobs) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| anyhow::anyhow!("Failed to size worker pool: {e}"))?;
    }
    Ok(())
}

fn make_reporter(no_progress: bool) -> Box<dyn TransferReporter> {
    if no_progress {
        Box::new(LogReporter::new())
    } else {
        Box::new(BarReporter::new())
    }
}
