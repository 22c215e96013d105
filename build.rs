// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: topology description path
fn topology_arg() -> Arg {
    Arg::new("topology")
        .short('t')
        .long("topology")
        .value_name("PATH")
        .default_value("topology.toml")
        .help("Path to the topology description")
}

/// Common argument: package list path
fn package_list_arg() -> Arg {
    Arg::new("package_list")
        .short('p')
        .long("package-list")
        .value_name("PATH")
        .default_value("packages.json")
        .help("Path to the package list")
}

fn stage_arg() -> Arg {
    Arg::new("stage")
        .short('s')
        .long("stage")
        .required(true)
        .help("Pipeline stage name")
}

fn gpu_families_arg() -> Arg {
    Arg::new("gpu_families")
        .long("gpu-families")
        .value_delimiter(',')
        .help("GPU families for gfx-arch-specific artifacts")
}

fn run_id_arg() -> Arg {
    Arg::new("run_id")
        .long("run-id")
        .help("Pipeline run id (or set STAGEKIT_RUN_ID)")
}

fn build_cli() -> Command {
    Command::new("stagekit")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Stagekit Contributors")
        .about("Stage-aware artifact staging and packaging for multi-stage GPU builds")
        .subcommand_required(false)
        .subcommand(
            Command::new("fetch")
                .about("Fetch a stage's inbound artifacts into a build tree")
                .arg(stage_arg())
                .arg(gpu_families_arg())
                .arg(run_id_arg())
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .required(true)
                        .help("Directory to extract artifacts into"),
                )
                .arg(topology_arg()),
        )
        .subcommand(
            Command::new("push")
                .about("Pack and upload a stage's produced artifacts")
                .arg(stage_arg())
                .arg(gpu_families_arg())
                .arg(run_id_arg())
                .arg(
                    Arg::new("build_dir")
                        .short('b')
                        .long("build-dir")
                        .required(true)
                        .help("Build tree holding one subdirectory per artifact"),
                )
                .arg(topology_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("List a stage's required and produced artifacts")
                .arg(stage_arg())
                .arg(gpu_families_arg())
                .arg(topology_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List all stages in the topology")
                .arg(topology_arg()),
        )
        .subcommand(
            Command::new("order")
                .about("Print the dependency-resolved package install order")
                .arg(package_list_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages in dependency order")
                .arg(package_list_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Remove packages in reverse dependency order")
                .arg(package_list_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("stagekit.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
