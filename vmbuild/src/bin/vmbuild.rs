use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use vmbuild::logging::init_logging;
use vmbuild::{BuildOptions, ImageBuilder, Manifest};

#[derive(Parser, Debug)]
#[command(name = "vmbuild")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build bootable VM images from a manifest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the ordered task plan for a manifest
    Plan {
        /// Path to the JSON manifest
        manifest: PathBuf,
    },

    /// Build an image and print the JSON report
    Run {
        /// Path to the JSON manifest
        manifest: PathBuf,
        /// Log the plan without running any task
        #[arg(long)]
        dry_run: bool,
        /// Directory build workspaces are created in
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,
        /// Also write logs to DIR/vmbuild.log
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { manifest } => {
            let _guard = init_logging(None)?;
            plan(&manifest)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            manifest,
            dry_run,
            workspace,
            log_dir,
        } => {
            let options = BuildOptions {
                workspace_root: workspace.map(absolute).transpose()?,
                dry_run,
                log_dir: log_dir.map(absolute).transpose()?,
            };
            let _guard = init_logging(options.log_dir.as_deref())?;
            run(&manifest, options).await
        }
    }
}

fn plan(path: &Path) -> anyhow::Result<()> {
    let manifest = Manifest::load(path)?;
    let builder = ImageBuilder::new(BuildOptions::default())?;
    let plan = builder
        .plan(&manifest)
        .with_context(|| format!("failed to plan '{}'", path.display()))?;

    let width = plan
        .tasks()
        .map(|task| task.name().len())
        .max()
        .unwrap_or(0);
    for task in plan.tasks() {
        let descriptor = task.descriptor();
        println!(
            "{:<20} {:<width$} {}",
            descriptor.phase,
            descriptor.id.as_str(),
            descriptor.description,
        );
    }
    Ok(())
}

async fn run(path: &Path, options: BuildOptions) -> anyhow::Result<ExitCode> {
    let manifest = Manifest::load(path)?;
    let builder = ImageBuilder::new(options)?;
    let report = builder
        .build(manifest)
        .await
        .with_context(|| format!("failed to build '{}'", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    if let Err(e) = report.execution.into_result() {
        eprintln!("Error: {e}");
    }
    Ok(ExitCode::FAILURE)
}

fn absolute(path: PathBuf) -> anyhow::Result<PathBuf> {
    std::path::absolute(&path).with_context(|| format!("invalid path '{}'", path.display()))
}
