use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};

mod config;
mod core;
mod error;
mod logging;
mod pipeline;

use crate::config::PipelineConfig;
use crate::core::dataset::IndexArtifacts;
use crate::pipeline::{
    DatasetLayout, IndexTestImages, IndexTrainImages, Pipeline, PipelineContext, RunSummary,
    Stage, StageOutcome,
};

/// Driver for the T-LESS 6D pose estimation pipeline.
#[derive(Debug, Parser)]
#[command(name = "tless-pipeline", version)]
struct Cli {
    /// JSON configuration file. Defaults to the per-user config, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the dataset root directory.
    #[arg(long, global = true)]
    root_dir: Option<PathBuf>,

    /// Override the background image directory.
    #[arg(long, global = true)]
    background_dir: Option<PathBuf>,

    /// Log to stdout only.
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pipeline in its fixed stage order.
    Run {
        /// Run only these stages (order is unchanged).
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    /// Index the training sensors and persist the train/test split.
    Index,
    /// Index the held-out test sensors.
    IndexTest,
    /// Create the per-class output directories.
    Layout,
    /// Reload the persisted split and check it is a partition of the image list.
    Verify,
    /// List stage names in execution order.
    Stages,
    /// Write the default configuration as JSON.
    InitConfig {
        /// Destination. Defaults to the per-user config path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    if let Err(err) = try_main() {
        error!("{:#}", err);
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(!cli.no_log_file).context("failed to set up logging")?;
    info!("Starting T-LESS pipeline driver");

    if let Command::InitConfig { output } = &cli.command {
        let path = match output {
            Some(path) => path.clone(),
            None => PipelineConfig::default_config_path()
                .context("could not determine the per-user config directory")?,
        };
        PipelineConfig::default()
            .save(&path)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Command::Run { only } => {
            let mut ctx = PipelineContext::new(config);
            let reports = Pipeline::standard()
                .run(&mut ctx, &only)
                .context("pipeline run failed")?;
            for report in &reports {
                println!(
                    "{:<28} {:<10} {:>10.2?}",
                    report.name,
                    report.outcome.as_str(),
                    report.elapsed
                );
            }
            println!("{}", RunSummary::new(&reports, &ctx));
        }
        Command::Index => run_single(IndexTrainImages, config)?,
        Command::IndexTest => run_single(IndexTestImages, config)?,
        Command::Layout => run_single(DatasetLayout, config)?,
        Command::Verify => {
            let ctx = PipelineContext::new(config);
            let index = IndexArtifacts::load(&ctx.artifacts).with_context(|| {
                format!("failed to verify artifacts at {}", ctx.artifacts.all_images.display())
            })?;
            println!(
                "ok: {} images, {} train / {} test indices",
                index.images.len(),
                index.split.train.len(),
                index.split.test.len()
            );
        }
        Command::Stages => {
            for (position, name) in Pipeline::standard().names().iter().enumerate() {
                println!("{}. {}", position + 1, name);
            }
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config =
        PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(root_dir) = &cli.root_dir {
        config.root_dir = root_dir.clone();
    }
    if let Some(background_dir) = &cli.background_dir {
        config.background_dir = background_dir.clone();
    }
    config.validate().context("invalid configuration")?;
    info!("Dataset root: {:?}", config.root_dir);
    Ok(config)
}

fn run_single(stage: impl Stage, config: PipelineConfig) -> anyhow::Result<()> {
    let mut ctx = PipelineContext::new(config);
    let outcome = stage
        .run(&mut ctx)
        .with_context(|| format!("stage {} failed", stage.name()))?;
    match outcome {
        StageOutcome::Completed { summary } => println!("{}: {}", stage.name(), summary),
        StageOutcome::Skipped { reason } => println!("{}: skipped ({})", stage.name(), reason),
    }
    Ok(())
}
