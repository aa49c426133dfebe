//! CLI for the LLM benchmark metrics pipeline.
//!
//! This crate wires configuration, logging and the pipeline crates into the
//! `llm-metrics` command.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commands;
pub mod config;
pub mod logging;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use llm_metrics_core::RunPeriod;
use llm_metrics_ingest::io::DatasetFormat;
use llm_metrics_storage::DuplicatePolicy;
use std::path::PathBuf;

use crate::commands::Sinks;
use crate::config::AppConfig;

/// LLM benchmark metrics CLI.
#[derive(Parser, Debug)]
#[command(name = "llm-metrics")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true, env = "LLM_METRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Ingestion overrides shared by several commands.
#[derive(Args, Debug, Default)]
pub struct IngestArgs {
    /// Month the run files belong to (YYYY-MM).
    #[arg(long)]
    pub period: Option<RunPeriod>,

    /// Directory to extract the archive into.
    #[arg(long)]
    pub extract_dir: Option<PathBuf>,

    /// Directory to write datasets into.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Dataset format: csv, json or parquet.
    #[arg(short, long)]
    pub format: Option<DatasetFormat>,
}

/// Store overrides shared by several commands.
#[derive(Args, Debug, Default)]
pub struct StoreArgs {
    /// `postgres://...` or `sqlite:...` URL.
    #[arg(long)]
    pub database_url: Option<String>,

    /// Replace stored rows of re-ingested runs instead of appending.
    #[arg(long)]
    pub replace: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract an archive, normalize its run files and write a dataset.
    Process {
        /// Archive of run files (.zip or .tar).
        archive: PathBuf,

        /// Ingestion overrides.
        #[command(flatten)]
        ingest: IngestArgs,
    },

    /// Create the metrics database, table and indexes if absent.
    InitDb {
        /// Store overrides.
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Append a CSV dataset to the metrics store.
    Load {
        /// Dataset to load; defaults to the newest in the output directory.
        csv: Option<PathBuf>,

        /// Directory searched for the newest dataset.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Store overrides.
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Ingest the source-data directory and export the Grafana dashboard.
    Dashboard {
        /// Directory of run files; defaults to DATA_DIR.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Month the run files belong to (YYYY-MM).
        #[arg(long)]
        period: Option<RunPeriod>,
    },

    /// Process an archive, then load it and export the dashboard.
    Run {
        /// Archive of run files.
        archive: PathBuf,

        /// Ingestion overrides.
        #[command(flatten)]
        ingest: IngestArgs,

        /// Store overrides.
        #[command(flatten)]
        store: StoreArgs,

        /// Do not append to the metrics store.
        #[arg(long)]
        skip_load: bool,

        /// Do not export the dashboard.
        #[arg(long)]
        skip_dashboard: bool,
    },
}

impl IngestArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(period) = self.period {
            config.ingest.period = Some(period);
        }
        if let Some(dir) = &self.extract_dir {
            config.ingest.extract_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.ingest.output_dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.ingest.format = format;
        }
    }
}

impl StoreArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
        if self.replace {
            config.database.duplicate_policy = DuplicatePolicy::ReplaceRunKeys;
        }
    }
}

impl Commands {
    /// Layer this command's flags over the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        match self {
            Commands::Process { ingest, .. } => ingest.apply(config),
            Commands::InitDb { store } => store.apply(config),
            Commands::Load {
                output_dir, store, ..
            } => {
                if let Some(dir) = output_dir {
                    config.ingest.output_dir = dir.clone();
                }
                store.apply(config);
            }
            Commands::Dashboard { data_dir, period } => {
                if let Some(dir) = data_dir {
                    config.ingest.data_dir = dir.clone();
                }
                if let Some(period) = period {
                    config.ingest.period = Some(*period);
                }
            }
            Commands::Run { ingest, store, .. } => {
                ingest.apply(config);
                store.apply(config);
            }
        }
    }
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or the first unrecovered failure.
pub async fn run() -> Result<()> {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;
    cli.command.apply(&mut config);
    logging::init(&config.logging, cli.verbose, cli.json_logs)?;

    execute(cli.command, &config).await
}

/// Execute one command against a resolved configuration.
pub async fn execute(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Process { archive, .. } => {
            let output = commands::process(config, &archive)?;
            commands::print_report(&output.batch);
            println!("Dataset written to {}", output.dataset.display());
            Ok(())
        }
        Commands::InitDb { .. } => {
            commands::init_db(config).await?;
            println!("Metrics store is ready");
            Ok(())
        }
        Commands::Load { csv, .. } => {
            let outcome = commands::load(config, csv.as_deref()).await?;
            println!(
                "Loaded {} rows ({} replaced)",
                outcome.inserted, outcome.replaced
            );
            Ok(())
        }
        Commands::Dashboard { .. } => {
            let reply = commands::dashboard(config).await?;
            println!("Dashboard updated: {}", reply.url);
            Ok(())
        }
        Commands::Run {
            archive,
            skip_load,
            skip_dashboard,
            ..
        } => {
            let sinks = Sinks {
                load: !skip_load,
                dashboard: !skip_dashboard,
            };
            commands::run(config, &archive, sinks).await
        }
    }
}
