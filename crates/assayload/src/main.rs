//! Assay Load - GXD assay batch validation and load tool

use std::path::PathBuf;

use anyhow::{Context, Result};
use assayload::{BatchCommitter, LoadConfig, LoaderKind};
use assayload_common::logging::{init_logging, LogConfig, LogLevel};
use assayload_common::{LoadDate, RunMode};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "assayload")]
#[command(author, version, about = "GXD assay batch validation and load tool")]
struct Cli {
    /// Loader to run
    #[command(subcommand)]
    loader: Loader,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Loader {
    /// In situ hybridization assays
    Insitu(RunArgs),

    /// Immunohistochemistry assays
    Immuno(RunArgs),

    /// Gel (RT-PCR, blot) assays
    Gel(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// preview (validate and stage only) or load
    #[arg(short, long, env = "ASSAYLOAD_MODE", default_value = "preview")]
    mode: RunMode,

    /// Directory holding the input files
    #[arg(short, long, env = "ASSAYLOAD_DATADIR", default_value = ".")]
    data_dir: PathBuf,

    /// Directory for staging and error files (defaults to the data directory)
    #[arg(short, long, env = "ASSAYLOAD_OUTPUTDIR")]
    output_dir: Option<PathBuf>,

    /// Expression store database
    #[arg(short, long, env = "ASSAYLOAD_STORE")]
    store: Option<PathBuf>,

    /// Login the run acts for
    #[arg(short, long, env = "ASSAYLOAD_CREATEDBY")]
    created_by: String,

    /// Audit date stamped into staged rows (YYYY-MM-DD, defaults to today)
    #[arg(long, env = "ASSAYLOAD_LOADDATE")]
    load_date: Option<LoadDate>,

    /// Input file override, e.g. `--input specimen=Specimens.txt`
    #[arg(short, long = "input", value_name = "STREAM=FILE")]
    inputs: Vec<String>,
}

impl RunArgs {
    fn into_config(self, loader: LoaderKind) -> Result<LoadConfig> {
        let mut config = LoadConfig::new(loader, self.data_dir)
            .with_input_overrides(&self.inputs)
            .context("Invalid input override")?;
        config.mode = self.mode;
        config.created_by = self.created_by;
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(store) = self.store {
            config.store_path = store;
        }
        if let Some(load_date) = self.load_date {
            config.load_date = load_date;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Usage errors are fatal like any other; help and version are not
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print()?;
            std::process::exit(code);
        },
    };

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("assayload")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let (loader, args) = match cli.loader {
        Loader::Insitu(args) => (LoaderKind::InSitu, args),
        Loader::Immuno(args) => (LoaderKind::Immuno, args),
        Loader::Gel(args) => (LoaderKind::Gel, args),
    };
    let config = args.into_config(loader)?;

    info!(
        loader = %config.loader,
        mode = %config.mode,
        data_dir = %config.data_dir.display(),
        store = %config.store_path.display(),
        "Starting assay load"
    );

    let summary = match BatchCommitter::new(config).run() {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Assay load failed");
            return Err(e.into());
        },
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("Assay load complete");
    Ok(())
}
