use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use skel_queue::config::{self, keys};
use skel_queue::{ExecutionContext, HttpConnector, Result, RunConfig, pipeline};

/// Skeletonize every neuron of an input table into an artifact store
#[derive(Parser, Debug)]
#[command(name = "skel-queue")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug  Override the log filter")]
struct Cli {
    /// Env file describing the run; prints the config template when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a run config, pinning the current materialization timestamp
    Template {
        /// Where to write the env file
        output: PathBuf,

        /// Output location for skeletons (path or URI)
        #[arg(long)]
        filepath: String,

        /// Datastack name
        #[arg(long)]
        datastack: String,

        /// Remote data service address
        #[arg(long)]
        server_address: String,

        /// Input table path
        #[arg(long)]
        dataframe: PathBuf,

        /// POSIX timestamp to query at (defaults to latest materialization)
        #[arg(long)]
        timestamp: Option<String>,

        /// Whether to collapse the soma
        #[arg(long)]
        collapse_soma: Option<bool>,

        /// Root id column name
        #[arg(long)]
        root_id_column: Option<String>,

        /// Soma point column name
        #[arg(long)]
        soma_point_column: Option<String>,

        /// Soma radius column name
        #[arg(long)]
        soma_radius_column: Option<String>,

        /// Number of tasks to run at once
        #[arg(long)]
        parallel: Option<usize>,

        /// Quality threshold for splitting the axon
        #[arg(long)]
        split_threshold: Option<f64>,
    },
}

impl Command {
    /// Collect the template arguments as config key/value pairs
    fn template_params(&self) -> HashMap<String, String> {
        let Command::Template {
            filepath,
            datastack,
            server_address,
            dataframe,
            timestamp,
            collapse_soma,
            root_id_column,
            soma_point_column,
            soma_radius_column,
            parallel,
            split_threshold,
            ..
        } = self;

        let mut params = HashMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        };
        set(keys::FILEPATH, Some(filepath.clone()));
        set(keys::DATASTACK, Some(datastack.clone()));
        set(keys::SERVER_ADDRESS, Some(server_address.clone()));
        set(keys::DATAFRAME, Some(dataframe.display().to_string()));
        set(keys::TIMESTAMP, timestamp.clone());
        set(keys::COLLAPSE_SOMA, collapse_soma.map(|b| b.to_string()));
        set(keys::ROOT_ID_COLUMN, root_id_column.clone());
        set(keys::SOMA_POINT_COLUMN, soma_point_column.clone());
        set(keys::SOMA_RADIUS_COLUMN, soma_radius_column.clone());
        set(keys::PARALLEL, parallel.map(|n| n.to_string()));
        set(keys::SPLIT_THRESHOLD, split_threshold.map(|t| t.to_string()));
        params
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "run failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match (cli.command, cli.config) {
        (Some(command @ Command::Template { .. }), _) => {
            let Command::Template { output, .. } = &command;
            let config = RunConfig::from_params(&command.template_params())?;
            pipeline::write_template(output, config, &HttpConnector).await?;
            println!("Wrote {}", output.display());
            Ok(())
        }
        (None, Some(path)) => {
            pipeline::run_env_file(&path, Arc::new(ExecutionContext::production())).await
        }
        (None, None) => {
            print!("{}", config::config_template());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
