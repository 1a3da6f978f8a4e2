//! Energy operator CLI
//!
//! A command-line tool for inspecting the operator's optimal windows and
//! decision log, planning windows offline, labelling solar nodes and
//! evicting pods so they reschedule under new affinity.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{audit, nodes, pods, windows};
use operator_lib::carbon::WindowPolicy;

/// Energy operator CLI
#[derive(Parser)]
#[command(name = "eoctl")]
#[command(author, version, about = "CLI for the energy-aware operator", long_about = None)]
pub struct Cli {
    /// Operator API URL (can also be set via EO_API_URL env var)
    #[arg(long, env = "EO_API_URL")]
    pub api_url: Option<String>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the optimal windows stored by the operator
    Windows {
        /// Calendar date (YYYY-MM-DD, UTC); today if omitted
        #[arg(long)]
        date: Option<String>,
    },

    /// Show recent scaling decisions
    Events {
        /// Number of records to fetch
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show recent placement decisions
    Placements {
        /// Number of records to fetch
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Compute optimal windows offline from hourly intensities
    Plan {
        /// Comma-separated intensities for hours 0..23; blank entries are interpolated
        #[arg(long)]
        intensities: String,

        /// Order-statistic cut in percent
        #[arg(long, default_value_t = 30)]
        percentile: u32,

        /// Shortest run of good hours that becomes a window
        #[arg(long, default_value_t = 2)]
        min_run: u32,

        /// Maximum number of windows to list
        #[arg(long, default_value_t = 3)]
        max_windows: usize,
    },

    /// Label nodes, e.g. `worker-1=power=solar`
    LabelNodes {
        /// NODE=KEY=VALUE assignments
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Evict pods so they reschedule under their current affinity
    Evict {
        /// Namespace of the pods
        #[arg(long, short, default_value = "default")]
        namespace: String,

        /// Pod names
        #[arg(required = true)]
        pods: Vec<String>,
    },
}

const DEFAULT_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;
    let limit = |flag: Option<usize>| flag.or(config.default_limit).unwrap_or(DEFAULT_LIMIT);

    match cli.command {
        Commands::Windows { date } => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            windows::show_windows(&client, date, cli.format).await?;
        }
        Commands::Events { limit: n } => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            audit::show_events(&client, limit(n), cli.format).await?;
        }
        Commands::Placements { limit: n } => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            audit::show_placements(&client, limit(n), cli.format).await?;
        }
        Commands::Plan {
            intensities,
            percentile,
            min_run,
            max_windows,
        } => {
            let policy = WindowPolicy {
                percentile,
                min_run_length: min_run,
                max_windows,
            };
            windows::plan(&intensities, &policy, cli.format)?;
        }
        Commands::LabelNodes { assignments } => {
            nodes::label(&assignments, cli.kubeconfig.as_deref()).await?;
        }
        Commands::Evict { namespace, pods: names } => {
            pods::evict(&namespace, &names, cli.kubeconfig.as_deref()).await?;
        }
    }

    Ok(())
}
