use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use converge_core::{
    DesiredState, Poller, Reconciler, ReconcilerConfig, TokioSleeper, VariantRegistry,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod http;

use http::HttpRemote;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Reconcile declared resources against a remote API", long_about = None)]
struct Cli {
    /// Base URL of the resource API
    #[arg(short, long, env = "CONVERGE_ENDPOINT", default_value = "http://localhost:8080/api")]
    endpoint: String,

    /// Bearer token for the resource API
    #[arg(long, env = "CONVERGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Reconciler config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON pointer to the native id in create responses
    #[arg(long, default_value = "/data/id")]
    id_pointer: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resource from a desired-state file
    Create {
        /// Desired state (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Read the current state of a resource
    Read {
        /// Composite id (variant:native)
        id: String,
    },

    /// Update a resource in place
    Update {
        /// Composite id (variant:native)
        id: String,

        /// Desired state (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a resource
    Delete {
        /// Composite id (variant:native)
        id: String,
    },

    /// Bring an existing object under management
    Import {
        /// Composite id, or a bare native id with import_default_variant set
        id: String,
    },

    /// Create, update, recreate or replace as needed
    Apply {
        /// Composite id currently held, if any
        #[arg(long)]
        id: Option<String>,

        /// Desired state (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List registered variants
    Variants,
}

fn load_desired(path: &Path) -> Result<DesiredState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "converge=info,converge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReconcilerConfig::load(path)?,
        None => ReconcilerConfig::default(),
    };
    let registry = Arc::new(VariantRegistry::builtin());
    let remote = Arc::new(HttpRemote::new(&cli.endpoint, cli.token.clone(), &cli.id_pointer)?);

    // Ctrl-C stops any visibility wait in progress.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            signal_token.cancel();
        }
    });

    let reconciler = Reconciler::new(remote, registry, config)
        .with_poller(Poller::new(Arc::new(TokioSleeper), cancel));

    info!(endpoint = %cli.endpoint, "using resource API");

    match cli.command {
        Commands::Create { file } => {
            let desired = load_desired(&file)?;
            print_json(&reconciler.create(&desired).await?)?;
        }
        Commands::Read { id } => {
            // `null` tells the caller to forget the id.
            print_json(&reconciler.read(&id).await?)?;
        }
        Commands::Update { id, file } => {
            let desired = load_desired(&file)?;
            print_json(&reconciler.update(&id, &desired).await?)?;
        }
        Commands::Delete { id } => {
            print_json(&reconciler.delete(&id).await?)?;
        }
        Commands::Import { id } => {
            print_json(&reconciler.import(&id).await?)?;
        }
        Commands::Apply { id, file } => {
            let desired = load_desired(&file)?;
            print_json(&reconciler.converge(id.as_deref(), &desired).await?)?;
        }
        Commands::Variants => {
            print_json(&reconciler.registry().variants())?;
        }
    }

    Ok(())
}
