//! wirestore CLI
//!
//! Command-line interface for inspecting and driving WebSocket-synchronized
//! state stores.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wirestore_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "wirestore")]
#[command(about = "wirestore - WebSocket-synchronized state stores")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Override the configured endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a store and print every update as JSON
    Watch {
        /// Store key to watch
        key: String,
    },
    /// Fetch the current full state of a store once
    Fetch {
        /// Store key to fetch
        key: String,
    },
    /// Push a state value to a store
    Push {
        /// Store key to push to
        key: String,
        /// State as a JSON object
        state: String,
    },
    /// Invoke a remote action on a store
    Action {
        /// Store key scope of the action
        key: String,
        /// Action name
        name: String,
        /// Parameters as a JSON object (defaults to {})
        params: Option<String>,
    },
    /// Show endpoint configuration and probe connectivity
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Field name (endpoint, client_name, data_dir)
        field: String,
        /// New value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    match cli.command {
        Commands::Watch { key } => commands::watch(&config, &key).await,
        Commands::Fetch { key } => commands::fetch(&config, &key).await,
        Commands::Push { key, state } => commands::push(&config, &key, &state).await,
        Commands::Action { key, name, params } => {
            commands::action(&config, &key, &name, params.as_deref()).await
        }
        Commands::Status => commands::status(&config).await,
        Commands::Config { command } => match command {
            Some(ConfigCommands::Set { field, value }) => commands::config_set(&field, &value),
            Some(ConfigCommands::Show) | None => commands::config_show(&config),
        },
    }
}
