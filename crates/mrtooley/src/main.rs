// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MrTooley - a pluggable tool framework.
//!
//! This is the command-line launcher.

mod network_cmd;
mod store_cmd;
mod tools_cmd;
mod workspace_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mrtooley::App;
use mrtooley_config::{MrTooleyConfig, StartupEnvironment};
use mrtooley_core::MrTooleyError;
use mrtooley_core::logging::parse_log_level;

/// MrTooley - a pluggable tool framework.
#[derive(Parser, Debug)]
#[command(name = "mrtooley", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Startup option, e.g. `-D LOG_LEVEL=debug` or `-D ROOT_STORAGE_TYPE=JSON`.
    #[arg(short = 'D', long = "define", global = true, value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List, search, toggle and run tools.
    Tools {
        #[command(subcommand)]
        action: tools_cmd::ToolsCommand,
    },
    /// Read and write the root storage tree.
    Store {
        #[command(subcommand)]
        action: store_cmd::StoreCommand,
    },
    /// Manage workspaces and their values.
    Workspace {
        #[command(subcommand)]
        action: workspace_cmd::WorkspaceCommand,
    },
    /// Look up the vendor of a MAC address.
    Oui {
        /// MAC address, `:` or `-` separated.
        mac: String,
    },
    /// Ping-scan a host or network with nmap.
    Scan {
        /// Target host, range or CIDR.
        destination: String,
        /// Fill in missing MACs from the kernel ARP table.
        #[arg(long)]
        lookup_macs: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut startup = StartupEnvironment::from_process();
    startup.absorb_args(&cli.define);

    let loaded = match &cli.config {
        Some(path) => mrtooley_config::load_and_validate_path(path, &startup),
        None => mrtooley_config::load_and_validate(&startup),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            mrtooley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.general.log_level, explicit_log_level(&startup));

    if let Err(e) = run(cli.command, config).await {
        eprintln!("mrtooley: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: MrTooleyConfig) -> Result<(), MrTooleyError> {
    match command {
        Some(Commands::Config) => {
            let text = toml::to_string_pretty(&config)
                .map_err(|e| MrTooleyError::Internal(format!("cannot render config: {e}")))?;
            print!("{text}");
            Ok(())
        }
        Some(Commands::Oui { mac }) => network_cmd::run_oui(&config, &mac).await,
        Some(Commands::Scan {
            destination,
            lookup_macs,
        }) => network_cmd::run_scan(&config, &destination, lookup_macs).await,
        Some(Commands::Tools { action }) => {
            let mut app = App::new(config).await?;
            let result = tools_cmd::run(&mut app, action).await;
            app.shutdown().await?;
            result
        }
        Some(Commands::Store { action }) => {
            let app = App::new(config).await?;
            let result = store_cmd::run(&app, action).await;
            app.shutdown().await?;
            result
        }
        Some(Commands::Workspace { action }) => {
            let app = App::new(config).await?;
            let result = workspace_cmd::run(&app, action).await;
            app.shutdown().await?;
            result
        }
        None => {
            println!("mrtooley: use --help for available commands");
            Ok(())
        }
    }
}

/// True when the level was set by `MT_LOG_LEVEL` or a startup argument.
fn explicit_log_level(startup: &StartupEnvironment) -> bool {
    startup
        .config_overrides()
        .iter()
        .any(|(key, _)| *key == "general.log_level")
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the config file but not
/// over an explicit startup level.
fn init_tracing(log_level: &str, explicit: bool) {
    use tracing_subscriber::EnvFilter;

    let level = parse_log_level(log_level)
        .unwrap_or(tracing::level_filters::LevelFilter::WARN)
        .to_string();
    let filter = if explicit {
        EnvFilter::new(&level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
