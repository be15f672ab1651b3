mod config_commands;
mod db_commands;
mod links_commands;
mod relay_commands;

use std::path::PathBuf;

use {
    chanlink_config::ChanlinkConfig,
    chanlink_relay::EngineConfig,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "chanlink", about = "Chanlink: mirror Discord channels into each other")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Explicit config file (skips discovery).
    #[arg(long, global = true, env = "CHANLINK_CONFIG")]
    config: Option<PathBuf>,
    /// Custom config directory (overrides default ~/.config/chanlink/).
    #[arg(long, global = true, env = "CHANLINK_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory (overrides default data dir).
    #[arg(long, global = true, env = "CHANLINK_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and relay messages (default when no subcommand is provided).
    Run,
    /// Create, extend, shrink, and list links.
    Links {
        #[command(subcommand)]
        action: links_commands::LinksAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Database management (migrate, reset).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Explicit `--config` wins; otherwise the standard discovery order.
fn load_config(cli: &Cli) -> anyhow::Result<ChanlinkConfig> {
    match cli.config {
        Some(ref path) => chanlink_config::load_config(path),
        None => Ok(chanlink_config::discover_and_load()),
    }
}

pub(crate) fn engine_config(config: &ChanlinkConfig) -> EngineConfig {
    EngineConfig {
        forward_capacity: config.relay.correlation_capacity,
        reverse_capacity: config.relay.reverse_capacity,
        reply_colour: config.relay.reply_embed_colour,
    }
}

/// Make sure the default SQLite location can be created.
pub(crate) fn prepare_data_dir(config: &ChanlinkConfig) -> anyhow::Result<()> {
    if config.database.url.is_none() {
        std::fs::create_dir_all(chanlink_config::data_dir())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chanlink starting");

    // Directory overrides must land before any config lookup.
    chanlink_config::apply_env_overrides();
    if let Some(ref dir) = cli.config_dir {
        chanlink_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        chanlink_config::set_data_dir(dir.clone());
    }

    match cli.command {
        None | Some(Commands::Run) => relay_commands::run(load_config(&cli)?).await,
        Some(Commands::Links { ref action }) => {
            links_commands::handle_links(action, load_config(&cli)?).await
        },
        Some(Commands::Config { ref action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
        Some(Commands::Db { ref action }) => {
            db_commands::handle_db(action, load_config(&cli)?).await
        },
    }
}
