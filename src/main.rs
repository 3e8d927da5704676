//! `espn-player` CLI - browse ESPN Player and resolve playable streams

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use espn_player::{config, BitratePolicy, Config, EventBucket};

#[derive(Parser)]
#[command(name = "espn-player")]
#[command(about = "ESPN Player client: log in, browse the schedule, resolve streams")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/espn-player/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding credentials and cookies
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Verbose logging, including response bodies
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the credentials
    Login,

    /// Forget stored credentials
    Logout,

    /// List categories (services)
    Categories,

    /// List the events of a service
    Schedule {
        /// Service id, as listed by `categories`
        service: String,

        /// Only events that are live, upcoming or archived
        #[arg(long)]
        bucket: Option<EventBucket>,
    },

    /// List channels
    Channels,

    /// Resolve an airing into a playable URL
    Play {
        airing_id: String,

        /// Channel to negotiate on (default from config, else espn3)
        #[arg(long)]
        channel: Option<String>,

        /// highest, ask, or a cap in kbps
        #[arg(long)]
        bitrate: Option<BitratePolicy>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(config.debug);

    match cli.command {
        Commands::Login => cmd::login::cmd_login(config),
        Commands::Logout => cmd::login::cmd_logout(config),
        Commands::Categories => cmd::browse::cmd_categories(config),
        Commands::Schedule { service, bucket } => cmd::browse::cmd_schedule(config, &service, bucket),
        Commands::Channels => cmd::browse::cmd_channels(config),
        Commands::Play {
            airing_id,
            channel,
            bitrate,
        } => {
            let policy = match bitrate {
                Some(policy) => policy,
                None => config.bitrate_policy()?,
            };
            cmd::play::cmd_play(config, &airing_id, channel.as_deref(), policy)
        }
    }
}

/// Config file values, overridden by command-line flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = Config::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(dir) = &cli.profile_dir {
        config.profile_dir.clone_from(dir);
    }
    if cli.username.is_some() {
        config.username.clone_from(&cli.username);
    }
    if cli.password.is_some() {
        config.password.clone_from(&cli.password);
    }
    config.debug |= cli.debug;

    Ok(config)
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
