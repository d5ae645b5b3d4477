//! artcache - local build-artifact cache synchronizer
//!
//! CLI entry point that dispatches to subcommands.

use artcache::cache::CancelToken;
use artcache::cli::{Cli, CommandContext, Commands};
use artcache::config::{Config, ConfigManager};
use artcache::error::{ArtcacheError, ArtcacheResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (label, code) = if e.is_interrupted() {
                (style("Interrupted:").yellow().bold(), ExitCode::from(EXIT_INTERRUPTED))
            } else {
                (style("Error:").red().bold(), ExitCode::FAILURE)
            };
            eprintln!("{} {}", label, e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            code
        }
    }
}

async fn run() -> ArtcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir().map_err(|e| ArtcacheError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    if let Some(ref path) = local_config_path {
        debug!("Using local config: {}", path.display());
    }
    artcache::ui::init_theme();

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, waiting for running entries to finish");
            on_signal.cancel();
        }
    });

    let ctx = CommandContext::new(config, cli.cache_root, cancel);

    match cli.command {
        Commands::Sync(args) => artcache::cli::commands::sync(args, &ctx).await,
        Commands::Refresh(args) => artcache::cli::commands::refresh(args, &ctx).await,
        Commands::Locate(args) => artcache::cli::commands::locate(args, &ctx).await,
        Commands::Status(args) => artcache::cli::commands::status(args, &ctx).await,
        Commands::Clear(args) => artcache::cli::commands::clear(args, &ctx).await,
        Commands::Config(args) => artcache::cli::commands::config(args, &ctx.config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr so stdout stays parseable
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("artcache=warn"),
        1 => EnvFilter::new("artcache=info"),
        _ => EnvFilter::new("artcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
