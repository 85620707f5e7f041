//! stepcache - checkpoint cache inspector
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use stepcache::cli::{Cli, Commands};
use stepcache::config::ConfigManager;
use stepcache::error::{StepCacheError, StepCacheResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StepCacheResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions(args) = cli.command {
        return stepcache::cli::commands::completions(args);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else if cli.no_local {
        ConfigManager::new()
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| StepCacheError::storage("getting current directory", e))?;
        match ConfigManager::find_local_config(&cwd) {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new(),
        }
    };

    let mut config = config_manager.load().await?;
    if let Some(root) = cli.root {
        config.cache.root = root;
    }

    // 0 = warn, 1 = info, 2+ = debug; `general.verbose` counts as one -v
    let level = cli.verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("stepcache=warn"),
        1 => EnvFilter::new("stepcache=info"),
        _ => EnvFilter::new("stepcache=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    stepcache::ui::init_theme();
    debug!(
        "Using config {} with cache root {}",
        config_manager.path().display(),
        config.cache.root.display()
    );

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::List(args) => stepcache::cli::commands::list(args, &config).await,
        Commands::Info => stepcache::cli::commands::info(&config).await,
        Commands::Truncate(args) => stepcache::cli::commands::truncate(args, &config).await,
        Commands::Clear(args) => stepcache::cli::commands::clear(args, &config).await,
        Commands::Config(args) => {
            stepcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
