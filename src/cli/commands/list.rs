//! List command - show checkpoints in execution order

use super::OpenCache;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::StepCacheResult;
use crate::ui::format_bytes;
use console::style;
use serde::Serialize;

/// One manifest entry with its stored artifacts
#[derive(Debug, Serialize)]
struct CheckpointRow {
    position: usize,
    name: String,
    artifacts: usize,
    bytes: u64,
}

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> StepCacheResult<()> {
    let root = &config.cache.root;
    if !root.is_dir() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cache found at {}", root.display()),
        }
        return Ok(());
    }

    let opened = OpenCache::open(config).await?;
    let checkpoints = opened.cache.list_checkpoints().await?;
    let artifacts = opened.cache.artifacts().await?;
    let sizes = opened.sizes(&artifacts).await?;

    let rows: Vec<CheckpointRow> = checkpoints
        .into_iter()
        .enumerate()
        .map(|(index, name)| CheckpointRow {
            position: index + 1,
            artifacts: artifacts.get(&name).map_or(0, Vec::len),
            bytes: sizes.get(&name).copied().unwrap_or(0),
            name,
        })
        .collect();

    match args.format {
        OutputFormat::Table => print_table(&rows, root),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

fn print_table(rows: &[CheckpointRow], root: &std::path::Path) {
    if rows.is_empty() {
        println!("No checkpoints recorded in {}", root.display());
        return;
    }

    println!("{:<4} {:<40} {:>10} {:>12}", "#", "CHECKPOINT", "ARTIFACTS", "SIZE");
    println!("{}", "-".repeat(69));

    for row in rows {
        let count = if row.artifacts == 0 {
            style(row.artifacts.to_string()).yellow().to_string()
        } else {
            row.artifacts.to_string()
        };
        println!(
            "{:<4} {:<40} {:>10} {:>12}",
            row.position,
            row.name,
            count,
            format_bytes(row.bytes)
        );
    }

    println!();
    println!("Total: {} checkpoint(s)", rows.len());
}
