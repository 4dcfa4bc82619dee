//! # ckpt CLI - working-tree checkpoints
//!
//! Command-line interface for the ckpt library.
//!
//! ## Usage
//! ```bash
//! # Snapshot the working tree
//! ckpt push before-refactor
//!
//! # See what exists
//! ckpt list
//!
//! # Restore the latest checkpoint (asks first)
//! ckpt pop
//!
//! # Delete every checkpoint
//! ckpt nuke
//! ```

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};
use ckpt::{CheckpointStats, CheckpointStore, CkptError, Result};

/// Lightweight working-tree checkpoints for git repositories
#[derive(Parser)]
#[command(name = "ckpt")]
#[command(version)]
#[command(about = "Checkpoint and restore the working tree of a git repository")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a checkpoint
    Push {
        /// Checkpoint name (defaults to a timestamped name)
        name: Option<String>,

        /// Overwrite an existing checkpoint of the same name
        #[arg(long)]
        force: bool,
    },

    /// Restore from a checkpoint
    Pop {
        /// Checkpoint name (defaults to the most recent)
        name: Option<String>,
    },

    /// List available checkpoints
    #[command(alias = "ls")]
    List,

    /// Delete all checkpoints
    Nuke,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        use tracing_subscriber::EnvFilter;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ckpt=debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = ckpt::find_repo_root()?;
    let store = CheckpointStore::new(root);

    match cli.command {
        Commands::Push { name, force } => cmd_push(&store, name, force),
        Commands::Pop { name } => cmd_pop(&store, name),
        Commands::List => cmd_list(&store),
        Commands::Nuke => cmd_nuke(&store),
    }
}

fn cmd_push(store: &CheckpointStore, name: Option<String>, force: bool) -> Result<()> {
    let name = match name.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => default_checkpoint_name(),
    };

    let start = Instant::now();
    let (meta, files) = store.push(&name, force)?;

    println!(
        "{} Created checkpoint {} ({} files, {})",
        "✓".green().bold(),
        meta.name.yellow().bold(),
        files,
        format_elapsed(start.elapsed()).cyan()
    );
    Ok(())
}

fn cmd_pop(store: &CheckpointStore, name: Option<String>) -> Result<()> {
    let name = match name.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => store.latest_name()?,
    };

    ckpt::validate_name(&name)?;
    if !store.exists(&name) {
        return Err(CkptError::CheckpointNotFound(name));
    }

    confirm(&format!(
        "Restore checkpoint '{}'? This will overwrite files. [y/N]: ",
        name
    ))?;

    let start = Instant::now();
    let result = store.restore(&name)?;

    println!(
        "{} Restored checkpoint {} ({} restored, {} deleted, {} dirs pruned, {})",
        "✓".green().bold(),
        name.yellow().bold(),
        result.files_restored,
        result.files_deleted,
        result.dirs_pruned,
        format_elapsed(start.elapsed()).cyan()
    );
    Ok(())
}

fn cmd_list(store: &CheckpointStore) -> Result<()> {
    let mut metas = store.list()?;
    if metas.is_empty() {
        println!("No checkpoints found");
        return Ok(());
    }

    metas.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    for meta in metas {
        let stats = store.stats(&meta.name)?;
        println!(
            "{}\t{}\t{}",
            meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_stats(&stats),
            meta.name.bold()
        );
    }
    Ok(())
}

fn cmd_nuke(store: &CheckpointStore) -> Result<()> {
    if !store.storage_root().exists() {
        println!("No checkpoints to delete");
        return Ok(());
    }

    confirm("Delete all checkpoints? This cannot be undone. [y/N]: ")?;

    store.nuke()?;
    println!("{} All checkpoints deleted", "✓".green().bold());
    Ok(())
}

fn default_checkpoint_name() -> String {
    format!("checkpoint-{}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Ask for a yes/no answer on stdin; anything but `y`/`yes` cancels.
fn confirm(prompt: &str) -> Result<()> {
    print!("{prompt}");
    io::stdout()
        .flush()
        .map_err(|e| CkptError::io("flush stdout", "-", e))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CkptError::io("read confirmation", "-", e))?;

    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(CkptError::Cancelled),
    }
}

fn format_stats(stats: &CheckpointStats) -> String {
    format!(
        "{} files, {} loc",
        stats.file_count,
        format_count(stats.line_count)
    )
}

fn format_count(value: usize) -> String {
    if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}k", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

/// Round elapsed time to milliseconds so humantime prints compactly.
fn format_elapsed(elapsed: Duration) -> String {
    format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_200), "1.2k");
        assert_eq!(format_count(3_400_000), "3.4M");
    }

    #[test]
    fn test_default_checkpoint_name_is_valid() {
        let name = default_checkpoint_name();
        assert!(name.starts_with("checkpoint-"));
        assert!(ckpt::validate_name(&name).is_ok());
    }
}
