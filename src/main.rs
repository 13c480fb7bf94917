//! # Site Budget - Main Entry Point
//!
//! Questo è il punto di ingresso dell'applicazione CLI.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti da linea di comando con `clap`
//! - Installazione del subscriber `tracing` (INFO, DEBUG con `--verbose`,
//!   `RUST_LOG` vince se impostata); i log vanno su stderr passando per la
//!   progress bar attiva
//! - Risoluzione della root del progetto e caricamento di `site-budget.json`
//! - Dispatch al runner e stampa dei totali
//!
//! ## Root del progetto:
//! 1. `--root` se presente
//! 2. il primo antenato della directory dell'eseguibile che contiene `site-budget.json`
//! 3. la directory corrente
//!
//! ## Esempio:
//! ```bash
//! site-budget --dry-run all
//! site-budget --root ./site --workers 8 optimize
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use site_budget::{
    config::CONFIG_FILE_NAME, file_manager::FileManager, json_output::JsonMessage, progress::LogWriter,
    Config, OutputMode, Runner,
};

#[derive(Parser)]
#[command(name = "site-budget")]
#[command(about = "Keep a static site's image and asset weight within budget")]
struct Args {
    /// Project root (defaults to the install location's project)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Configuration file (defaults to <root>/site-budget.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Dry run - report what would change without touching files
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// No progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Command {
    /// Sweep temp files, prune, then re-encode and convert images
    #[default]
    Optimize,
    /// Delete oversized files and prune obsolete subtrees
    Cleanup,
    /// Cleanup followed by optimize
    All,
    /// Print the effective configuration as JSON
    PrintConfig,
}

/// Nearest ancestor of the executable's directory that holds a config file
fn find_install_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent()?
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE_NAME).is_file())
        .map(Path::to_path_buf)
}

fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let root = match explicit {
        Some(root) => root,
        None => match find_install_root() {
            Some(root) => root,
            None => std::env::current_dir().context("Cannot determine the current directory")?,
        },
    };

    if !root.is_dir() {
        return Err(anyhow::anyhow!("Project root is not a directory: {}", root.display()));
    }
    Ok(root)
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(LogWriter::default)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn load_config(args: &Args, root: &Path) -> Result<Config> {
    let path = args.config.clone().unwrap_or_else(|| Config::locate(root));
    let mut config = Config::from_file(&path).await?;

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.dry_run |= args.dry_run;
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let root = resolve_root(args.root.clone())?;
    let config = load_config(&args, &root).await?;
    let command = args.command.unwrap_or_default();

    let dry_run = config.dry_run;
    let output = OutputMode {
        json: args.json,
        progress: !args.quiet,
    };
    let runner = Runner::new(&root, config).with_output(output);
    let start_time = Instant::now();

    if !matches!(command, Command::PrintConfig) {
        info!("Project root: {}", root.display());
        if dry_run {
            info!("Dry run mode: No files will be modified");
        }
    }

    let report = match command {
        Command::Optimize => runner.optimize().await?,
        Command::Cleanup => runner.cleanup().await?,
        Command::All => runner.all().await?,
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(runner.config())?);
            return Ok(());
        }
    };

    let total = report.total();
    let (files, bytes) = total.totals();
    if args.json {
        JsonMessage::complete(&report, start_time.elapsed().as_secs_f64()).emit();
    }
    info!("=== Run Complete ===");
    info!("{}", total.format_summary());
    info!("✅ {} files removed or converted, {} reclaimed", files, FileManager::format_delta(bytes));
    if total.failed > 0 {
        warn!("{} files could not be processed, see the errors above", total.failed);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let json = args.json;
    let result = run(args).await;
    if let Err(ref e) = result {
        if json {
            JsonMessage::error(format!("{:#}", e)).emit();
        }
    }
    result
}
