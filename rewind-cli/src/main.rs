/*!
Rewind CLI - command-line interface for the backup recovery subsystem.

Provides the operator surface over the recovery orchestrator: run a
recovery, prune expired backup artifacts, and inspect what the backup
folder currently holds.
*/

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rewind_core::{
    classify, cleanup, ArtifactStore, JsonRowStore, LocalDirStore, RecoveryEngine, RunOutcome,
    StoreBackend, StoreConfig,
};
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "CLI for the rewind backup snapshot and recovery system")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Artifact store backend to use
    #[arg(short, long, global = true, value_enum, default_value = "disk")]
    storage: StorageType,

    /// Store location (root directory for disk, bucket for S3)
    #[arg(short, long, global = true)]
    path: Option<String>,

    /// Folder within the store that holds the backup artifacts
    #[arg(short, long, global = true, default_value = "backups")]
    folder: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Debug)]
enum StorageType {
    Disk,
    S3,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore the data store from the latest snapshot plus newer change logs
    Recover {
        /// Operator-intended target time (RFC 3339), recorded in the run log
        #[arg(long)]
        target: Option<DateTime<Utc>>,
        /// File the restored row store is persisted to
        #[arg(long, default_value = "rewind-data.json")]
        data_file: PathBuf,
        /// Scratch directory for downloaded artifacts
        #[arg(long, default_value = ".rewind-work")]
        work_dir: PathBuf,
        /// Extra table names to register beyond those in the snapshot
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete backup artifacts older than the retention window
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        retention_days: i64,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        force: bool,
    },
    /// List backup artifacts in the store
    List {
        /// Show the selection the classifier would make
        #[arg(short, long)]
        detailed: bool,
    },
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Size")]
    size: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = store_config(&cli)?;
    match config.backend {
        StoreBackend::Local => {
            let root = config
                .local_root
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            dispatch(LocalDirStore::new(root), config.folder, cli.command).await
        }
        #[cfg(feature = "s3")]
        StoreBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| anyhow::anyhow!("S3 bucket not configured"))?;
            let store = rewind_core::S3ArtifactStore::new(bucket).await?;
            dispatch(store, config.folder, cli.command).await
        }
        #[cfg(not(feature = "s3"))]
        StoreBackend::S3 => Err(anyhow::anyhow!(
            "S3 support not enabled; rebuild with --features s3"
        )),
    }
}

fn store_config(cli: &Cli) -> Result<StoreConfig, anyhow::Error> {
    let mut config = match cli.storage {
        StorageType::Disk => {
            let root = cli.path.clone().unwrap_or_else(|| ".".to_string());
            StoreConfig::local_with_root(root)
        }
        StorageType::S3 => {
            let bucket = cli
                .path
                .clone()
                .or_else(|| std::env::var("AWS_S3_BUCKET").ok())
                .ok_or_else(|| {
                    anyhow::anyhow!("S3 bucket required: pass --path or set AWS_S3_BUCKET")
                })?;
            StoreConfig::s3_with_bucket(bucket)
        }
    };
    config.folder = cli.folder.clone();
    config.validate()?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch<A: ArtifactStore>(
    store: A,
    folder: String,
    command: Commands,
) -> Result<(), anyhow::Error> {
    match command {
        Commands::Recover {
            target,
            data_file,
            work_dir,
            tables,
            json,
        } => recover(store, folder, target, data_file, work_dir, tables, json).await,
        Commands::Cleanup {
            retention_days,
            force,
        } => run_cleanup(store, folder, retention_days, force).await,
        Commands::List { detailed } => list_artifacts(store, folder, detailed).await,
    }
}

async fn recover<A: ArtifactStore>(
    store: A,
    folder: String,
    target: Option<DateTime<Utc>>,
    data_file: PathBuf,
    work_dir: PathBuf,
    tables: Vec<String>,
    json: bool,
) -> Result<(), anyhow::Error> {
    let rows = JsonRowStore::with_tables(tables.iter().map(String::as_str))
        .with_persist_path(&data_file);
    let engine = RecoveryEngine::new(store, rows, folder, work_dir);

    let report = engine.recover(target).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Recovery run {}", report.run_id);
        if let Some(snapshot) = &report.snapshot {
            let status = if report.snapshot_restored {
                "restored"
            } else {
                "not restored"
            };
            println!("  Snapshot: {snapshot} ({status})");
        }
        println!(
            "  Incremental files applied: {}/{}",
            report.files_applied, report.files_total
        );
        println!("  Entries applied: {}", report.applied);
        println!("  Recoverable errors: {}", report.errors.len());
        for error in &report.errors {
            println!("    - {error}");
        }
    }

    match report.outcome {
        RunOutcome::Completed => {
            println!("✓ Recovery completed; data written to {}", data_file.display());
            Ok(())
        }
        RunOutcome::Aborted(reason) => {
            eprintln!("fatal: {reason}");
            std::process::exit(1);
        }
    }
}

async fn run_cleanup<A: ArtifactStore>(
    store: A,
    folder: String,
    retention_days: i64,
    force: bool,
) -> Result<(), anyhow::Error> {
    if !force {
        print!("Delete artifacts older than {retention_days} days from '{folder}'? (y/N): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().to_lowercase().starts_with('y') {
            println!("Cleanup cancelled");
            return Ok(());
        }
    }

    let report = cleanup::prune_expired(&store, &folder, retention_days).await?;

    println!("✓ Deleted {} artifact(s)", report.deleted_count);
    for name in &report.deleted_names {
        println!("  - {name}");
    }
    if !report.errors.is_empty() {
        println!("Failed deletions:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }

    Ok(())
}

async fn list_artifacts<A: ArtifactStore>(
    store: A,
    folder: String,
    detailed: bool,
) -> Result<(), anyhow::Error> {
    info!("Listing artifacts in '{}'", folder);

    let mut artifacts = store.list(&folder, None).await?;
    if artifacts.is_empty() {
        println!("No artifacts found in '{folder}'");
        return Ok(());
    }
    artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let rows: Vec<ArtifactRow> = artifacts
        .iter()
        .map(|a| ArtifactRow {
            name: a.name.clone(),
            kind: if a.is_incremental() {
                "incremental"
            } else {
                "snapshot"
            }
            .to_string(),
            created: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            size: format_size(a.size_bytes),
        })
        .collect();
    println!("{}", Table::new(rows));

    if detailed {
        match classify::select_latest_snapshot(&artifacts) {
            Some(snapshot) => {
                println!(
                    "\nLatest snapshot: {} (created {})",
                    snapshot.name,
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S")
                );
                let pending = classify::select_incrementals_since(&artifacts, snapshot.created_at);
                println!("Incrementals a recovery run would replay: {}", pending.len());
                for log in &pending {
                    println!("  - {}", log.name);
                }
            }
            None => println!("\nNo full snapshot available; recovery would abort"),
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
