use clap::Parser;
use dispatch_ledger::application::engine::{Collaborators, OrderEngine};
use dispatch_ledger::config::{DEFAULT_OPERATOR_ID, EngineConfig};
use dispatch_ledger::domain::ports::{NotifierRef, SeedStore};
use dispatch_ledger::infrastructure::in_memory::InMemoryStore;
use dispatch_ledger::infrastructure::notifier::LogNotifier;
use dispatch_ledger::interfaces::csv::trigger_reader::TriggerReader;
use dispatch_ledger::interfaces::json::response::Response;
use dispatch_ledger::interfaces::json::seed::read_snapshot;
use dispatch_ledger::telemetry::{self, LogFormat};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Triggers CSV file (`kind, order_id, delivered_amount`)
    input: PathBuf,

    /// JSON snapshot of settings, vendors, addresses, orders and profiles to load first
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Upper bound on each backing-store or notifier call
    #[arg(long, env = "DISPATCH_IO_TIMEOUT_MS", default_value_t = 5_000)]
    io_timeout_ms: u64,

    /// Recipient of operator alerts for unfulfillable orders
    #[arg(long, env = "DISPATCH_OPERATOR_ID", default_value = DEFAULT_OPERATOR_ID)]
    operator_id: String,

    #[arg(long, env = "DISPATCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let config = EngineConfig::default()
        .with_io_timeout(Duration::from_millis(cli.io_timeout_ms))
        .with_operator_id(cli.operator_id);
    let notifier: NotifierRef = Arc::new(LogNotifier);

    let (collaborators, seeder) = open_store(cli.db_path, notifier)?;

    if let Some(seed_path) = cli.seed {
        let snapshot = read_snapshot(File::open(seed_path).into_diagnostic()?).into_diagnostic()?;
        seeder.seed(snapshot).await.into_diagnostic()?;
    }

    let engine = OrderEngine::new(collaborators, config);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = TriggerReader::new(file);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut processed = 0usize;
    for trigger_result in reader.triggers() {
        let response = match trigger_result {
            Ok(trigger) => {
                let result = engine.handle(trigger.clone()).await;
                if let Err(e) = &result {
                    eprintln!("Error processing trigger: {}", e);
                }
                Response::render(&trigger, &result)
            }
            Err(e) => {
                eprintln!("Error reading trigger: {}", e);
                Response::failure(&e)
            }
        };
        serde_json::to_writer(&mut out, &response).into_diagnostic()?;
        writeln!(out).into_diagnostic()?;
        processed += 1;
    }
    out.flush().into_diagnostic()?;

    info!(processed, "finished processing triggers");
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(
    db_path: Option<PathBuf>,
    notifier: NotifierRef,
) -> Result<(Collaborators, Arc<dyn SeedStore>)> {
    use dispatch_ledger::infrastructure::rocksdb::RocksDBStore;

    if let Some(db_path) = db_path {
        let store = Arc::new(RocksDBStore::open(db_path).into_diagnostic()?);
        let seeder: Arc<dyn SeedStore> = store.clone();
        return Ok((Collaborators::from_store(store, notifier), seeder));
    }
    Ok(in_memory(notifier))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(
    db_path: Option<PathBuf>,
    notifier: NotifierRef,
) -> Result<(Collaborators, Arc<dyn SeedStore>)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
        tracing::warn!("storage-rocksdb feature disabled, using in-memory storage");
    }
    Ok(in_memory(notifier))
}

fn in_memory(notifier: NotifierRef) -> (Collaborators, Arc<dyn SeedStore>) {
    let store = Arc::new(InMemoryStore::new());
    let seeder: Arc<dyn SeedStore> = store.clone();
    (Collaborators::from_store(store, notifier), seeder)
}
