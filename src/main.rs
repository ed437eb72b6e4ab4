use clap::{Parser, Subcommand};
use fine_payments::application::engine::PaymentEngine;
use fine_payments::application::monitor::{MonitorConfig, PaymentMonitor};
use fine_payments::application::registration::{RegistrationConfig, RegistrationService};
use fine_payments::application::service::PaymentService;
use fine_payments::domain::clock::SystemClock;
use fine_payments::domain::ports::{AuditEventStoreBox, PaymentFeeStoreBox, PaymentStoreBox};
use fine_payments::domain::query::{Page, PaymentFilter};
use fine_payments::domain::status::PaymentStatus;
use fine_payments::infrastructure::in_memory::{
    InMemoryAuditEventStore, InMemoryPaymentFeeStore, InMemoryPaymentStore,
};
use fine_payments::infrastructure::offline_ils::OfflineIls;
#[cfg(feature = "storage-rocksdb")]
use fine_payments::infrastructure::rocksdb::RocksDBStore;
use fine_payments::interfaces::csv::event_reader::EventReader;
use fine_payments::interfaces::csv::payment_writer::PaymentWriter;
use fine_payments::interfaces::csv::report_notifier::CsvReportNotifier;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "FINE_PAYMENTS_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a payment events CSV file and print every payment
    Replay {
        /// Input events CSV file
        input: PathBuf,
    },
    /// Retry, expire and report paid payments that were not registered with the ILS
    Monitor {
        /// Seconds a paid payment may wait before its registration is retried
        #[arg(long, env = "FINE_PAYMENTS_MINIMUM_PAID_AGE", default_value_t = 120)]
        minimum_paid_age: i64,

        /// Minutes between reports of the same unresolved payment
        #[arg(long, env = "FINE_PAYMENTS_REPORT_INTERVAL", default_value_t = 120)]
        report_interval: i64,

        /// Minutes after payment during which registration is retried
        #[arg(long, env = "FINE_PAYMENTS_RETRY_DURATION", default_value_t = 120)]
        retry_duration: i64,

        /// Do not report unresolved payments
        #[arg(long)]
        no_notify: bool,

        /// Events CSV file replayed before the run
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// List payments as CSV, newest first
    List {
        /// Only payments with this status (repeatable, or comma separated)
        #[arg(long = "status", value_delimiter = ',')]
        statuses: Vec<PaymentStatus>,

        /// SQL LIKE pattern for the source ILS
        #[arg(long)]
        source_ils: Option<String>,

        /// SQL LIKE pattern for the patron catalog username
        #[arg(long)]
        cat_username: Option<String>,

        /// Page number, starting at 1. Lists every match when omitted.
        #[arg(long)]
        page: Option<usize>,

        #[arg(long, default_value_t = Page::DEFAULT_LIMIT)]
        limit: usize,

        /// Events CSV file replayed before listing
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fine_payments=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

type Stores = (PaymentStoreBox, PaymentFeeStoreBox, AuditEventStoreBox);

fn build_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        return Ok((Box::new(store.clone()), Box::new(store.clone()), Box::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    Ok((
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryPaymentFeeStore::new()),
        Box::new(InMemoryAuditEventStore::new()),
    ))
}

async fn replay_events(service: &Arc<PaymentService>, input: &Path) -> Result<()> {
    let engine = PaymentEngine::new(service.clone());
    let file = File::open(input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                if let Err(e) = engine.process_event(event).await {
                    error!("Error processing event: {e}");
                }
            }
            Err(e) => {
                error!("Error reading event: {e}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let (payments, fees, events) = build_stores(cli.db_path)?;
    let service = Arc::new(PaymentService::new(payments, fees, events, Arc::new(SystemClock)));

    match cli.command {
        Command::Replay { input } => {
            replay_events(&service, &input).await?;

            let payments = service.all_payments().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = PaymentWriter::new(stdout.lock());
            writer.write_payments(&payments).into_diagnostic()?;
        }
        Command::Monitor {
            minimum_paid_age,
            report_interval,
            retry_duration,
            no_notify,
            events,
        } => {
            let config = MonitorConfig {
                minimum_paid_age_secs: minimum_paid_age,
                report_interval_minutes: report_interval,
                retry_minutes: retry_duration,
                notify: !no_notify,
            };
            config.validate().into_diagnostic()?;

            if let Some(events) = events {
                replay_events(&service, &events).await?;
            }

            let registration = RegistrationService::new(
                service.clone(),
                Box::new(OfflineIls),
                RegistrationConfig::default(),
            );
            let monitor = PaymentMonitor::new(
                service.clone(),
                registration,
                Box::new(CsvReportNotifier::new(io::stdout())),
                config,
            );
            let summary = monitor.run().await.into_diagnostic()?;
            info!(
                registered = summary.registered,
                failed = summary.failed,
                expired = summary.expired,
                reported = summary.reported,
                "Monitor summary"
            );
        }
        Command::List {
            statuses,
            source_ils,
            cat_username,
            page,
            limit,
            events,
        } => {
            if let Some(events) = events {
                replay_events(&service, &events).await?;
            }

            let filter = PaymentFilter {
                statuses,
                source_ils,
                cat_username,
                ..Default::default()
            };
            let page = page.map(|number| Page { number, limit });
            let result = service.search(&filter, page).await.into_diagnostic()?;
            info!("{} matching payments", result.total);

            let stdout = io::stdout();
            let mut writer = PaymentWriter::new(stdout.lock());
            writer.write_payments(&result.items).into_diagnostic()?;
        }
    }

    Ok(())
}
