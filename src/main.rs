use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use printlog_billing::config::{BillingConfig, LITERAL_SKIP_ROWS};
use printlog_billing::domain::PriceRule;
use printlog_billing::engine::{self, BatchState};
use printlog_billing::export::{self, CompletionSignal, ExportRequest};
use printlog_billing::output;
use printlog_billing::store::{self, SqliteStore};

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    if let Some(log_level) = args.log_level {
        tracing_subscriber::fmt().with_max_level(log_level).init();
    }

    let config = args.config();

    let mut conn = rusqlite::Connection::open(&args.database)
        .with_context(|| format!("Cannot open database {}", args.database.display()))?;
    info!("Connected to {}", args.database.display());

    let csv_file = match args.command {
        Command::InitDb => {
            store::ensure_base_tables(&conn, &config)?;
            return Ok(());
        }
        Command::SetPrice {
            printer,
            per_page,
            first_page,
            additional,
        } => {
            let rule = PriceRule::new(per_page, first_page, additional);
            store::upsert_price_rule(&conn, &config, &printer, rule)?;
            return Ok(());
        }
        Command::Load { csv_file } => csv_file,
        Command::Export {
            from,
            to,
            yesterday,
            log_dir,
            timeout_secs,
        } => {
            let today = Local::now().date_naive();
            let request = match (yesterday, from) {
                (true, _) | (false, None) => ExportRequest::yesterday(&log_dir, today),
                (false, Some(from)) => {
                    match ExportRequest::requested(from, to.unwrap_or(today), &log_dir, today) {
                        Some(request) => request,
                        None => return Ok(()),
                    }
                }
            };
            let signal = CompletionSignal::new(export::DEFAULT_SIGNAL_FILE)
                .with_timeout(Duration::from_secs(timeout_secs));
            export::run_export(&request, &signal)?
        }
    };

    let file = File::open(&csv_file)
        .with_context(|| format!("File does not exist {}", csv_file.display()))?;
    let store = SqliteStore::begin(&mut conn, &config)?;
    let outcome = engine::load_log(file, store, &config)?;

    output::print_failures(&outcome, std::io::stdout())?;
    info!(
        "Batch {:?}: {} processed, {} recorded, {} blank, {} failed",
        outcome.state,
        outcome.processed,
        outcome.recorded,
        outcome.skipped_blank,
        outcome.failures.len()
    );
    if outcome.state == BatchState::RolledBack {
        anyhow::bail!("Batch rolled back after {} failed rows", outcome.failures.len());
    }
    Ok(())
}

#[derive(Parser)]
struct Arguments {
    #[arg(long)]
    log_level: Option<tracing::Level>,
    #[arg(long, default_value = "printlog.db")]
    database: PathBuf,
    /// Leading rows of the export to ignore (3 documented, 4 historical).
    #[arg(long, default_value_t = LITERAL_SKIP_ROWS)]
    skip_rows: usize,
    /// Column of the export holding the event message.
    #[arg(long, default_value_t = 0)]
    content_column: usize,
    /// Column of the export holding the event's creation date.
    #[arg(long, default_value_t = 16)]
    date_column: usize,
    #[arg(long, default_value = "TEMP")]
    table_prefix: String,
    #[arg(long, default_value = "costs")]
    price_table: String,
    #[arg(long, default_value = "csgled")]
    ledger_table: String,
    #[command(subcommand)]
    command: Command,
}

impl Arguments {
    fn config(&self) -> BillingConfig {
        BillingConfig {
            skip_rows: self.skip_rows,
            content_column: self.content_column,
            date_column: self.date_column,
            detail_table_prefix: self.table_prefix.clone(),
            price_table: self.price_table.clone(),
            ledger_table: self.ledger_table.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create the price and ledger tables.
    InitDb,
    /// Set the tariff of one printer.
    SetPrice {
        printer: String,
        #[arg(long)]
        per_page: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        first_page: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        additional: Decimal,
    },
    /// Load an already exported log file.
    Load { csv_file: PathBuf },
    /// Export the print log of a date range and load it.
    Export {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, conflicts_with_all = ["from", "to"])]
        yesterday: bool,
        #[arg(long, default_value = ".")]
        log_dir: PathBuf,
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
}
