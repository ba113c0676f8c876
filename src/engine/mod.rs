//! Batch driver.
//!
//! Runs every row of one export through parse, price, and post, in file
//! order. A failing row is reported and skipped but poisons the batch: the
//! store is committed only if every non-blank row was posted, otherwise every
//! write of the batch is rolled back so detail rows and ledger totals always
//! reconcile.

use tracing::{error, info, warn};

use crate::config::BillingConfig;
use crate::parsing::{self, CsvRowError, LogRow};
use crate::pricing;
use crate::store::{LedgerStore, StoreError};
pub use errors::RecordError;
pub use types::{BatchOutcome, BatchState, FailureStage, RowFailure};
pub use writer::LedgerWriter;

pub mod errors;
mod types;
pub mod writer;

pub struct BatchProcessor<S> {
    writer: LedgerWriter<S>,
    state: BatchState,
    processed: usize,
    recorded: usize,
    skipped_blank: usize,
    failures: Vec<RowFailure>,
}

impl<S: LedgerStore> BatchProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            writer: LedgerWriter::new(store),
            state: BatchState::Idle,
            processed: 0,
            recorded: 0,
            skipped_blank: 0,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    fn record_row(&mut self, row: &LogRow) -> Result<(), RecordError> {
        let event = parsing::parse_event(&row.content, &row.date_text)?;
        let charge = pricing::compute_charge(
            self.writer.store(),
            event.printer_name(),
            event.page_count(),
        )?;
        self.writer.record(&event, charge)?;
        Ok(())
    }

    fn fail(&mut self, row: usize, e: RecordError) {
        error!("Row {row} failed: {e}");
        self.failures.push(RowFailure {
            row,
            stage: e.stage(),
            reason: e.to_string(),
        });
    }

    pub fn process_row(&mut self, row: Result<LogRow, CsvRowError>) {
        self.state = BatchState::Processing;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                self.processed += 1;
                let index = e.row;
                self.fail(index, e.into());
                return;
            }
        };
        if row.is_blank() {
            self.skipped_blank += 1;
            return;
        }
        self.processed += 1;
        match self.record_row(&row) {
            Ok(()) => self.recorded += 1,
            Err(e) => {
                warn!("Dropping row {} with content: {}", row.row, row.content);
                self.fail(row.row, e);
            }
        }
    }

    pub fn process_rows(&mut self, rows: impl IntoIterator<Item = Result<LogRow, CsvRowError>>) {
        for row in rows {
            self.process_row(row);
        }
    }

    /// Commits the batch if no row failed, rolls it back otherwise.
    pub fn finish(self) -> Result<BatchOutcome, StoreError> {
        let store = self.writer.into_store();
        let state = if self.failures.is_empty() {
            info!("Committing {} recorded rows", self.recorded);
            store.commit()?;
            BatchState::Committed
        } else {
            error!(
                "Rolling back batch: {} of {} rows failed",
                self.failures.len(),
                self.processed
            );
            store.rollback()?;
            BatchState::RolledBack
        };
        Ok(BatchOutcome {
            state,
            processed: self.processed,
            recorded: self.recorded,
            skipped_blank: self.skipped_blank,
            failures: self.failures,
        })
    }
}

/// Processes already-extracted `(content, date)` pairs as one batch.
pub fn process_batch<S, I, C, D>(store: S, rows: I) -> Result<BatchOutcome, StoreError>
where
    S: LedgerStore,
    I: IntoIterator<Item = (C, D)>,
    C: AsRef<str>,
    D: AsRef<str>,
{
    let mut processor = BatchProcessor::new(store);
    for (index, (content, date_text)) in rows.into_iter().enumerate() {
        processor.process_row(Ok(LogRow::new(index, content.as_ref(), date_text.as_ref())));
    }
    processor.finish()
}

/// Loads one exported log file as a single batch.
pub fn load_log<S: LedgerStore, R: std::io::Read>(
    input: R,
    store: S,
    config: &BillingConfig,
) -> Result<BatchOutcome, StoreError> {
    info!("Parsing exported log");
    let mut reader = parsing::log_reader(input);
    let mut processor = BatchProcessor::new(store);
    processor.process_rows(parsing::read_log_rows(&mut reader, config));
    if processor.state() == BatchState::Idle {
        warn!("No content to parse in file");
    }
    processor.finish()
}
