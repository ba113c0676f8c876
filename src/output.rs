//! Serializes the batch report to CSV.

use serde::Serialize;

use crate::engine::{BatchOutcome, FailureStage};

/// Maps directly to the report columns: row, stage, reason.
#[derive(Debug, Serialize)]
struct FailureCsv<'a> {
    row: usize,
    stage: FailureStage,
    reason: &'a str,
}

/// Writes one line per failed row. A clean batch produces only the header.
pub fn print_failures(outcome: &BatchOutcome, writer: impl std::io::Write) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(["row", "stage", "reason"])?;
    for failure in &outcome.failures {
        wtr.serialize(FailureCsv {
            row: failure.row,
            stage: failure.stage,
            reason: &failure.reason,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
