mod common;

use common::{RecordingStore, count_rows, ledger_charges, sentence, table_exists};
use printlog_billing::{
    domain::UserId,
    engine::{BatchProcessor, BatchState, FailureStage, process_batch},
    parsing::LogRow,
    store::SqliteStore,
};
use rust_decimal::dec;

#[test]
fn clean_batch_is_committed() -> anyhow::Result<()> {
    let mut conn = common::database()?;
    let store = SqliteStore::begin(&mut conn, &Default::default())?;

    let outcome = process_batch(
        store,
        [
            (sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012"),
            (sentence(2, "Slides", "108109109", "A4-4515x", 1), "10-08-2012"),
        ],
    )?;

    assert_eq!(outcome.state, BatchState::Committed);
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.recorded, 2);
    assert!(!outcome.failed());
    // 2.25 + 1.75
    assert_eq!(
        ledger_charges(&conn, "108109109", "Aug2012")?,
        Some(dec!(4.00))
    );
    assert_eq!(count_rows(&conn, "TEMPAug2012")?, 2);
    Ok(())
}

/// One malformed row rolls back the whole batch, including the month table
/// the valid rows created, and leaves earlier ledger totals untouched.
#[test]
fn malformed_row_rolls_back_whole_batch() -> anyhow::Result<()> {
    let mut conn = common::database()?;
    conn.execute(
        "INSERT INTO csgled (rollno, remarks, drcr, charges, mon, mo) VALUES ('108109109', 'Printout charges for Aug 2012', 'dr', '5.00', 201208, 'Aug2012')",
        [],
    )?;
    let store = SqliteStore::begin(&mut conn, &Default::default())?;

    let outcome = process_batch(
        store,
        [
            (sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012"),
            ("Document 2, broken row".to_string(), "09-08-2012"),
            (sentence(3, "Thesis", "108109110", "A4-4515x", 40), "09-09-2012"),
        ],
    )?;

    assert_eq!(outcome.state, BatchState::RolledBack);
    assert_eq!(outcome.processed, 3);
    // rows after the failure are still attempted
    assert_eq!(outcome.recorded, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 1);
    assert_eq!(outcome.failures[0].stage, FailureStage::Parse);

    assert_eq!(
        ledger_charges(&conn, "108109109", "Aug2012")?,
        Some(dec!(5.00))
    );
    assert_eq!(ledger_charges(&conn, "108109110", "Sep2012")?, None);
    assert!(!table_exists(&conn, "TEMPAug2012")?);
    assert!(!table_exists(&conn, "TEMPSep2012")?);
    Ok(())
}

#[test]
fn store_failure_is_reported_and_rolls_back() -> anyhow::Result<()> {
    let store = RecordingStore {
        failing_user: Some(UserId::from("108109110")),
        ..Default::default()
    };

    let outcome = process_batch(
        &store,
        [
            (sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012"),
            (sentence(2, "Slides", "108109110", "A4-4515x", 1), "09-08-2012"),
            (sentence(3, "Thesis", "108109111", "A4-4515x", 2), "09-08-2012"),
        ],
    )?;

    assert_eq!(outcome.state, BatchState::RolledBack);
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.recorded, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 1);
    assert_eq!(outcome.failures[0].stage, FailureStage::Persist);
    assert!(outcome.failures[0].reason.starts_with("Persistence error:"));
    // the row after the failing one was still posted
    let rows = store.detail_rows.borrow();
    assert_eq!(rows.last().map(|(_, row)| row.user_id.as_str()), Some("108109111"));
    Ok(())
}

/// Without a price table every row fails to price and nothing is written.
#[test]
fn missing_price_table_persists_nothing() -> anyhow::Result<()> {
    let mut conn = common::database()?;
    conn.execute("DROP TABLE costs", [])?;
    let store = SqliteStore::begin(&mut conn, &Default::default())?;

    let outcome = process_batch(
        store,
        [
            (sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012"),
            (sentence(2, "Slides", "108109110", "A4-4515x", 1), "09-08-2012"),
        ],
    )?;

    assert_eq!(outcome.state, BatchState::RolledBack);
    assert_eq!(outcome.recorded, 0);
    assert_eq!(outcome.failures.len(), 2);
    assert!(
        outcome
            .failures
            .iter()
            .all(|failure| failure.stage == FailureStage::Persist)
    );
    assert_eq!(count_rows(&conn, "csgled")?, 0);
    assert!(!table_exists(&conn, "TEMPAug2012")?);
    Ok(())
}

/// A ledger failure after the detail insert also undoes the new month table.
#[test]
fn missing_ledger_table_undoes_month_table() -> anyhow::Result<()> {
    let mut conn = common::database()?;
    conn.execute("DROP TABLE csgled", [])?;
    let store = SqliteStore::begin(&mut conn, &Default::default())?;

    let outcome = process_batch(
        store,
        [(sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012")],
    )?;

    assert_eq!(outcome.state, BatchState::RolledBack);
    assert_eq!(outcome.failures[0].stage, FailureStage::Persist);
    assert!(!table_exists(&conn, "TEMPAug2012")?);
    Ok(())
}

#[test]
fn blank_rows_are_skipped_without_failing() -> anyhow::Result<()> {
    let store = RecordingStore::default();

    let outcome = process_batch(
        &store,
        [
            ("\r\n".to_string(), ""),
            (" \u{0}a ".to_string(), ""),
            (sentence(1, "Report", "108109109", "A4-4515x", 3), "09-08-2012"),
        ],
    )?;

    assert_eq!(outcome.state, BatchState::Committed);
    assert_eq!(outcome.skipped_blank, 2);
    assert_eq!(outcome.processed, 1);
    assert_eq!(store.detail_rows.borrow().len(), 1);
    Ok(())
}

#[test]
fn control_characters_inside_content_are_ignored() -> anyhow::Result<()> {
    let store = RecordingStore::default();
    let content = sentence(5, "Report", "108109109", "A4-4515x", 3).replace(' ', " \u{0}");

    let outcome = process_batch(&store, [(content, "09-08-2012\r\n")])?;

    assert_eq!(outcome.state, BatchState::Committed);
    let rows = store.detail_rows.borrow();
    assert_eq!(rows[0].1.user_id.as_str(), "108109109");
    assert_eq!(rows[0].1.date, "2012-08-09");
    Ok(())
}

#[test]
fn processor_moves_from_idle_to_terminal_state() -> anyhow::Result<()> {
    let store = RecordingStore::default();
    let mut processor = BatchProcessor::new(&store);
    assert_eq!(processor.state(), BatchState::Idle);

    processor.process_row(Ok(LogRow::new(
        4,
        &sentence(1, "Report", "108109109", "A4-4515x", 3),
        "09-08-2012",
    )));
    assert_eq!(processor.state(), BatchState::Processing);
    assert!(!processor.failed());

    processor.process_row(Ok(LogRow::new(5, "Document 2, nothing else", "09-08-2012")));
    assert!(processor.failed());

    let outcome = processor.finish()?;
    assert_eq!(outcome.state, BatchState::RolledBack);
    assert_eq!(outcome.failures[0].row, 5);
    Ok(())
}

#[test]
fn empty_batch_commits_nothing() -> anyhow::Result<()> {
    let mut conn = common::database()?;
    let store = SqliteStore::begin(&mut conn, &Default::default())?;

    let outcome = process_batch(store, Vec::<(String, String)>::new())?;

    assert_eq!(outcome.state, BatchState::Committed);
    assert_eq!(outcome.processed, 0);
    assert_eq!(count_rows(&conn, "csgled")?, 0);
    Ok(())
}
