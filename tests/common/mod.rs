use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use printlog_billing::{
    config::BillingConfig,
    domain::{LedgerEntry, MonthKey, MonthlyDetailRow, PriceRule, UserId},
    store::{self, LedgerStore, StoreError},
};
use rusqlite::Connection;
use rust_decimal::{Decimal, dec};

/// Builds a log sentence in the spooler's template.
pub fn sentence(banner: u32, document: &str, user: &str, printer: &str, pages: u32) -> String {
    format!(
        "Document {banner}, {document} owned by {user} on \\\\10.1.34.21 was printed on {printer} \
         through port 10.0.0.43_2.  Size in bytes: 201625. Pages printed: {pages}. No user action is required."
    )
}

/// In-memory database with the base tables and a tariff for `A4-4515x`
/// (first page 1.00, surcharge 0.50, 0.25 per page).
#[allow(dead_code)]
pub fn database() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    let config = BillingConfig::default();
    store::ensure_base_tables(&conn, &config)?;
    store::upsert_price_rule(
        &conn,
        &config,
        "A4-4515x",
        PriceRule::new(dec!(0.25), dec!(1.00), dec!(0.50)),
    )?;
    Ok(conn)
}

#[allow(dead_code)]
pub fn ledger_charges(conn: &Connection, user: &str, month: &str) -> anyhow::Result<Option<Decimal>> {
    let mut stmt = conn.prepare("SELECT charges FROM csgled WHERE rollno = ?1 AND mo = ?2")?;
    let mut rows = stmt.query([user, month])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get::<_, String>(0)?.parse()?)),
        None => Ok(None),
    }
}

#[allow(dead_code)]
pub fn count_rows(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}

#[allow(dead_code)]
pub fn table_exists(conn: &Connection, table: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Store kept in memory that counts catalog lookups and table creations.
/// Detail inserts for `failing_user` fail as if the disk were full.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingStore {
    pub failing_user: Option<UserId>,
    pub prices: HashMap<String, PriceRule>,
    pub tables: RefCell<HashSet<MonthKey>>,
    pub detail_rows: RefCell<Vec<(MonthKey, MonthlyDetailRow)>>,
    pub ledger: RefCell<HashMap<(UserId, MonthKey), LedgerEntry>>,
    pub exists_checks: Cell<usize>,
    pub creations: Cell<usize>,
}

impl LedgerStore for &RecordingStore {
    fn price_rule(&self, printer_name: &str) -> Result<Option<PriceRule>, StoreError> {
        Ok(self.prices.get(printer_name).copied())
    }
    fn detail_table_exists(&self, month: MonthKey) -> Result<bool, StoreError> {
        self.exists_checks.set(self.exists_checks.get() + 1);
        Ok(self.tables.borrow().contains(&month))
    }
    fn create_detail_table(&self, month: MonthKey) -> Result<(), StoreError> {
        self.creations.set(self.creations.get() + 1);
        self.tables.borrow_mut().insert(month);
        Ok(())
    }
    fn insert_detail_row(&self, month: MonthKey, row: &MonthlyDetailRow) -> Result<(), StoreError> {
        if self.failing_user.as_ref() == Some(&row.user_id) {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                None,
            )
            .into());
        }
        self.detail_rows.borrow_mut().push((month, row.clone()));
        Ok(())
    }
    fn ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
    ) -> Result<Option<Decimal>, StoreError> {
        Ok(self
            .ledger
            .borrow()
            .get(&(user_id.clone(), month))
            .map(|entry| entry.charges))
    }
    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.ledger
            .borrow_mut()
            .insert((entry.user_id.clone(), entry.month), entry.clone());
        Ok(())
    }
    fn update_ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
        charges: Decimal,
    ) -> Result<(), StoreError> {
        if let Some(entry) = self.ledger.borrow_mut().get_mut(&(user_id.clone(), month)) {
            entry.charges = charges;
        }
        Ok(())
    }
    fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }
    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
