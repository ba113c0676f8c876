//! Persistence for price rules, month detail tables, and the monthly ledger.
//!
//! `LedgerStore` is the seam between the billing engine and the database. The
//! SQLite implementation wraps a single SQL transaction: nothing it writes is
//! visible to other connections until `commit`, and `rollback` (or dropping
//! the store) discards every write including month tables created on the way.

use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Transaction, params, types::Value};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use tracing::debug;

use crate::config::BillingConfig;
use crate::domain::{LedgerEntry, MonthKey, MonthlyDetailRow, PriceRule, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Column `{column}` does not hold a decimal value")]
    InvalidDecimal { column: &'static str },
    #[error("`{0}` is not a valid table name")]
    InvalidIdentifier(String),
}

pub trait LedgerStore {
    fn price_rule(&self, printer_name: &str) -> Result<Option<PriceRule>, StoreError>;
    fn detail_table_exists(&self, month: MonthKey) -> Result<bool, StoreError>;
    fn create_detail_table(&self, month: MonthKey) -> Result<(), StoreError>;
    fn insert_detail_row(&self, month: MonthKey, row: &MonthlyDetailRow) -> Result<(), StoreError>;
    /// Current running total for `user_id` in `month`, if an entry exists.
    fn ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
    ) -> Result<Option<Decimal>, StoreError>;
    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError>;
    fn update_ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
        charges: Decimal,
    ) -> Result<(), StoreError>;
    /// Makes every write since the store was opened permanent.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
    /// Discards every write since the store was opened.
    fn rollback(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Table names are spliced into SQL text, so only plain identifiers are allowed.
fn checked_identifier(name: &str) -> Result<&str, StoreError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Creates the price and ledger tables when missing.
pub fn ensure_base_tables(conn: &Connection, config: &BillingConfig) -> Result<(), StoreError> {
    let price_table = checked_identifier(&config.price_table)?;
    let ledger_table = checked_identifier(&config.ledger_table)?;
    // Money is kept as decimal text; SQLite's numeric affinity would turn it into REAL.
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {price_table} (
            printername TEXT PRIMARY KEY,
            costperpage TEXT NOT NULL,
            costFirstpage TEXT NOT NULL,
            additionalCost TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {ledger_table} (
            rollno TEXT NOT NULL,
            remarks TEXT,
            drcr TEXT,
            charges TEXT NOT NULL,
            mon INTEGER,
            mo TEXT NOT NULL
        );"
    ))?;
    Ok(())
}

/// Inserts or replaces the tariff of `printer_name`.
pub fn upsert_price_rule(
    conn: &Connection,
    config: &BillingConfig,
    printer_name: &str,
    rule: PriceRule,
) -> Result<(), StoreError> {
    let price_table = checked_identifier(&config.price_table)?;
    conn.execute(
        &format!(
            "INSERT INTO {price_table} (printername, costperpage, costFirstpage, additionalCost)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(printername) DO UPDATE SET
                costperpage = excluded.costperpage,
                costFirstpage = excluded.costFirstpage,
                additionalCost = excluded.additionalCost"
        ),
        params![
            printer_name,
            rule.cost_per_page.to_string(),
            rule.cost_first_page.to_string(),
            rule.additional_cost.to_string(),
        ],
    )?;
    Ok(())
}

/// Reads a money column whatever storage class it ended up in.
fn decimal_from_value(value: Value, column: &'static str) -> Result<Decimal, StoreError> {
    let invalid = || StoreError::InvalidDecimal { column };
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::Integer(i) => Ok(Decimal::from(i)),
        Value::Real(f) => Decimal::from_f64(f).ok_or_else(invalid),
        Value::Text(s) => Decimal::from_str(s.trim()).map_err(|_| invalid()),
        Value::Blob(_) => Err(invalid()),
    }
}

pub struct SqliteStore<'conn> {
    tx: Transaction<'conn>,
    detail_table_prefix: String,
    price_table: String,
    ledger_table: String,
}

impl<'conn> SqliteStore<'conn> {
    /// Opens the batch transaction on `conn`. The connection stays borrowed
    /// until the store is committed or rolled back.
    pub fn begin(conn: &'conn mut Connection, config: &BillingConfig) -> Result<Self, StoreError> {
        let detail_table_prefix = checked_identifier(&config.detail_table_prefix)?.to_string();
        let price_table = checked_identifier(&config.price_table)?.to_string();
        let ledger_table = checked_identifier(&config.ledger_table)?.to_string();
        Ok(Self {
            tx: conn.transaction()?,
            detail_table_prefix,
            price_table,
            ledger_table,
        })
    }

    fn detail_table(&self, month: MonthKey) -> String {
        month.table_name(&self.detail_table_prefix)
    }
}

impl LedgerStore for SqliteStore<'_> {
    fn price_rule(&self, printer_name: &str) -> Result<Option<PriceRule>, StoreError> {
        let row = self
            .tx
            .query_row(
                &format!(
                    "SELECT costperpage, costFirstpage, additionalCost FROM {} WHERE printername = ?1",
                    self.price_table
                ),
                params![printer_name],
                |row| Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?, row.get::<_, Value>(2)?)),
            )
            .optional()?;
        let Some((per_page, first_page, additional)) = row else {
            return Ok(None);
        };
        Ok(Some(PriceRule::new(
            decimal_from_value(per_page, "costperpage")?,
            decimal_from_value(first_page, "costFirstpage")?,
            decimal_from_value(additional, "additionalCost")?,
        )))
    }

    fn detail_table_exists(&self, month: MonthKey) -> Result<bool, StoreError> {
        let found = self
            .tx
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.detail_table(month)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_detail_table(&self, month: MonthKey) -> Result<(), StoreError> {
        let table = self.detail_table(month);
        debug!("Creating detail table {table}");
        self.tx.execute_batch(&format!(
            "CREATE TABLE {table} (
                rollno VARCHAR(11),
                cdate VARCHAR(10),
                doc VARCHAR(50),
                pages INTEGER,
                printer VARCHAR(25),
                charges TEXT,
                bannerid INTEGER,
                filename VARCHAR(100)
            );"
        ))?;
        Ok(())
    }

    fn insert_detail_row(&self, month: MonthKey, row: &MonthlyDetailRow) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "INSERT INTO {} (rollno, cdate, doc, pages, printer, charges, bannerid, filename)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                self.detail_table(month)
            ),
            params![
                row.user_id.as_str(),
                row.date,
                row.time,
                row.pages,
                row.printer_name,
                row.charges.to_string(),
                u32::from(row.banner_id),
                row.document_name,
            ],
        )?;
        Ok(())
    }

    fn ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
    ) -> Result<Option<Decimal>, StoreError> {
        let charges = self
            .tx
            .query_row(
                &format!(
                    "SELECT charges FROM {} WHERE rollno = ?1 AND mo = ?2",
                    self.ledger_table
                ),
                params![user_id.as_str(), month.to_string()],
                |row| row.get::<_, Value>(0),
            )
            .optional()?;
        charges
            .map(|value| decimal_from_value(value, "charges"))
            .transpose()
    }

    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "INSERT INTO {} (rollno, remarks, drcr, charges, mon, mo) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.ledger_table
            ),
            params![
                entry.user_id.as_str(),
                entry.remarks,
                entry.drcr,
                entry.charges.to_string(),
                entry.month.code(),
                entry.month.to_string(),
            ],
        )?;
        Ok(())
    }

    fn update_ledger_charges(
        &self,
        user_id: &UserId,
        month: MonthKey,
        charges: Decimal,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "UPDATE {} SET charges = ?1 WHERE rollno = ?2 AND mo = ?3",
                self.ledger_table
            ),
            params![charges.to_string(), user_id.as_str(), month.to_string()],
        )?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}
