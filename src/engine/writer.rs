//! Posts print events to the month detail tables and the running ledger.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::{LedgerEntry, MonthKey, MonthlyDetailRow, PrintingEvent};
use crate::store::{LedgerStore, StoreError};

pub struct LedgerWriter<S> {
    store: S,
    /// Month whose detail table is known to exist. Rows of one export are
    /// mostly from the same month, so the catalog is only queried when the
    /// month changes.
    current_month: Option<MonthKey>,
}

impl<S: LedgerStore> LedgerWriter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current_month: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates the detail table of `month` unless it already exists. Returns
    /// whether a table was created.
    pub fn ensure_month_table(&mut self, month: MonthKey) -> Result<bool, StoreError> {
        if self.current_month == Some(month) {
            return Ok(false);
        }
        let created = if self.store.detail_table_exists(month)? {
            false
        } else {
            info!("Creating detail table for {month}");
            self.store.create_detail_table(month)?;
            true
        };
        self.current_month = Some(month);
        Ok(created)
    }

    /// Writes the detail row for `event` and adds `charge` to the user's
    /// ledger entry for the month, opening the entry on first use.
    pub fn record(&mut self, event: &PrintingEvent, charge: Decimal) -> Result<(), StoreError> {
        let month = event.month_key();
        self.ensure_month_table(month)?;

        self.store
            .insert_detail_row(month, &MonthlyDetailRow::new(event, charge))?;

        let user_id = event.user_id();
        match self.store.ledger_charges(user_id, month)? {
            None => {
                let entry = LedgerEntry::opening(user_id.clone(), month, charge);
                self.store.insert_ledger_entry(&entry)?;
            }
            Some(existing) => {
                self.store
                    .update_ledger_charges(user_id, month, existing + charge)?;
            }
        }
        Ok(())
    }
}
