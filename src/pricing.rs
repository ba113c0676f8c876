//! Charge computation from the per-printer price table.

use rust_decimal::Decimal;
use tracing::warn;

use crate::store::{LedgerStore, StoreError};

/// Computes the charge for `page_count` pages on `printer_name`.
///
/// A printer with no price rule prints for free: the job is still recorded,
/// with a zero charge. Only database errors fail.
pub fn compute_charge<S: LedgerStore>(
    store: &S,
    printer_name: &str,
    page_count: u32,
) -> Result<Decimal, StoreError> {
    match store.price_rule(printer_name)? {
        Some(rule) => Ok(rule.charge(page_count)),
        None => {
            warn!("No price rule for printer {printer_name}, charging zero");
            Ok(Decimal::ZERO)
        }
    }
}
