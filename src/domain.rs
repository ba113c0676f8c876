//! Core domain types: print events, price rules, month keys, and ledger rows.

use chrono::{Datelike, NaiveDateTime};
use derive_more::{Display, From, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum stored width of a user id (`rollno nvarchar(11)` keeps ten characters).
pub const USER_ID_WIDTH: usize = 10;
/// Maximum stored width of a document name. Jobs printed from URLs or mail
/// attachments routinely carry names far longer than this.
pub const DOCUMENT_NAME_WIDTH: usize = 99;
/// Maximum stored width of a printer name.
pub const PRINTER_NAME_WIDTH: usize = 24;

/// Debit marker written to every ledger entry created by the loader.
pub const DEBIT_MARKER: &str = "dr";

/// Spooler-assigned job identifier, the leading number of each log sentence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display,
)]
pub struct BannerId(u32);

/// Billed account identifier (a roll number for students).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub struct UserId(String);

impl UserId {
    /// Builds a user id, keeping at most [`USER_ID_WIDTH`] characters.
    pub fn new(raw: &str) -> Self {
        Self(truncate_chars(raw, USER_ID_WIDTH))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Returns at most `max` leading characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// One print job as recovered from a single log row. Text fields are already
/// truncated to their stored widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintingEvent {
    banner_id: BannerId,
    user_id: UserId,
    document_name: String,
    printer_name: String,
    page_count: u32,
    printed_at: NaiveDateTime,
}

impl PrintingEvent {
    pub fn new(
        banner_id: BannerId,
        user_id: &str,
        document_name: &str,
        printer_name: &str,
        page_count: u32,
        printed_at: NaiveDateTime,
    ) -> Self {
        Self {
            banner_id,
            user_id: UserId::new(user_id),
            document_name: truncate_chars(document_name, DOCUMENT_NAME_WIDTH),
            printer_name: truncate_chars(printer_name, PRINTER_NAME_WIDTH),
            page_count,
            printed_at,
        }
    }
    pub fn banner_id(&self) -> BannerId {
        self.banner_id
    }
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
    pub fn document_name(&self) -> &str {
        &self.document_name
    }
    pub fn printer_name(&self) -> &str {
        &self.printer_name
    }
    pub fn page_count(&self) -> u32 {
        self.page_count
    }
    pub fn printed_at(&self) -> NaiveDateTime {
        self.printed_at
    }
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from(self.printed_at)
    }
}

/// Per-printer tariff. A job costs the first-page fee plus the fixed
/// surcharge plus the per-page rate for every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRule {
    pub cost_per_page: Decimal,
    pub cost_first_page: Decimal,
    pub additional_cost: Decimal,
}

impl PriceRule {
    pub fn new(
        cost_per_page: Decimal,
        cost_first_page: Decimal,
        additional_cost: Decimal,
    ) -> Self {
        Self {
            cost_per_page,
            cost_first_page,
            additional_cost,
        }
    }

    pub fn charge(&self, page_count: u32) -> Decimal {
        self.cost_first_page
            + self.additional_cost
            + self.cost_per_page * Decimal::from(page_count)
    }
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Calendar month of a print job. Displays as `{Mon}{yyyy}` (e.g. `Aug2012`),
/// which is both the detail-table suffix and the ledger lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    /// 1-based.
    month: u32,
}

impl MonthKey {
    /// Returns `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }
    pub fn year(&self) -> i32 {
        self.year
    }
    pub fn month(&self) -> u32 {
        self.month
    }
    pub fn abbreviation(&self) -> &'static str {
        MONTH_ABBREVIATIONS[(self.month - 1) as usize]
    }
    /// Numeric month code stored in the ledger: `year * 100 + month`.
    pub fn code(&self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.month)
    }
    pub fn table_name(&self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }
    pub fn remarks(&self) -> String {
        format!("Printout charges for {} {}", self.abbreviation(), self.year)
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:04}", self.abbreviation(), self.year)
    }
}

impl From<NaiveDateTime> for MonthKey {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
        }
    }
}

/// One row of a month's detail table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyDetailRow {
    pub user_id: UserId,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub pages: u32,
    pub printer_name: String,
    pub charges: Decimal,
    pub banner_id: BannerId,
    pub document_name: String,
}

impl MonthlyDetailRow {
    pub fn new(event: &PrintingEvent, charges: Decimal) -> Self {
        Self {
            user_id: event.user_id().clone(),
            date: event.printed_at().format("%Y-%m-%d").to_string(),
            time: event.printed_at().format("%H:%M:%S").to_string(),
            pages: event.page_count(),
            printer_name: event.printer_name().to_string(),
            charges,
            banner_id: event.banner_id(),
            document_name: event.document_name().to_string(),
        }
    }
}

/// Running total of one user's charges for one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub remarks: String,
    pub drcr: String,
    pub charges: Decimal,
    pub month: MonthKey,
}

impl LedgerEntry {
    /// First debit of the month for `user_id`.
    pub fn opening(user_id: UserId, month: MonthKey, charges: Decimal) -> Self {
        Self {
            user_id,
            remarks: month.remarks(),
            drcr: DEBIT_MARKER.to_string(),
            charges,
            month,
        }
    }
}
