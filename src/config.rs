//! Loader configuration, passed explicitly to the components that need it.

/// Rows skipped at the top of an export by the historical loader. The export
/// carries a `#TYPE` line and a header line, and the loader has always started
/// reading at row index 4.
pub const LITERAL_SKIP_ROWS: usize = 4;
/// Number of metadata rows the loader was documented to skip.
pub const DOCUMENTED_SKIP_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Leading CSV rows ignored before data rows begin.
    pub skip_rows: usize,
    /// Column holding the event message.
    pub content_column: usize,
    /// Column holding the event's creation date.
    pub date_column: usize,
    /// Month detail tables are named `{prefix}{Mon}{yyyy}`. They stay
    /// provisional until finalized outside the loader.
    pub detail_table_prefix: String,
    pub price_table: String,
    pub ledger_table: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            skip_rows: LITERAL_SKIP_ROWS,
            content_column: 0,
            date_column: 16,
            detail_table_prefix: "TEMP".to_string(),
            price_table: "costs".to_string(),
            ledger_table: "csgled".to_string(),
        }
    }
}
