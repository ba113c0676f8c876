use serde::Serialize;

/// Lifecycle of one batch. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Idle,
    Processing,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The CSV record itself could not be read.
    Read,
    Parse,
    Persist,
}

/// A row that poisoned the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub row: usize,
    pub stage: FailureStage,
    pub reason: String,
}

/// Final report of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub state: BatchState,
    /// Non-blank rows handed to the parser, plus rows that could not be read.
    pub processed: usize,
    /// Rows whose detail row and ledger update were written. They only
    /// persist when `state` is `Committed`.
    pub recorded: usize,
    /// Rows left empty after control characters were stripped.
    pub skipped_blank: usize,
    pub failures: Vec<RowFailure>,
}

impl BatchOutcome {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }
}
