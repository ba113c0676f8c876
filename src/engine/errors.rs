use crate::parsing::{CsvRowError, ParseError};
use crate::store::StoreError;

use super::types::FailureStage;

/// Why a single log row did not reach the ledger.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{0}")]
    Csv(#[from] CsvRowError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}

impl RecordError {
    pub fn stage(&self) -> FailureStage {
        match self {
            RecordError::Csv(_) => FailureStage::Read,
            RecordError::Parse(_) => FailureStage::Parse,
            RecordError::Store(_) => FailureStage::Persist,
        }
    }
}
