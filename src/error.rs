use std::path::PathBuf;

use thiserror::Error;

/// Structural violation found while parsing a CSV export.
#[derive(Debug, Error)]
#[error("invalid CSV format at line {line}: missing columns")]
pub struct FormatError {
    /// 1-based index among the retained (non-blank) records.
    pub line: usize,
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{} is not a CSV file", path.display())]
    InputType { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("link already classified: {0}")]
    DuplicateClassification(String),

    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("export delivery failed: {0}")]
    Delivery(#[source] std::io::Error),

    /// The export was delivered but the stored ledger is still in place;
    /// exporting again repeats these entries.
    #[error("exported {file_name} but failed to clear the ledger: {source}")]
    Reset {
        file_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
