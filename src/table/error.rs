/// Errors that can occur while reading or writing tabular artifacts
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// The key column is absent from a CSV header
    #[error("Missing key column: {0}")]
    MissingKeyColumn(String),

    /// The same column name appears twice in a CSV header
    #[error("Duplicate column in header: {0}")]
    DuplicateColumn(String),
}
