use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
}

impl DomainError {
    /// True when a backend error reports `column` as absent from the schema.
    ///
    /// Backends phrase this differently ("column x does not exist", "Could not
    /// find the 'x' column of 'y' in the schema cache"), so the check is a
    /// case-insensitive substring match on both `column` and the column name.
    pub fn is_missing_column(&self, column: &str) -> bool {
        let DomainError::Backend(message) = self else {
            return false;
        };
        let message = message.to_lowercase();
        message.contains("column") && message.contains(&column.to_lowercase())
    }
}
