use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' already exists in table '{1}'")]
    ColumnExists(String, String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<tokio::time::error::Elapsed> for DbError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::LockError(format!("lock wait timed out ({err})"))
    }
}
