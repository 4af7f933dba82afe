use thiserror::Error;

/// Order storage failures.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("order storage unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
