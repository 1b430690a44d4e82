use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    Unavailable,
    ConstraintViolation,
}

/// Failure raised by the currency store. An empty fetch is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("currency store unavailable: {0}")]
    Unavailable(String),
    #[error("currency record rejected by store: {0}")]
    ConstraintViolation(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation(message.into())
    }

    pub fn code(&self) -> StoreErrorCode {
        match self {
            StoreError::Unavailable(_) => StoreErrorCode::Unavailable,
            StoreError::ConstraintViolation(_) => StoreErrorCode::ConstraintViolation,
        }
    }
}
