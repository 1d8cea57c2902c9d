use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Data provider error: {0}")]
    DataProvider(String),

    #[error("Calculation error: {0}")]
    Calculation(String),
}

impl ValuationError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ValuationError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
