use thiserror::Error;

/// Errors that can occur during financial-model computations
#[derive(Debug, Error)]
pub enum FinmodelError {
    #[error("Missing required input: {field}")]
    MissingInput { field: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown tax mode: '{value}' (expected Доходы, Доходы-Расходы or ОСНО)")]
    UnknownTaxMode { value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FinmodelError {
    fn from(e: serde_json::Error) -> Self {
        FinmodelError::SerializationError(e.to_string())
    }
}
