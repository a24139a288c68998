pub mod aggregate;
pub mod apportion;
pub mod config;
pub mod engine;
pub mod error;
pub mod ndfl;
pub mod parse;
pub mod types;
pub mod vat;

pub use error::FinmodelError;
pub use types::*;

/// Standard result type for all finmodel operations
pub type FinmodelResult<T> = Result<T, FinmodelError>;
