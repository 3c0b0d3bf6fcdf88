use thiserror::Error;

use super::types::TaxBracket;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid holding {key}: {reason}")]
    InvalidHolding { key: String, reason: String },
    #[error("no dividend tax rate for the {0:?} bracket")]
    UnhandledTaxBracket(TaxBracket),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
