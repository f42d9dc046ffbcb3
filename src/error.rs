use thiserror::Error;

pub type TradeWhispersResult<T> = Result<T, TradeWhispersError>;

#[derive(Debug, Error)]
pub enum TradeWhispersError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised while validating an [`EvalConfig`](crate::config::EvalConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid horizon '{0}': must be a positive number of minutes")]
    InvalidHorizon(String),

    #[error("Invalid pip threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),

    #[error("Invalid starting balance {0}: must be finite and positive")]
    InvalidBalance(f64),
}

/// Errors related to input tables and DataFrame computations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Missing mandatory column '{column}' in the {table} table")]
    MissingColumn { table: String, column: String },

    #[error("Unreadable timestamps in {table}.{column}: {msg}")]
    TimestampParse {
        table: String,
        column: String,
        msg: String,
    },

    #[error("Unsupported prediction dtype '{0}': expected strings or signed integers")]
    PredictionType(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to report export.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),
}

pub(crate) fn polars_err(context: &str, e: polars::error::PolarsError) -> TradeWhispersError {
    TradeWhispersError::Data(DataError::DataFrame(format!("{context}: {e}")))
}
