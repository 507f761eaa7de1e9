use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovdeltaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Coverage summary has no \"total\" entry")]
    MissingTotal,

    #[error("Non-finite value cannot be formatted: {0}")]
    NonFinite(f64),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CovdeltaError>;
