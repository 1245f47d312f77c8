use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Graph store error: {0}")]
    StoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ScanError {
    /// Wrap any displayable backend failure as a store error.
    pub fn store(err: impl std::fmt::Display) -> Self {
        ScanError::StoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
