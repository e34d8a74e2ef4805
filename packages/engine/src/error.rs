//! Error types for packet ingestion

use thiserror::Error;

/// Why a packet (or one field of it) could not be used.
///
/// None of these ever leave the engine: they are logged at the packet
/// boundary and ingestion carries on.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Schema error: {0}")]
    Schema(String),
}

impl IngestError {
    /// Malformed input, as opposed to well-formed input of the wrong shape
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            IngestError::Json(_) | IngestError::InvalidNumber(_) | IngestError::InvalidKey(_)
        )
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
