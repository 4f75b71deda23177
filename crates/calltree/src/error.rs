use thiserror::Error;

pub type Result<T> = std::result::Result<T, CallTreeError>;

#[derive(Error, Debug)]
pub enum CallTreeError {
    #[error("Invalid profile frame at row {row}: {reason}")]
    InvalidFrame { row: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CallTreeError {
    pub fn invalid_frame(row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            row,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Reported (never raised) by the search matcher.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum SearchError {
    #[error("Invalid regex pattern")]
    InvalidPattern,
}
