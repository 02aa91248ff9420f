//! Error types for GPTQ config resolution

use thiserror::Error;

/// Result type alias using this crate's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, validating, or applying a GPTQ config
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported GPTQ bit width: got {got}, supported {supported:?}")]
    UnsupportedBitWidth { got: i64, supported: &'static [u32] },

    #[error("Missing config key for `{parameter}` (tried {aliases:?})")]
    MissingConfigKey {
        parameter: &'static str,
        aliases: &'static [&'static str],
    },

    #[error("Invalid config value for `{key}`: expected {expected}")]
    InvalidConfigValue { key: String, expected: &'static str },

    #[error("Unclassified GPTQ tensor: {0}")]
    UnclassifiedTensor(String),

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
