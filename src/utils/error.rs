use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Failed to decode record: {0}")]
    DecodeError(#[source] serde_json::Error),

    #[error("Failed to encode record: {0}")]
    EncodeError(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid transform spec '{spec}': {reason}")]
    InvalidTransformSpecError { spec: String, reason: String },

    #[error("Pipeline stage failed: {0}")]
    StageError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EtlError>;
