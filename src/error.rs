use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// How a failure should be reported to whoever triggered the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    NotFound,
    Server,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: &'static str },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) | Self::CsvError(_) => ErrorClass::Client,
            Self::NotFound { .. } => ErrorClass::NotFound,
            _ => ErrorClass::Server,
        }
    }

    /// Whether re-running the whole invocation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::InternalError(_) | Self::IoError(_)
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}
