use thiserror::Error;

/// Type alias for Result with ClassifierError
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Error types for the classification pipeline
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Unknown provider name or missing settings entry
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Provider response does not match the expected schema
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Network failure talking to a hosted provider
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Provider returned a non-success HTTP status
    #[error("Provider error (HTTP {status}): {message}")]
    ProviderStatus { status: u16, message: String },

    /// Local model inference failure
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Failure loading groups or rules from a store
    #[error("Store error: {0}")]
    StoreError(String),

    /// Illegal processing job state transition
    #[error("Job error: {0}")]
    JobError(String),

    /// IO error (model files, config files, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ClassifierError {
    /// Check if the error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClassifierError::TransportError(_)
                | ClassifierError::ProviderStatus { status: 429, .. }
                | ClassifierError::ProviderStatus {
                    status: 500..=599,
                    ..
                }
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}
