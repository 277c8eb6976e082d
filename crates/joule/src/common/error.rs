use thiserror::Error;

#[derive(Debug, Error)]
pub enum JouleError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Scheduler error: {0}")]
    SchedulerError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<serde_json::error::Error> for JouleError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<String> for JouleError {
    fn from(e: String) -> Self {
        Self::GenericError(e)
    }
}

impl From<&str> for JouleError {
    fn from(e: &str) -> Self {
        Self::GenericError(e.to_string())
    }
}
