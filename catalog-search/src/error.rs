use thiserror::Error;

/// Failure talking to a course source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// Failure loading or saving stored preferences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid preferences: {0}")]
    Parse(String),
}

impl SourceError {
    /// Message shown next to the retry button.
    pub fn user_message(&self) -> String {
        match self {
            SourceError::Network(_) => {
                "We couldn't reach the course catalog. Check your connection and try again."
                    .to_string()
            }
            SourceError::Status(code) if *code >= 500 => {
                "The course catalog is temporarily unavailable. Please try again.".to_string()
            }
            SourceError::Status(_) | SourceError::Decode(_) => {
                "Courses could not be loaded. Please try again.".to_string()
            }
        }
    }
}
