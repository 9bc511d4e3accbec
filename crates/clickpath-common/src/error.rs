use thiserror::Error;

/// Errors decoding messages exchanged with the page or the application.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing field '{0}'")]
    MissingField(&'static str),
}

/// Reasons a selector could not be produced for an element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The robust-path provider has not finished loading.
    #[error("Robust path algorithm not ready ({state})")]
    NotReady { state: String },
    #[error("Target node is not an element")]
    NotAnElement,
    #[error("Target element is not attached to the document")]
    Detached,
    #[error("No unique path found after {limit} candidates")]
    SearchExhausted { limit: usize },
    #[error("Failed to load robust path algorithm: {0}")]
    Load(String),
}

impl SelectorError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, SelectorError::NotReady { .. })
    }
}
