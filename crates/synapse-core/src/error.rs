use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynapseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graph database error: {0}")]
    Graph(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Reasoning error: {0}")]
    Reasoning(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SynapseError>;
