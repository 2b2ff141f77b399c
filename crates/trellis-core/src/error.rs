use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrellisError {
    // Graph build errors
    #[error("Stage already registered: {0}")]
    DuplicateStage(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Conditional edge from '{0}' has an empty routing map")]
    EmptyRoutingMap(String),

    #[error("Graph validation failed: {0}")]
    GraphValidation(String),

    // Graph run errors
    #[error("Router for stage '{stage}' returned unmapped label '{label}'")]
    UnmappedRoutingLabel { stage: String, label: String },

    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("State merge error: {0}")]
    StateMerge(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // OCR errors
    #[error("OCR error: {0}")]
    Ocr(String),

    // Embedding errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
