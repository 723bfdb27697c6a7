use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaestroError {
    // Graph errors
    #[error("Invalid workflow topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    // LLM errors
    #[error("Completion failed: {0}")]
    CompletionFailure(String),

    // Conversation errors
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Failed to deserialize conversation thread: {0}")]
    DeserializationFailure(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Agent errors
    #[error("Agent exceeded max tool rounds ({0})")]
    MaxTurnsExceeded(usize),

    #[error("Orchestration cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Tracking errors
    #[error("Tracking error: {0}")]
    Tracking(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MaestroError>;
