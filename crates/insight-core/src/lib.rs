use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Tool execution failed for '{tool}': {message}")]
    ToolError { tool: String, message: String },

    #[error("Prompt rendering failed for '{prompt}': {message}")]
    PromptError { prompt: String, message: String },

    #[error("MCP communication error: {0}")]
    McpError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl InsightError {
    /// Shorthand for tool failures, the most common construction site.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn prompt(prompt: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PromptError {
            prompt: prompt.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
