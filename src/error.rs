//! Structured error types for pdsgen.
//!
//! Parse failures carry a hint for the user. Everything else is a short
//! message: nothing in the editing or rendering path is fatal.

use thiserror::Error;

/// The unified error type returned by all public pdsgen API functions.
#[derive(Debug, Error)]
pub enum PdsError {
    /// JSON input failed to parse as a layout document or data source.
    #[error("Failed to parse document: {source}{}", format_hint(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An image could not be fetched, read or decoded.
    #[error("Image error: {0}")]
    Image(String),
    /// User input was rejected; nothing was changed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The data source is missing, empty or malformed.
    #[error("Data error: {0}")]
    Data(String),
    /// Page rendering or PDF serialization failed.
    #[error("Render error: {0}")]
    Render(String),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for PdsError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the expected schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input; is the file truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        PdsError::Parse { source: e, hint }
    }
}
