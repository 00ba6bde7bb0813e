//! Error types for alert parsing operations

use thiserror::Error;

/// Errors that can occur while turning a notification frame into an alert
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The frame is not valid UTF-8
    #[error("Frame is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// XML deserialization failed
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// Invalid XML structure
    #[error("Invalid XML structure: {0}")]
    InvalidXmlStructure(String),

    /// The document root is not the expected element
    #[error("Unexpected root element: expected {expected}, found {found}")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    /// A field held a value that could not be interpreted
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
