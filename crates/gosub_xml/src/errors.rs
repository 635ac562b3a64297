//! Error results that can be returned from the xml parser
use crate::parser::errors::ParserError;
use gosub_shared::byte_stream::Location;
use thiserror::Error;

/// A single diagnostic record as it flows through the error logger. Both the tokenizer and the
/// tree builder produce these.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    /// Error code
    pub code: ParserError,
    /// Parse error message, as resolved from the code
    pub message: String,
    /// Location of the error
    pub location: Location,
    /// True when the error aborted the parse
    pub fatal: bool,
}

impl ParseError {
    pub fn new(code: ParserError, location: Location) -> Self {
        Self {
            code,
            message: code.as_str().to_string(),
            location,
            fatal: code.is_fatal(),
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }
}

/// Errors that end a parse run
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Structural violation in the document. The run is aborted.
    #[error("{kind} at {location:?}")]
    Fatal { kind: ParserError, location: Location },

    /// The parse task was driven in a way that is not allowed
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("parse task error: {0}")]
    Task(String),
}

impl Error {
    /// Returns the error kind of a fatal parse error
    pub fn kind(&self) -> Option<ParserError> {
        match self {
            Error::Fatal { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result that can be returned which holds either T or an Error
pub type Result<T> = std::result::Result<T, Error>;
