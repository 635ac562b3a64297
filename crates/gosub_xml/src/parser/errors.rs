use crate::errors::ParseError;
use gosub_shared::byte_stream::Location;
use log::{error, warn};
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Possible parser errors enumerated. The first group is reported by the tokenizer, the second
/// by the tree builder.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParserError {
    DuplicateAttribute,
    EndTagWithAttributes,
    EntityExpansionLimit,
    EofInCdata,
    EofInComment,
    EofInDoctype,
    EofInProcessingInstruction,
    EofInTag,
    InvalidCharacterReference,
    InvalidFirstCharacterOfTagName,
    LessThanSignInAttributeValue,
    MalformedDeclaration,
    MalformedDoctype,
    MissingAttributeValue,
    MissingQuoteBeforeAttributeValue,
    MissingSemicolonAfterEntity,
    MissingWhitespaceBetweenAttributes,
    NestedComment,
    UnexpectedCharacterInAttributeName,
    UnknownEntity,

    UndefinedMarkupDeclaration,
    UnsupportedEncoding,

    UnsupportedVersion,
    UnexpectedClosingTag,
    MismatchedClosingTag,
    DoctypeAfterContent,
    DeclarationMisplaced,
    UnexpectedEndOfInput,
    MissingRootElement,
}

impl ParserError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserError::DuplicateAttribute => "duplicate-attribute",
            ParserError::EndTagWithAttributes => "end-tag-with-attributes",
            ParserError::EntityExpansionLimit => "entity-expansion-limit",
            ParserError::EofInCdata => "eof-in-cdata",
            ParserError::EofInComment => "eof-in-comment",
            ParserError::EofInDoctype => "eof-in-doctype",
            ParserError::EofInProcessingInstruction => "eof-in-processing-instruction",
            ParserError::EofInTag => "eof-in-tag",
            ParserError::InvalidCharacterReference => "invalid-character-reference",
            ParserError::InvalidFirstCharacterOfTagName => "invalid-first-character-of-tag-name",
            ParserError::LessThanSignInAttributeValue => "less-than-sign-in-attribute-value",
            ParserError::MalformedDeclaration => "malformed-xml-declaration",
            ParserError::MalformedDoctype => "malformed-doctype",
            ParserError::MissingAttributeValue => "missing-attribute-value",
            ParserError::MissingQuoteBeforeAttributeValue => "missing-quote-before-attribute-value",
            ParserError::MissingSemicolonAfterEntity => "missing-semicolon-after-entity",
            ParserError::MissingWhitespaceBetweenAttributes => "missing-whitespace-between-attributes",
            ParserError::NestedComment => "nested-comment",
            ParserError::UnexpectedCharacterInAttributeName => "unexpected-character-in-attribute-name",
            ParserError::UnknownEntity => "unknown-entity",

            ParserError::UndefinedMarkupDeclaration => "undefined-markup-declaration",
            ParserError::UnsupportedEncoding => "unsupported-encoding",

            ParserError::UnsupportedVersion => "unsupported-xml-version",
            ParserError::UnexpectedClosingTag => "unexpected-closing-tag",
            ParserError::MismatchedClosingTag => "mismatched-closing-tag",
            ParserError::DoctypeAfterContent => "doctype-after-content",
            ParserError::DeclarationMisplaced => "xml-declaration-misplaced",
            ParserError::UnexpectedEndOfInput => "unexpected-end-of-input",
            ParserError::MissingRootElement => "missing-root-element",
        }
    }

    /// Fatal errors abort the parse run, all others are reported and parsing continues
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParserError::UnsupportedVersion
                | ParserError::UnexpectedClosingTag
                | ParserError::MismatchedClosingTag
                | ParserError::DoctypeAfterContent
                | ParserError::DeclarationMisplaced
                | ParserError::UnexpectedEndOfInput
                | ParserError::MissingRootElement
        )
    }
}

impl Display for ParserError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback that receives every diagnostic the moment it is reported
pub type ErrorSubscriber = Box<dyn Fn(&ParseError) + Send + Sync>;

type SharedSubscriber = Arc<dyn Fn(&ParseError) + Send + Sync>;

/// The error logger is shared between the tokenizer and the tree builder. It keeps all reported
/// errors and hands each of them to the subscribers.
#[derive(Default)]
pub struct ErrorLogger {
    /// List of errors that occurred during parsing
    errors: Vec<ParseError>,
    /// Callbacks interested in errors
    subscribers: Vec<SharedSubscriber>,
    /// Keep reporting errors with the same code on the same position
    keep_duplicates: bool,
}

impl ErrorLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an error logger that does not fold identical errors on the same position
    pub fn with_duplicates() -> Self {
        Self {
            keep_duplicates: true,
            ..Self::default()
        }
    }

    /// Returns a cloned instance of the errors
    pub fn get_errors(&self) -> Vec<ParseError> {
        self.errors.clone()
    }

    pub fn subscribe(&mut self, subscriber: ErrorSubscriber) {
        self.subscribers.push(Arc::from(subscriber));
    }

    /// Adds a new error to the error logger and notifies all subscribers
    pub fn add_error(&mut self, location: Location, code: ParserError) {
        if let Some((err, subscribers)) = self.record(location, code) {
            notify(&err, &subscribers);
        }
    }

    /// Stores the error and returns it together with the subscribers that still have to be told.
    /// Returns None when the error was folded into an earlier one.
    fn record(&mut self, location: Location, code: ParserError) -> Option<(ParseError, Vec<SharedSubscriber>)> {
        if !self.keep_duplicates
            && self
                .errors
                .iter()
                .any(|err| err.code == code && err.location == location)
        {
            return None;
        }

        let err = ParseError::new(code, location);
        if err.fatal {
            error!("{} at {:?}", err.message, err.location);
        } else {
            warn!("{} at {:?}", err.message, err.location);
        }

        self.errors.push(err.clone());
        Some((err, self.subscribers.clone()))
    }
}

/// Adds an error to a shared error logger. Subscribers run after the lock is released, so they
/// can read the logger or subscribe others.
pub fn report_error(logger: &Mutex<ErrorLogger>, location: Location, code: ParserError) {
    let recorded = logger.lock().record(location, code);
    if let Some((err, subscribers)) = recorded {
        notify(&err, &subscribers);
    }
}

fn notify(err: &ParseError, subscribers: &[SharedSubscriber]) {
    for subscriber in subscribers {
        subscriber(err);
    }
}
