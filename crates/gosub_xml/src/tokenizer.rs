pub mod character_reference;
pub mod token;

use crate::errors::Result;
use crate::parser::errors::{report_error, ErrorLogger, ParserError};
use crate::tokenizer::character_reference::EntityTable;
use crate::tokenizer::token::{Attribute, Token};
use gosub_shared::byte_stream::Character::{Ch, StreamEmpty, StreamEnd, Surrogate};
use gosub_shared::byte_stream::{ByteStream, Character, Encoding, Location, LocationHandler, Stream};
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::Arc;

pub const CHAR_REPLACEMENT: char = '\u{FFFD}';

/// Everything the tree builder needs from a tokenizer. The builder pulls tokens one by one and
/// never looks at the characters themselves.
pub trait TokenSource {
    /// Retrieves the next token. After the end of the input, this keeps returning `Token::Eof`.
    fn next_token(&mut self) -> Result<Token>;

    /// Returns true when the token carries no meaning outside the document element. The tree
    /// builder skips such tokens before the document element and, in the body, while no element
    /// is open.
    fn is_ignorable(&self, token: &Token) -> bool;

    /// Resolves an entity or character reference name to its replacement text
    fn resolve_entity(&self, name: &str) -> Option<String>;

    /// The verbatim internal subset of the doctype, if any was found
    fn type_definitions(&self) -> &str;

    /// Current position of the source cursor
    fn location(&self) -> Location;

    /// Encoding the source is currently decoded with
    fn encoding(&self) -> Encoding;

    /// Switches the decoder for all characters that have not been read yet. Sources over text
    /// that is already decoded keep their decoder.
    fn set_encoding(&mut self, encoding: Encoding);
}

/// The tokenizer will read the byte stream and emit tokens that can be used by the tree builder.
pub struct Tokenizer {
    /// Character input stream
    stream: ByteStream,
    /// Line/column bookkeeping of the stream
    location_handler: LocationHandler,
    /// Known general entities
    entities: EntityTable,
    /// Raw internal subset of the doctype
    type_definitions: String,
    /// Error logger to log errors to, shared with the tree builder
    error_logger: Arc<Mutex<ErrorLogger>>,
    /// The source is already decoded text, declared encodings do not change the decoder
    fixed_encoding: bool,
}

impl Tokenizer {
    /// Creates a new tokenizer on the given stream. The stream should already be set to the
    /// encoding it starts with.
    pub fn new(stream: ByteStream, start_location: Location, error_logger: Arc<Mutex<ErrorLogger>>) -> Self {
        Self {
            stream,
            location_handler: LocationHandler::new(start_location),
            entities: EntityTable::new(),
            type_definitions: String::new(),
            error_logger,
            fixed_encoding: false,
        }
    }

    /// Keeps the current decoder for the whole input, for streams that were filled from a string
    pub fn with_fixed_encoding(mut self) -> Self {
        self.fixed_encoding = true;
        self
    }

    /// Returns the entity table that references are resolved with
    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    fn parse_error(&self, error: ParserError) {
        report_error(&self.error_logger, self.location_handler.cur_location, error);
    }

    /// Returns the current character without consuming it
    fn current_char(&self) -> Character {
        self.stream.read()
    }

    /// Consumes the current character and moves the location along
    fn next_char(&mut self) -> Character {
        let c = self.stream.read_and_next();
        self.location_handler.inc(c);
        c
    }

    /// Returns the next `len` characters as a string without consuming them
    fn look_ahead_slice(&self, len: usize) -> String {
        let mut s = String::with_capacity(len);
        for i in 0..len {
            match self.stream.look_ahead(i) {
                Ch(c) => s.push(c),
                _ => break,
            }
        }
        s
    }

    /// Consumes `len` characters
    fn skip_chars(&mut self, len: usize) {
        for _ in 0..len {
            self.next_char();
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut found = false;
        while self.current_char().is_whitespace() {
            self.next_char();
            found = true;
        }
        found
    }

    /// Consumes the token at the current position. Returns None when the construct was malformed
    /// beyond repair and has been dropped.
    fn consume_token(&mut self) -> Option<Token> {
        let location = self.location_handler.cur_location;

        match self.current_char() {
            StreamEnd | StreamEmpty => Some(Token::Eof { location }),
            Ch('<') => self.consume_markup(location),
            Ch('&') => Some(self.consume_reference(location)),
            _ => Some(self.consume_text(location)),
        }
    }

    fn consume_text(&mut self, location: Location) -> Token {
        let mut text = String::new();

        loop {
            match self.current_char() {
                Ch('<') | Ch('&') | StreamEnd | StreamEmpty => break,
                Ch(c) => {
                    self.next_char();
                    text.push(c);
                }
                Surrogate(_) => {
                    self.next_char();
                    text.push(CHAR_REPLACEMENT);
                }
            }
        }

        Token::Text { text, location }
    }

    fn consume_markup(&mut self, location: Location) -> Option<Token> {
        if self.look_ahead_slice(4) == "<!--" {
            self.skip_chars(4);
            return Some(self.consume_comment(location));
        }

        if self.look_ahead_slice(9) == "<![CDATA[" {
            self.skip_chars(9);
            return Some(self.consume_cdata(location));
        }

        if self.look_ahead_slice(9) == "<!DOCTYPE" {
            self.skip_chars(9);
            return Some(self.consume_doctype(location));
        }

        match self.stream.look_ahead(1) {
            Ch('?') => {
                self.skip_chars(2);
                self.consume_processing_instruction(location)
            }
            Ch('/') => {
                self.skip_chars(2);
                self.consume_end_tag(location)
            }
            Ch(c) if is_name_start_char(c) => {
                self.next_char();
                self.consume_start_tag(location)
            }
            _ => {
                // A lone "<" is kept as text
                self.next_char();
                self.parse_error(ParserError::InvalidFirstCharacterOfTagName);
                Some(Token::Text {
                    text: "<".to_string(),
                    location,
                })
            }
        }
    }

    fn consume_comment(&mut self, location: Location) -> Token {
        let mut comment = String::new();

        loop {
            if self.look_ahead_slice(3) == "-->" {
                self.skip_chars(3);
                break;
            }

            if self.look_ahead_slice(2) == "--" {
                self.parse_error(ParserError::NestedComment);
            }

            match self.next_char() {
                Ch(c) => comment.push(c),
                Surrogate(_) => comment.push(CHAR_REPLACEMENT),
                StreamEnd | StreamEmpty => {
                    self.parse_error(ParserError::EofInComment);
                    break;
                }
            }
        }

        Token::Comment { comment, location }
    }

    /// CDATA sections end up as plain text
    fn consume_cdata(&mut self, location: Location) -> Token {
        let mut text = String::new();

        loop {
            if self.look_ahead_slice(3) == "]]>" {
                self.skip_chars(3);
                break;
            }

            match self.next_char() {
                Ch(c) => text.push(c),
                Surrogate(_) => text.push(CHAR_REPLACEMENT),
                StreamEnd | StreamEmpty => {
                    self.parse_error(ParserError::EofInCdata);
                    break;
                }
            }
        }

        Token::Text { text, location }
    }

    fn consume_processing_instruction(&mut self, location: Location) -> Option<Token> {
        let target = self.consume_name();

        if target == "xml" {
            return self.consume_declaration(location);
        }

        if target.is_empty() {
            self.parse_error(ParserError::InvalidFirstCharacterOfTagName);
        }

        self.skip_whitespace();

        let mut content = String::new();
        loop {
            if self.look_ahead_slice(2) == "?>" {
                self.skip_chars(2);
                break;
            }

            match self.next_char() {
                Ch(c) => content.push(c),
                Surrogate(_) => content.push(CHAR_REPLACEMENT),
                StreamEnd | StreamEmpty => {
                    self.parse_error(ParserError::EofInProcessingInstruction);
                    return None;
                }
            }
        }

        Some(Token::ProcessingInstruction {
            target,
            content,
            location,
        })
    }

    fn consume_declaration(&mut self, location: Location) -> Option<Token> {
        let attributes = self.consume_attributes(true);

        if self.look_ahead_slice(2) == "?>" {
            self.skip_chars(2);
        } else {
            self.parse_error(ParserError::EofInProcessingInstruction);
            return None;
        }

        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;

        for attr in attributes {
            match attr.name.as_str() {
                "version" if version.is_none() => version = Some(attr.value),
                "encoding" if encoding.is_none() => encoding = Some(attr.value),
                "standalone" if standalone.is_none() => match attr.value.as_str() {
                    "yes" => standalone = Some(true),
                    "no" => standalone = Some(false),
                    _ => self.parse_error(ParserError::MalformedDeclaration),
                },
                _ => self.parse_error(ParserError::MalformedDeclaration),
            }
        }

        if version.is_none() {
            self.parse_error(ParserError::MalformedDeclaration);
        }

        Some(Token::Declaration {
            version: version.unwrap_or_default(),
            encoding,
            standalone,
            location,
        })
    }

    fn consume_start_tag(&mut self, location: Location) -> Option<Token> {
        let name = self.consume_name();
        let attributes = self.consume_attributes(false);

        let is_self_closing = match self.current_char() {
            Ch('/') => {
                self.skip_chars(2);
                true
            }
            Ch('>') => {
                self.next_char();
                false
            }
            _ => {
                self.parse_error(ParserError::EofInTag);
                return None;
            }
        };

        Some(Token::StartTag {
            name,
            is_self_closing,
            attributes,
            location,
        })
    }

    fn consume_end_tag(&mut self, location: Location) -> Option<Token> {
        let name = self.consume_name();
        if name.is_empty() {
            self.parse_error(ParserError::InvalidFirstCharacterOfTagName);
        }

        let attributes = self.consume_attributes(false);
        if !attributes.is_empty() {
            self.parse_error(ParserError::EndTagWithAttributes);
        }

        match self.current_char() {
            Ch('>') => {
                self.next_char();
            }
            Ch('/') => {
                self.skip_chars(2);
            }
            _ => {
                self.parse_error(ParserError::EofInTag);
                return None;
            }
        }

        Some(Token::EndTag { name, location })
    }

    /// Consumes attributes until the end of the tag (`>` or `/>`), or until `?>` for the xml
    /// declaration. The terminating characters are not consumed.
    fn consume_attributes(&mut self, in_declaration: bool) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();

            match self.current_char() {
                StreamEnd | StreamEmpty => break,
                Ch('?') if in_declaration && self.stream.look_ahead(1) == Ch('>') => break,
                Ch('>') if !in_declaration => break,
                Ch('/') if !in_declaration && self.stream.look_ahead(1) == Ch('>') => break,
                Ch(c) if is_name_start_char(c) => {
                    if !had_whitespace && !attributes.is_empty() {
                        self.parse_error(ParserError::MissingWhitespaceBetweenAttributes);
                    }

                    let name = self.consume_name();
                    let value = self.consume_attribute_value();

                    if attributes.iter().any(|attr| attr.name == name) {
                        self.parse_error(ParserError::DuplicateAttribute);
                    }
                    attributes.push(Attribute { name, value });
                }
                _ => {
                    self.parse_error(ParserError::UnexpectedCharacterInAttributeName);
                    self.next_char();
                }
            }
        }

        attributes
    }

    fn consume_attribute_value(&mut self) -> String {
        self.skip_whitespace();
        if self.current_char() != Ch('=') {
            self.parse_error(ParserError::MissingAttributeValue);
            return String::new();
        }
        self.next_char();
        self.skip_whitespace();

        let quote = match self.current_char() {
            Ch(q @ ('"' | '\'')) => {
                self.next_char();
                Some(q)
            }
            _ => {
                self.parse_error(ParserError::MissingQuoteBeforeAttributeValue);
                None
            }
        };

        let mut value = String::new();
        loop {
            match self.current_char() {
                StreamEnd | StreamEmpty => break,
                Ch(c) if Some(c) == quote => {
                    self.next_char();
                    break;
                }
                Ch(c) if quote.is_none() && (c.is_ascii_whitespace() || c == '>' || c == '/') => break,
                Ch('&') => {
                    let location = self.location_handler.cur_location;
                    match self.consume_reference(location) {
                        Token::Entity { name, .. } => match self.resolve_entity(&name) {
                            Some(text) => value.push_str(&text),
                            None => {
                                value.push('&');
                                value.push_str(&name);
                                value.push(';');
                            }
                        },
                        Token::Text { text, .. } => value.push_str(&text),
                        _ => {}
                    }
                }
                Ch('<') => {
                    self.parse_error(ParserError::LessThanSignInAttributeValue);
                    self.next_char();
                    value.push('<');
                }
                // Literal whitespace is normalized to a space
                Ch('\t' | '\n' | '\r') => {
                    self.next_char();
                    value.push(' ');
                }
                Ch(c) => {
                    self.next_char();
                    value.push(c);
                }
                Surrogate(_) => {
                    self.next_char();
                    value.push(CHAR_REPLACEMENT);
                }
            }
        }

        value
    }

    /// Consumes `&name;` or `&#...;`. Returns an entity token, or a text token with the literal
    /// characters when the reference is not terminated.
    fn consume_reference(&mut self, location: Location) -> Token {
        // skip '&'
        self.next_char();

        let mut name = String::new();
        if self.current_char() == Ch('#') {
            self.next_char();
            name.push('#');
            while let Ch(c) = self.current_char() {
                if !c.is_ascii_alphanumeric() {
                    break;
                }
                self.next_char();
                name.push(c);
            }
        } else {
            name.push_str(&self.consume_name());
        }

        if name.is_empty() || name == "#" {
            self.parse_error(ParserError::InvalidCharacterReference);
            return Token::Text {
                text: format!("&{name}"),
                location,
            };
        }

        if self.current_char() != Ch(';') {
            self.parse_error(ParserError::MissingSemicolonAfterEntity);
            return Token::Text {
                text: format!("&{name}"),
                location,
            };
        }
        self.next_char();

        if !self.entities.contains(&name) {
            if name.starts_with('#') {
                self.parse_error(ParserError::InvalidCharacterReference);
            } else {
                self.parse_error(ParserError::UnknownEntity);
            }
        }

        Token::Entity { name, location }
    }

    fn consume_doctype(&mut self, location: Location) -> Token {
        if !self.skip_whitespace() {
            self.parse_error(ParserError::MalformedDoctype);
        }

        let name = self.consume_name();
        if name.is_empty() {
            self.parse_error(ParserError::MalformedDoctype);
        }
        self.skip_whitespace();

        let mut pub_identifier = None;
        let mut sys_identifier = None;

        if self.look_ahead_slice(6) == "PUBLIC" {
            self.skip_chars(6);
            self.skip_whitespace();
            pub_identifier = self.consume_quoted();
            self.skip_whitespace();
            sys_identifier = self.consume_quoted();
            if pub_identifier.is_none() || sys_identifier.is_none() {
                self.parse_error(ParserError::MalformedDoctype);
            }
        } else if self.look_ahead_slice(6) == "SYSTEM" {
            self.skip_chars(6);
            self.skip_whitespace();
            sys_identifier = self.consume_quoted();
            if sys_identifier.is_none() {
                self.parse_error(ParserError::MalformedDoctype);
            }
        }
        self.skip_whitespace();

        if self.current_char() == Ch('[') {
            self.next_char();
            let subset = self.consume_internal_subset();
            self.entities.parse_internal_subset(&subset);
            self.type_definitions = subset;
            self.skip_whitespace();
        }

        loop {
            match self.next_char() {
                Ch('>') => break,
                StreamEnd | StreamEmpty => {
                    self.parse_error(ParserError::EofInDoctype);
                    break;
                }
                _ => self.parse_error(ParserError::MalformedDoctype),
            }
        }

        Token::DocType {
            name,
            pub_identifier,
            sys_identifier,
            location,
        }
    }

    /// Consumes the internal subset up to the closing `]`. Brackets inside quoted strings and
    /// comments do not count.
    fn consume_internal_subset(&mut self) -> String {
        let mut subset = String::new();
        let mut quote: Option<char> = None;

        loop {
            if quote.is_none() && self.look_ahead_slice(4) == "<!--" {
                let start = self.location_handler.cur_location;
                self.skip_chars(4);
                if let Token::Comment { comment, .. } = self.consume_comment(start) {
                    subset.push_str("<!--");
                    subset.push_str(&comment);
                    subset.push_str("-->");
                }
                continue;
            }

            match self.next_char() {
                Ch(']') if quote.is_none() => break,
                Ch(c) => {
                    match quote {
                        Some(q) if q == c => quote = None,
                        None if c == '"' || c == '\'' => quote = Some(c),
                        _ => {}
                    }
                    subset.push(c);
                }
                Surrogate(_) => subset.push(CHAR_REPLACEMENT),
                StreamEnd | StreamEmpty => {
                    self.parse_error(ParserError::EofInDoctype);
                    break;
                }
            }
        }

        subset
    }

    fn consume_quoted(&mut self) -> Option<String> {
        let quote = match self.current_char() {
            Ch(q @ ('"' | '\'')) => q,
            _ => return None,
        };
        self.next_char();

        let mut value = String::new();
        loop {
            match self.next_char() {
                Ch(c) if c == quote => return Some(value),
                Ch(c) => value.push(c),
                Surrogate(_) => value.push(CHAR_REPLACEMENT),
                StreamEnd | StreamEmpty => return None,
            }
        }
    }

    fn consume_name(&mut self) -> String {
        let mut name = String::new();

        if let Ch(c) = self.current_char() {
            if !is_name_start_char(c) {
                return name;
            }
        }

        while let Ch(c) = self.current_char() {
            if !is_name_char(c) {
                break;
            }
            self.next_char();
            name.push(c);
        }

        name
    }
}

impl TokenSource for Tokenizer {
    fn next_token(&mut self) -> Result<Token> {
        loop {
            if let Some(token) = self.consume_token() {
                trace!("token: {token}");
                return Ok(token);
            }
        }
    }

    /// Whitespace between markup outside the document element carries no meaning
    fn is_ignorable(&self, token: &Token) -> bool {
        token.is_empty_or_white()
    }

    /// Unknown references were already reported when they were tokenized
    fn resolve_entity(&self, name: &str) -> Option<String> {
        match self.entities.resolve(name) {
            Ok(text) => Some(text),
            Err(ParserError::EntityExpansionLimit) => {
                self.parse_error(ParserError::EntityExpansionLimit);
                None
            }
            Err(_) => None,
        }
    }

    fn type_definitions(&self) -> &str {
        &self.type_definitions
    }

    fn location(&self) -> Location {
        self.location_handler.cur_location
    }

    fn encoding(&self) -> Encoding {
        self.stream.encoding()
    }

    fn set_encoding(&mut self, encoding: Encoding) {
        if self.fixed_encoding {
            debug!("keeping {} for text input, ignoring {}", self.stream.encoding().name(), encoding.name());
            return;
        }
        self.stream.set_encoding(encoding);
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':' || (!c.is_ascii() && !c.is_whitespace())
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || c == '-' || c == '.' || c == '\u{B7}'
}
