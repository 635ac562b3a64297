#[cfg(feature = "debug_parser")]
use std::io::Write;
use std::sync::Arc;

use crate::document::DocumentHandle;
use crate::errors::{Error, Result};
use crate::parser::encoding::{select_stream_encoding, DefaultEncodingResolver, EncodingResolver};
use crate::parser::errors::{report_error, ErrorLogger, ParserError};
use crate::parser::tree_builder::TreeBuilder;
use crate::tokenizer::token::Token;
use crate::tokenizer::{TokenSource, Tokenizer};
use gosub_shared::byte_stream::{ByteStream, Encoding, Location};
use gosub_shared::node::NodeId;
use log::{debug, trace};
use parking_lot::Mutex;

pub mod encoding;
pub mod errors;
pub mod task;
pub mod tree_builder;

/// Insertion modes of the tree builder. Modes only move forward.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertionMode {
    /// Nothing has been seen yet, only here an xml declaration is accepted
    Initial,
    /// Between the declaration and the document element: doctype, comments and processing instructions
    Prolog,
    /// The document element and everything after it
    Body,
}

/// Options for the xml parser
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XmlParserOptions {
    /// Encoding to decode with until the declaration says otherwise
    pub default_encoding: Encoding,
    /// Detect the encoding from the byte order mark or the first bytes of the document
    pub detect_encoding: bool,
    /// Report identical errors on the same position more than once
    pub keep_duplicate_errors: bool,
}

impl Default for XmlParserOptions {
    fn default() -> Self {
        Self {
            default_encoding: Encoding::UTF8,
            detect_encoding: true,
            keep_duplicate_errors: false,
        }
    }
}

impl XmlParserOptions {
    /// Sets up the stream so decoding starts with the right encoding. The byte order mark is
    /// skipped when present.
    pub fn prepare_stream(&self, stream: &mut ByteStream) {
        let encoding = if self.detect_encoding {
            stream.detect_encoding()
        } else {
            self.default_encoding
        };
        stream.set_encoding(encoding);

        if stream.skip_bom() {
            debug!("skipped byte order mark for {}", encoding.name());
        }
    }

    /// Creates the error logger a parse run should share between tokenizer and tree builder
    pub fn error_logger(&self) -> Arc<Mutex<ErrorLogger>> {
        let logger = if self.keep_duplicate_errors {
            ErrorLogger::with_duplicates()
        } else {
            ErrorLogger::new()
        };
        Arc::new(Mutex::new(logger))
    }
}

/// The main parser object
pub struct XmlParser<T: TokenSource, B: TreeBuilder = DocumentHandle> {
    /// tokenizer object
    tokenizer: T,
    /// current insertion mode
    insertion_mode: InsertionMode,
    /// Current token from the tokenizer
    current_token: Token,
    /// If true, the current token should be processed again
    reprocess_token: bool,
    /// Stack of open elements
    open_elements: Vec<NodeId>,
    /// The document we are building
    document: B,
    /// Error logger, which is shared with the tokenizer
    error_logger: Arc<Mutex<ErrorLogger>>,
    /// Maps declared encoding names onto decoders
    encoding_resolver: Box<dyn EncodingResolver>,
    /// When true, the parser is finished and should not consume more tokens
    parser_finished: bool,
}

impl XmlParser<Tokenizer> {
    /// Parses the stream into a new document. The stream should be filled and closed.
    pub fn parse_document(mut stream: ByteStream, options: Option<XmlParserOptions>) -> Result<DocumentHandle> {
        let options = options.unwrap_or_default();
        options.prepare_stream(&mut stream);

        let error_logger = options.error_logger();
        let tokenizer = Tokenizer::new(stream, Location::default(), error_logger.clone());
        let document = DocumentHandle::default();

        let mut parser = XmlParser::new(tokenizer, document.clone(), error_logger);
        parser.parse()?;

        Ok(document)
    }
}

impl<T: TokenSource, B: TreeBuilder> XmlParser<T, B> {
    pub fn new(tokenizer: T, document: B, error_logger: Arc<Mutex<ErrorLogger>>) -> Self {
        Self {
            tokenizer,
            insertion_mode: InsertionMode::Initial,
            current_token: Token::Eof {
                location: Location::default(),
            },
            reprocess_token: false,
            open_elements: Vec::new(),
            document,
            error_logger,
            encoding_resolver: Box::new(DefaultEncodingResolver),
            parser_finished: false,
        }
    }

    /// Replaces the resolver used for encoding names found in the xml declaration
    pub fn with_encoding_resolver(mut self, resolver: Box<dyn EncodingResolver>) -> Self {
        self.encoding_resolver = resolver;
        self
    }

    pub fn insertion_mode(&self) -> InsertionMode {
        self.insertion_mode
    }

    /// Node ids of the currently open elements, outermost first
    pub fn open_elements(&self) -> &[NodeId] {
        &self.open_elements
    }

    pub fn document(&self) -> &B {
        &self.document
    }

    pub fn error_logger(&self) -> Arc<Mutex<ErrorLogger>> {
        self.error_logger.clone()
    }

    /// Runs the pull loop until the end of the input or the first fatal error. A parser runs only
    /// once, later calls fail.
    pub fn parse(&mut self) -> Result<()> {
        if self.parser_finished {
            return Err(Error::InvalidOperation("parser has already run".to_string()));
        }

        loop {
            // When the parser is signalled to finish, we break our main parser loop
            if self.parser_finished {
                break;
            }

            // If reprocess_token is true, we should process the same token again
            if !self.reprocess_token {
                self.current_token = match self.tokenizer.next_token() {
                    Ok(token) => token,
                    Err(e) => {
                        self.parser_finished = true;
                        return Err(e);
                    }
                };
            }
            self.reprocess_token = false;

            #[cfg(feature = "debug_parser")]
            self.display_debug_info();

            let result = match self.insertion_mode {
                InsertionMode::Initial => self.handle_initial(),
                InsertionMode::Prolog => self.handle_prolog(),
                InsertionMode::Body => self.handle_body(),
            };

            // The end of the input always ends the run, unless it is handed to the next mode
            if result.is_err() || (self.current_token.is_eof() && !self.reprocess_token) {
                self.parser_finished = true;
            }
            result?;
        }

        Ok(())
    }

    fn handle_initial(&mut self) -> Result<()> {
        match &self.current_token.clone() {
            Token::Declaration {
                version,
                encoding,
                standalone,
                location,
            } => {
                if let Some(standalone) = standalone {
                    self.document.set_standalone(*standalone);
                }
                if let Some(encoding) = encoding {
                    self.negotiate_encoding(encoding, *location);
                }

                self.check_version(version, *location)?;
                self.document.set_xml_version(version.trim());

                self.switch_mode(InsertionMode::Prolog);
            }
            token if self.tokenizer.is_ignorable(token) => {}
            token => {
                self.parse_error(ParserError::UndefinedMarkupDeclaration, token.get_location());
                self.switch_mode(InsertionMode::Prolog);
                self.reprocess_token = true;
            }
        }

        Ok(())
    }

    fn handle_prolog(&mut self) -> Result<()> {
        match &self.current_token.clone() {
            Token::DocType {
                name,
                pub_identifier,
                sys_identifier,
                location,
            } => {
                let type_definitions = self.tokenizer.type_definitions().to_string();
                self.document.create_doctype(
                    name,
                    pub_identifier.as_deref(),
                    sys_identifier.as_deref(),
                    &type_definitions,
                    *location,
                );
                self.switch_mode(InsertionMode::Body);
            }
            Token::Comment { comment, location } => {
                self.document.create_comment(comment, NodeId::root(), *location);
            }
            Token::ProcessingInstruction {
                target,
                content,
                location,
            } => {
                self.document
                    .create_processing_instruction(target, content, NodeId::root(), *location);
            }
            token if self.tokenizer.is_ignorable(token) => {}
            _ => {
                self.switch_mode(InsertionMode::Body);
                self.reprocess_token = true;
            }
        }

        Ok(())
    }

    fn handle_body(&mut self) -> Result<()> {
        match &self.current_token.clone() {
            Token::StartTag {
                name,
                is_self_closing,
                attributes,
                location,
            } => {
                let parent_id = self.current_node();
                let node_id = self.document.create_element(name, parent_id, *location);
                for attr in attributes {
                    self.document
                        .insert_attribute(&attr.name, &attr.value, node_id, *location)?;
                }

                if !is_self_closing {
                    self.open_elements.push(node_id);
                }
            }
            Token::EndTag { name, location } => {
                let Some(node_id) = self.open_elements.last().copied() else {
                    return Err(self.fatal_error(ParserError::UnexpectedClosingTag, *location));
                };

                if self.document.element_name(node_id).as_deref() != Some(name.as_str()) {
                    return Err(self.fatal_error(ParserError::MismatchedClosingTag, *location));
                }

                self.open_elements.pop();
            }
            Token::Comment { comment, location } => {
                let parent_id = self.current_node();
                self.document.create_comment(comment, parent_id, *location);
            }
            Token::ProcessingInstruction {
                target,
                content,
                location,
            } => {
                let parent_id = self.current_node();
                self.document
                    .create_processing_instruction(target, content, parent_id, *location);
            }
            Token::Entity { name, location } => {
                // The tokenizer already reported references it could not resolve
                let text = self
                    .tokenizer
                    .resolve_entity(name)
                    .unwrap_or_else(|| format!("&{name};"));
                let parent_id = self.current_node();
                self.document.create_text(&text, parent_id, *location);
            }
            // Whitespace around the document element is not part of the tree
            token if self.open_elements.is_empty() && self.tokenizer.is_ignorable(token) => {}
            Token::Text { text, location } => {
                let parent_id = self.current_node();
                self.document.create_text(text, parent_id, *location);
            }
            Token::Eof { location } => {
                if !self.open_elements.is_empty() {
                    return Err(self.fatal_error(ParserError::UnexpectedEndOfInput, *location));
                }
                if self.document.document_element().is_none() {
                    return Err(self.fatal_error(ParserError::MissingRootElement, *location));
                }
            }
            Token::DocType { location, .. } => {
                return Err(self.fatal_error(ParserError::DoctypeAfterContent, *location));
            }
            Token::Declaration { location, .. } => {
                return Err(self.fatal_error(ParserError::DeclarationMisplaced, *location));
            }
        }

        Ok(())
    }

    /// Only xml 1.x documents are accepted
    fn check_version(&self, version: &str, location: Location) -> Result<()> {
        match version.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v < 2.0 => Ok(()),
            _ => Err(self.fatal_error(ParserError::UnsupportedVersion, location)),
        }
    }

    /// Switches the tokenizer's decoder and records the encoding that is actually used on the
    /// document. This happens before the next token is pulled, so everything after the declaration
    /// is decoded with it.
    fn negotiate_encoding(&mut self, name: &str, location: Location) {
        let Some(handle) = self.encoding_resolver.resolve(name) else {
            self.parse_error(ParserError::UnsupportedEncoding, location);
            return;
        };

        let encoding = select_stream_encoding(self.tokenizer.encoding(), handle.stream_encoding());
        if encoding == handle.stream_encoding() {
            self.document.set_input_encoding(handle.name());
        } else {
            self.document.set_input_encoding(encoding.name());
        }

        if encoding != self.tokenizer.encoding() {
            debug!("switching decoder to {}", encoding.name());
            self.tokenizer.set_encoding(encoding);
        }
    }

    /// The current node is the top of the stack, or the document itself when nothing is open
    fn current_node(&self) -> NodeId {
        self.open_elements.last().copied().unwrap_or_default()
    }

    fn switch_mode(&mut self, mode: InsertionMode) {
        trace!("insertion mode {:?} -> {:?}", self.insertion_mode, mode);
        self.insertion_mode = mode;
    }

    /// Send a recoverable error to the error logger
    fn parse_error(&self, error: ParserError, location: Location) {
        report_error(&self.error_logger, location, error);
    }

    /// Reports a fatal error and returns it so the run can be aborted
    fn fatal_error(&self, error: ParserError, location: Location) -> Error {
        report_error(&self.error_logger, location, error);
        Error::Fatal { kind: error, location }
    }

    #[cfg(feature = "debug_parser")]
    fn display_debug_info(&self) {
        println!("-----------------------------------------\n");
        println!("current token   : '{}'", self.current_token);
        println!("insertion mode  : {:?}", self.insertion_mode);
        print!("Open elements   : [ ");
        for node_id in &self.open_elements {
            match self.document.element_name(*node_id) {
                Some(name) => print!("({node_id}) {name}, "),
                None => print!("({node_id}), "),
            }
        }
        println!("]");

        #[cfg(feature = "debug_parser_verbose")]
        println!("location        : {:?}", self.tokenizer.location());

        std::io::stdout().flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use crate::tokenizer::token::Attribute;
    use std::collections::VecDeque;
    use test_case::test_case;

    /// Token source that hands out a fixed list of tokens
    struct TokenList {
        tokens: VecDeque<Token>,
        encoding: Encoding,
    }

    impl TokenList {
        fn new(tokens: Vec<Token>) -> Self {
            Self {
                tokens: tokens.into(),
                encoding: Encoding::UTF8,
            }
        }
    }

    impl TokenSource for TokenList {
        fn next_token(&mut self) -> Result<Token> {
            Ok(self.tokens.pop_front().unwrap_or(Token::Eof {
                location: Location::default(),
            }))
        }

        fn is_ignorable(&self, token: &Token) -> bool {
            token.is_empty_or_white()
        }

        fn resolve_entity(&self, name: &str) -> Option<String> {
            (name == "me").then(|| "gosub".to_string())
        }

        fn type_definitions(&self) -> &str {
            "<!ENTITY me \"gosub\">"
        }

        fn location(&self) -> Location {
            Location::default()
        }

        fn encoding(&self) -> Encoding {
            self.encoding
        }

        fn set_encoding(&mut self, encoding: Encoding) {
            self.encoding = encoding;
        }
    }

    fn loc() -> Location {
        Location::default()
    }

    fn declaration(version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Token {
        Token::Declaration {
            version: version.to_string(),
            encoding: encoding.map(str::to_string),
            standalone,
            location: loc(),
        }
    }

    fn start(name: &str, is_self_closing: bool) -> Token {
        Token::StartTag {
            name: name.to_string(),
            is_self_closing,
            attributes: vec![],
            location: loc(),
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag {
            name: name.to_string(),
            location: loc(),
        }
    }

    fn text(text: &str) -> Token {
        Token::Text {
            text: text.to_string(),
            location: loc(),
        }
    }

    fn parser_for(tokens: Vec<Token>) -> XmlParser<TokenList> {
        let error_logger = Arc::new(Mutex::new(ErrorLogger::new()));
        XmlParser::new(TokenList::new(tokens), DocumentHandle::default(), error_logger)
    }

    fn error_codes(parser: &XmlParser<TokenList>) -> Vec<ParserError> {
        parser.error_logger().lock().get_errors().iter().map(|e| e.code).collect()
    }

    #[test]
    fn minimal_document() {
        let mut parser = parser_for(vec![declaration("1.0", None, None), start("root", true)]);

        assert!(parser.parse().is_ok());
        assert_eq!(parser.insertion_mode(), InsertionMode::Body);
        assert!(parser.open_elements().is_empty());

        let doc = parser.document().get();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.element_data(root).unwrap().name(), "root");
        assert_eq!(doc.xml_version(), Some("1.0"));
        assert!(error_codes(&parser).is_empty());
    }

    #[test]
    fn content_without_declaration_is_repaired() {
        let mut parser = parser_for(vec![start("root", false), text("hi"), end("root")]);

        assert!(parser.parse().is_ok());
        assert_eq!(error_codes(&parser), vec![ParserError::UndefinedMarkupDeclaration]);
        assert_eq!(parser.document().get().xml_version(), None);

        let doc = parser.document().get();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.text_content(root), "hi");
    }

    #[test]
    fn whitespace_before_declaration_is_ignored() {
        let mut parser = parser_for(vec![text("\n  "), declaration("1.1", None, Some(true)), start("r", true)]);

        assert!(parser.parse().is_ok());
        assert!(error_codes(&parser).is_empty());
        assert!(parser.document().get().standalone());
    }

    #[test_case(vec![start("root", false), start("a", false), end("b")], ParserError::MismatchedClosingTag; "mismatched")]
    #[test_case(vec![start("root", false)], ParserError::UnexpectedEndOfInput; "unclosed")]
    #[test_case(vec![declaration("1.0", None, None)], ParserError::MissingRootElement; "no root")]
    #[test_case(vec![declaration("2.0", None, None), start("r", true)], ParserError::UnsupportedVersion; "version two")]
    #[test_case(vec![declaration("one", None, None), start("r", true)], ParserError::UnsupportedVersion; "version garbage")]
    #[test_case(vec![declaration("NaN", None, None), start("r", true)], ParserError::UnsupportedVersion; "version nan")]
    #[test_case(vec![end("root")], ParserError::UnexpectedClosingTag; "stray end tag")]
    #[test_case(vec![start("root", true), declaration("1.0", None, None)], ParserError::DeclarationMisplaced; "late declaration")]
    #[test_case(vec![declaration("1.0", None, None), declaration("1.0", None, None)], ParserError::DeclarationMisplaced; "double declaration")]
    fn fatal_errors(tokens: Vec<Token>, expected: ParserError) {
        let mut parser = parser_for(tokens);

        let err = parser.parse().unwrap_err();
        assert_eq!(err.kind(), Some(expected));

        let errors = parser.error_logger().lock().get_errors();
        let last = errors.last().unwrap();
        assert_eq!(last.code, expected);
        assert!(last.fatal);
    }

    #[test]
    fn doctype_after_content_is_fatal() {
        let doctype = Token::DocType {
            name: "root".to_string(),
            pub_identifier: None,
            sys_identifier: None,
            location: Location::new(1, 8, 7),
        };
        let mut parser = parser_for(vec![start("root", true), doctype]);

        assert_eq!(
            parser.parse(),
            Err(Error::Fatal {
                kind: ParserError::DoctypeAfterContent,
                location: Location::new(1, 8, 7)
            })
        );
    }

    #[test]
    fn prolog_nodes_go_to_the_document() {
        let mut parser = parser_for(vec![
            declaration("1.0", None, None),
            Token::Comment {
                comment: "c".to_string(),
                location: loc(),
            },
            Token::DocType {
                name: "root".to_string(),
                pub_identifier: Some("-//X//EN".to_string()),
                sys_identifier: Some("root.dtd".to_string()),
                location: loc(),
            },
            Token::ProcessingInstruction {
                target: "pi".to_string(),
                content: "data".to_string(),
                location: loc(),
            },
            start("root", false),
            Token::Entity {
                name: "me".to_string(),
                location: loc(),
            },
            Token::Entity {
                name: "unknown".to_string(),
                location: loc(),
            },
            end("root"),
            text("\n"),
        ]);

        assert!(parser.parse().is_ok());

        let doc = parser.document().get();
        let types: Vec<NodeType> = doc
            .root()
            .unwrap()
            .children()
            .iter()
            .map(|id| doc.node_by_id(*id).unwrap().type_of())
            .collect();
        assert_eq!(
            types,
            vec![
                NodeType::CommentNode,
                NodeType::DocTypeNode,
                NodeType::ProcessingInstructionNode,
                NodeType::ElementNode
            ]
        );

        let doctype = doc.node_by_id(doc.doctype().unwrap()).unwrap().get_doctype_data().unwrap();
        assert_eq!(doctype.type_definitions(), "<!ENTITY me \"gosub\">");
        assert_eq!(doctype.pub_identifier(), Some("-//X//EN"));

        let root = doc.document_element().unwrap();
        assert_eq!(doc.node_by_id(root).unwrap().children().len(), 2);
        assert_eq!(doc.text_content(root), "gosub&unknown;");
    }

    #[test]
    fn duplicate_attributes_last_value_wins() {
        let tag = Token::StartTag {
            name: "e".to_string(),
            is_self_closing: true,
            attributes: vec![Attribute::new("a", "1"), Attribute::new("b", "x"), Attribute::new("a", "2")],
            location: loc(),
        };
        let mut parser = parser_for(vec![tag]);
        assert!(parser.parse().is_ok());

        let doc = parser.document().get();
        let data = doc.element_data(doc.document_element().unwrap()).unwrap();
        let attributes: Vec<_> = data.attributes().iter().collect();
        assert_eq!(
            attributes,
            vec![(&"a".to_string(), &"2".to_string()), (&"b".to_string(), &"x".to_string())]
        );
    }

    #[test]
    fn declared_encoding_switches_the_decoder() {
        let mut parser = parser_for(vec![declaration("1.0", Some("ISO-8859-2"), None), start("r", true)]);
        assert!(parser.parse().is_ok());

        assert_eq!(parser.tokenizer.encoding(), Encoding::SingleByte(encoding_rs::ISO_8859_2));
        assert_eq!(parser.document().get().input_encoding(), Some("ISO-8859-2"));
    }

    #[test]
    fn unsupported_encoding_is_recoverable() {
        let mut parser = parser_for(vec![declaration("1.0", Some("x-unknown"), None), start("r", true)]);
        assert!(parser.parse().is_ok());

        assert_eq!(error_codes(&parser), vec![ParserError::UnsupportedEncoding]);
        assert_eq!(parser.tokenizer.encoding(), Encoding::UTF8);
        assert_eq!(parser.document().get().input_encoding(), None);
    }

    #[test]
    fn second_top_level_element_is_appended() {
        let mut parser = parser_for(vec![start("root", true), start("extra", true)]);
        assert!(parser.parse().is_ok());

        let doc = parser.document().get();
        assert_eq!(doc.root().unwrap().children().len(), 2);
        let root = doc.document_element().unwrap();
        assert_eq!(doc.element_data(root).unwrap().name(), "root");
    }

    #[test]
    fn finished_parser_cannot_run_again() {
        let mut parser = parser_for(vec![start("root", false)]);
        assert_eq!(parser.parse().unwrap_err().kind(), Some(ParserError::UnexpectedEndOfInput));

        assert!(matches!(parser.parse(), Err(Error::InvalidOperation(_))));
        assert_eq!(parser.document().get().node_count(), 2);

        let mut parser = parser_for(vec![start("root", true)]);
        assert!(parser.parse().is_ok());
        assert!(matches!(parser.parse(), Err(Error::InvalidOperation(_))));
    }
}
