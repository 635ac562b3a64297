use gosub_shared::byte_stream::Location;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// The different token structures that can be emitted by the tokenizer
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// The `<?xml ... ?>` declaration
    Declaration {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
        location: Location,
    },
    DocType {
        name: String,
        pub_identifier: Option<String>,
        sys_identifier: Option<String>,
        location: Location,
    },
    StartTag {
        name: String,
        is_self_closing: bool,
        /// Attributes in the order they were found, duplicates included
        attributes: Vec<Attribute>,
        location: Location,
    },
    EndTag {
        name: String,
        location: Location,
    },
    Comment {
        comment: String,
        location: Location,
    },
    ProcessingInstruction {
        target: String,
        content: String,
        location: Location,
    },
    /// An entity or character reference, without the `&` and `;`
    Entity {
        name: String,
        location: Location,
    },
    Text {
        text: String,
        location: Location,
    },
    Eof {
        location: Location,
    },
}

impl Token {
    pub fn get_location(&self) -> Location {
        match self {
            Token::Declaration { location, .. }
            | Token::DocType { location, .. }
            | Token::StartTag { location, .. }
            | Token::EndTag { location, .. }
            | Token::Comment { location, .. }
            | Token::ProcessingInstruction { location, .. }
            | Token::Entity { location, .. }
            | Token::Text { location, .. }
            | Token::Eof { location } => *location,
        }
    }

    /// Returns true when the token is an EOF token
    pub fn is_eof(&self) -> bool {
        matches!(self, Token::Eof { .. })
    }

    /// Returns true if the text token is empty or only contains whitespace
    pub fn is_empty_or_white(&self) -> bool {
        if let Token::Text { text, .. } = self {
            text.chars().all(|ch| matches!(ch, ' ' | '\t' | '\r' | '\n'))
        } else {
            false
        }
    }
}

// Each token can be displayed as a string
impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Token::Declaration {
                version,
                encoding,
                standalone,
                ..
            } => {
                write!(f, r#"<?xml version="{version}""#)?;
                if let Some(encoding) = encoding {
                    write!(f, r#" encoding="{encoding}""#)?;
                }
                if let Some(standalone) = standalone {
                    write!(f, r#" standalone="{}""#, if *standalone { "yes" } else { "no" })?;
                }
                write!(f, "?>")
            }
            Token::DocType {
                name,
                pub_identifier,
                sys_identifier,
                ..
            } => {
                write!(f, "<!DOCTYPE {name}")?;
                match (pub_identifier, sys_identifier) {
                    (Some(pub_id), Some(sys_id)) => write!(f, r#" PUBLIC "{pub_id}" "{sys_id}""#)?,
                    (Some(pub_id), None) => write!(f, r#" PUBLIC "{pub_id}""#)?,
                    (None, Some(sys_id)) => write!(f, r#" SYSTEM "{sys_id}""#)?,
                    (None, None) => {}
                }
                write!(f, ">")
            }
            Token::Comment { comment, .. } => write!(f, "<!--{comment}-->"),
            Token::ProcessingInstruction { target, content, .. } => {
                if content.is_empty() {
                    write!(f, "<?{target}?>")
                } else {
                    write!(f, "<?{target} {content}?>")
                }
            }
            Token::Entity { name, .. } => write!(f, "&{name};"),
            Token::Text { text, .. } => write!(f, "{text}"),
            Token::StartTag {
                name,
                is_self_closing,
                attributes,
                ..
            } => {
                write!(f, "<{name}")?;
                for attr in attributes {
                    write!(f, r#" {}="{}""#, attr.name, attr.value)?;
                }
                if *is_self_closing {
                    write!(f, "/")?;
                }
                write!(f, ">")
            }
            Token::EndTag { name, .. } => write!(f, "</{name}>"),
            Token::Eof { .. } => write!(f, "EOF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_empty_or_white() {
        let token = Token::Text {
            text: " \n\t\r".to_string(),
            location: Location::default(),
        };
        assert!(token.is_empty_or_white());

        let token = Token::Text {
            text: " x ".to_string(),
            location: Location::default(),
        };
        assert!(!token.is_empty_or_white());

        // non-breaking space is not xml whitespace
        let token = Token::Text {
            text: "\u{00A0}".to_string(),
            location: Location::default(),
        };
        assert!(!token.is_empty_or_white());

        let token = Token::Eof {
            location: Location::default(),
        };
        assert!(!token.is_empty_or_white());
        assert!(token.is_eof());
    }

    #[test]
    fn display_tokens() {
        let token = Token::StartTag {
            name: "item".to_string(),
            is_self_closing: true,
            attributes: vec![Attribute::new("id", "1"), Attribute::new("id", "2")],
            location: Location::default(),
        };
        assert_eq!(token.to_string(), r#"<item id="1" id="2"/>"#);

        let token = Token::Declaration {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some(true),
            location: Location::default(),
        };
        assert_eq!(
            token.to_string(),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#
        );

        let token = Token::DocType {
            name: "note".to_string(),
            pub_identifier: None,
            sys_identifier: Some("note.dtd".to_string()),
            location: Location::new(2, 1, 40),
        };
        assert_eq!(token.to_string(), r#"<!DOCTYPE note SYSTEM "note.dtd">"#);
        assert_eq!(token.get_location(), Location::new(2, 1, 40));
    }
}
