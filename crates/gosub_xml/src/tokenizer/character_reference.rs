use crate::parser::errors::ParserError;
use std::collections::HashMap;

/// Maximum nesting of entities referring to other entities
const MAX_EXPANSION_DEPTH: usize = 8;

/// Maximum number of bytes a single reference may expand to
const MAX_EXPANSION_LENGTH: usize = 1 << 20;

/// Entities every XML document knows about
const PREDEFINED_ENTITIES: [(&str, &str); 5] = [
    ("lt", "<"),
    ("gt", ">"),
    ("amp", "&"),
    ("apos", "'"),
    ("quot", "\""),
];

/// Table of general entities known to the tokenizer: the predefined ones and those declared in the
/// internal subset of the doctype.
#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    declared: HashMap<String, String>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new general entity. As in XML, the first declaration of a name is binding.
    pub fn declare(&mut self, name: &str, value: &str) {
        self.declared
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Returns true when the given reference (without `&` and `;`) names a valid character or a
    /// known entity. Nothing is expanded.
    pub fn contains(&self, name: &str) -> bool {
        match name.strip_prefix('#') {
            Some(numeric) => resolve_numeric(numeric).is_some(),
            None => predefined(name).is_some() || self.declared.contains_key(name),
        }
    }

    /// Resolves an entity or character reference (`lt`, `#60`, `#x3C`) to its text. Fails with
    /// `EntityExpansionLimit` when the replacement text grows too large.
    pub fn resolve(&self, name: &str) -> Result<String, ParserError> {
        let mut out = String::new();
        self.resolve_into(name, 0, &mut out)?;
        Ok(out)
    }

    fn resolve_into(&self, name: &str, depth: usize, out: &mut String) -> Result<(), ParserError> {
        if let Some(numeric) = name.strip_prefix('#') {
            let ch = resolve_numeric(numeric).ok_or(ParserError::InvalidCharacterReference)?;
            out.push(ch);
            return check_length(out);
        }

        if let Some(value) = predefined(name) {
            out.push_str(value);
            return check_length(out);
        }

        let value = self.declared.get(name).ok_or(ParserError::UnknownEntity)?;
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(ParserError::UnknownEntity);
        }

        self.expand(value, depth + 1, out)
    }

    /// Replaces all references inside a declared entity value. References that cannot be resolved
    /// are kept as-is.
    fn expand(&self, value: &str, depth: usize, out: &mut String) -> Result<(), ParserError> {
        let mut rest = value;

        while let Some(start) = rest.find('&') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            match after.find(';') {
                Some(end) => {
                    let name = &after[..end];
                    match self.resolve_into(name, depth, out) {
                        Ok(()) => {}
                        Err(ParserError::EntityExpansionLimit) => return Err(ParserError::EntityExpansionLimit),
                        Err(_) => {
                            out.push('&');
                            out.push_str(name);
                            out.push(';');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
            check_length(out)?;
        }

        out.push_str(rest);
        check_length(out)
    }

    /// Records all `<!ENTITY name "value">` declarations found in the internal subset of a doctype.
    /// Parameter entities and external entities are skipped.
    pub fn parse_internal_subset(&mut self, subset: &str) {
        let mut rest = subset;

        while let Some(start) = rest.find("<!ENTITY") {
            rest = &rest[start + "<!ENTITY".len()..];

            let decl_end = match rest.find('>') {
                Some(end) => end,
                None => return,
            };
            let decl = rest[..decl_end].trim();

            if let Some((name, value)) = parse_entity_decl(decl) {
                self.declare(name, value);
            }
        }
    }
}

fn predefined(name: &str) -> Option<&'static str> {
    PREDEFINED_ENTITIES
        .iter()
        .find(|(entity, _)| *entity == name)
        .map(|(_, value)| *value)
}

fn check_length(out: &str) -> Result<(), ParserError> {
    if out.len() > MAX_EXPANSION_LENGTH {
        return Err(ParserError::EntityExpansionLimit);
    }
    Ok(())
}

/// Parses `name "value"` out of an entity declaration body
fn parse_entity_decl(decl: &str) -> Option<(&str, &str)> {
    if decl.starts_with('%') {
        return None;
    }

    let name_end = decl.find(|c: char| c.is_ascii_whitespace())?;
    let name = &decl[..name_end];
    let value_part = decl[name_end..].trim_start();

    let quote = value_part.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value_part = &value_part[1..];
    let value_end = value_part.find(quote)?;

    Some((name, &value_part[..value_end]))
}

/// Resolves the numeric part of a character reference (`60` or `x3C`). Only characters that are
/// allowed in an XML document are accepted.
fn resolve_numeric(numeric: &str) -> Option<char> {
    let code = match numeric.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => numeric.parse::<u32>().ok()?,
    };

    let ch = char::from_u32(code)?;
    if is_xml_char(ch) {
        Some(ch)
    } else {
        None
    }
}

/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}
