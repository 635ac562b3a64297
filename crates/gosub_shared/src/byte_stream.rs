use log::warn;
use std::cell::RefCell;
use std::char::REPLACEMENT_CHARACTER;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::{fmt, io};

pub const CHAR_LF: char = '\u{000A}';
pub const CHAR_CR: char = '\u{000D}';

/// Encoding defines the way the buffer stream is read, as what defines a "character".
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Encoding {
    /// Stream is of single byte ASCII chars (0-127, high bytes are read as-is or replaced)
    ASCII,
    /// Stream is of UTF8 characters
    UTF8,
    /// Stream consists of 16-bit UTF characters (Little Endian)
    UTF16LE,
    /// Stream consists of 16-bit UTF characters (Big Endian)
    UTF16BE,
    /// Any legacy encoding that maps a single byte onto a single character (windows-1252, iso-8859-x, koi8-r...)
    SingleByte(&'static encoding_rs::Encoding),
}

impl Encoding {
    /// Maps an encoding_rs encoding onto an encoding the stream can decode. Multibyte legacy
    /// encodings (shift_jis, gbk, big5...) cannot be decoded character by character and return None.
    pub fn from_encoding_rs(encoding: &'static encoding_rs::Encoding) -> Option<Self> {
        if encoding == encoding_rs::UTF_8 {
            Some(Encoding::UTF8)
        } else if encoding == encoding_rs::UTF_16LE {
            Some(Encoding::UTF16LE)
        } else if encoding == encoding_rs::UTF_16BE {
            Some(Encoding::UTF16BE)
        } else if encoding.is_single_byte() {
            Some(Encoding::SingleByte(encoding))
        } else {
            None
        }
    }

    /// Canonical name of the encoding
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::ASCII => "US-ASCII",
            Encoding::UTF8 => encoding_rs::UTF_8.name(),
            Encoding::UTF16LE => encoding_rs::UTF_16LE.name(),
            Encoding::UTF16BE => encoding_rs::UTF_16BE.name(),
            Encoding::SingleByte(e) => e.name(),
        }
    }

    /// Returns true when characters are stored as 16-bit units
    pub fn is_utf16(&self) -> bool {
        matches!(self, Encoding::UTF16LE | Encoding::UTF16BE)
    }
}

/// Defines a single character/element in the stream. This is either a UTF8 character, or
/// a surrogate characters since these cannot be stored in a single char. Note that characters
/// are not the same as bytes, since a single character can be multiple bytes in UTF8 or UTF16.
///
/// Eof is denoted as a separate element, so is Empty to indicate that the buffer is empty but
/// not yet closed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Character {
    /// Standard UTF character
    Ch(char),
    /// Surrogate character (since they cannot be stored in char)
    Surrogate(u16),
    /// Stream buffer empty and closed
    StreamEnd,
    /// Stream buffer empty (but not closed)
    StreamEmpty,
}

use Character::*;

/// Converts the given character to a char. Surrogate and EOF characters are converted to 0x0000
impl From<Character> for char {
    fn from(c: Character) -> Self {
        match c {
            Ch(c) => c,
            Surrogate(..) => 0x0000 as char,
            StreamEmpty | StreamEnd => 0x0000 as char,
        }
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ch(ch) => write!(f, "{ch}"),
            Surrogate(surrogate) => write!(f, "U+{surrogate:04X}"),
            StreamEnd => write!(f, "StreamEnd"),
            StreamEmpty => write!(f, "StreamEmpty"),
        }
    }
}

impl Character {
    /// Returns true when the character is XML whitespace (space, tab, CR or LF)
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Ch(' ' | '\t' | CHAR_CR | CHAR_LF))
    }

    /// Returns true when the stream has no more characters to give
    pub fn is_end(&self) -> bool {
        matches!(self, StreamEnd | StreamEmpty)
    }
}

/// Configuration structure for a bytestream.
pub struct Config {
    /// Treat any CRLF pairs as a single LF
    pub cr_lf_as_one: bool,
    /// Replace any CR (without a pairing LF) with LF
    pub replace_cr_as_lf: bool,
    /// Are high ascii characters read as-is or converted to a replacement character
    pub replace_high_ascii: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cr_lf_as_one: true,
            replace_cr_as_lf: true,
            replace_high_ascii: false,
        }
    }
}

pub struct ByteStream {
    /// Actual buffer stream in u8 bytes
    buffer: Vec<u8>,
    /// Current position in the stream
    buffer_pos: RefCell<usize>,
    /// True when the buffer is empty and not yet have a closed stream
    closed: bool,
    /// Current encoding
    encoding: Encoding,
    // Configuration for the stream
    config: Config,
}

/// Generic stream trait
pub trait Stream {
    /// Read current character
    fn read(&self) -> Character;
    /// Read current character and advance to next
    fn read_and_next(&self) -> Character;
    /// Look ahead in the stream
    fn look_ahead(&self, offset: usize) -> Character;
    /// Advance with 1 character
    fn next(&self);
    /// Advance with offset characters
    fn next_n(&self, offset: usize);
    /// Unread the current character
    fn prev(&self);
    // Seek to a specific position in bytes!
    fn seek_bytes(&self, offset: usize);
    // Tell the current position in bytes
    fn tell_bytes(&self) -> usize;
    /// Resets the stream back to the start position
    fn reset_stream(&self);
    /// Closes the stream (no more data can be added)
    fn close(&mut self);
    /// Returns true when the stream is closed
    fn closed(&self) -> bool;
    /// Returns true when the stream is empty (but still open)
    fn exhausted(&self) -> bool;
    /// Returns true when the stream is closed and empty
    fn eof(&self) -> bool;
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::new(Encoding::UTF8, None)
    }
}

impl Stream for ByteStream {
    fn read(&self) -> Character {
        let (ch, _) = self.read_with_length();
        ch
    }

    fn read_and_next(&self) -> Character {
        let (ch, len) = self.read_with_length();

        {
            let mut pos = self.buffer_pos.borrow_mut();
            *pos += len;
        }

        // Make sure we skip the CR if it is followed by a LF
        if self.config.cr_lf_as_one && ch == Ch(CHAR_CR) && self.read() == Ch(CHAR_LF) {
            self.next();
            return Ch(CHAR_LF);
        }

        // Replace CR with LF if it is not followed by a LF
        if self.config.replace_cr_as_lf && ch == Ch(CHAR_CR) && self.read() != Ch(CHAR_LF) {
            return Ch(CHAR_LF);
        }

        ch
    }

    fn look_ahead(&self, offset: usize) -> Character {
        if self.buffer.is_empty() {
            return StreamEnd;
        }

        let original_pos = *self.buffer_pos.borrow();

        self.next_n(offset);
        let ch = self.read();

        let mut pos = self.buffer_pos.borrow_mut();
        *pos = original_pos;

        ch
    }

    fn next(&self) {
        self.next_n(1);
    }

    fn next_n(&self, offset: usize) {
        for _ in 0..offset {
            let (_, len) = self.read_with_length();
            if len == 0 {
                return;
            }

            let mut pos = self.buffer_pos.borrow_mut();
            *pos += len;
        }
    }

    fn prev(&self) {
        self.move_back(1);

        if self.config.cr_lf_as_one && self.read() == Ch(CHAR_LF) {
            let pos = self.tell_bytes();
            self.move_back(1);
            if self.read() != Ch(CHAR_CR) {
                self.seek_bytes(pos);
            }
        }
    }

    fn seek_bytes(&self, offset: usize) {
        let mut pos = self.buffer_pos.borrow_mut();
        *pos = offset;
    }

    fn tell_bytes(&self) -> usize {
        *self.buffer_pos.borrow()
    }

    fn reset_stream(&self) {
        let mut pos = self.buffer_pos.borrow_mut();
        *pos = 0;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn closed(&self) -> bool {
        self.closed
    }

    /// Note that it does not check if the stream is closed. Use `closed` for that.
    fn exhausted(&self) -> bool {
        *self.buffer_pos.borrow() >= self.buffer.len()
    }

    fn eof(&self) -> bool {
        self.closed() && self.exhausted()
    }
}

impl ByteStream {
    /// Create a new default empty input stream
    #[must_use]
    pub fn new(encoding: Encoding, config: Option<Config>) -> Self {
        Self {
            config: config.unwrap_or_default(),
            buffer_pos: RefCell::new(0),
            buffer: Vec::new(),
            closed: false,
            encoding,
        }
    }

    // Read the character and return it together with the number of bytes the character took
    fn read_with_length(&self) -> (Character, usize) {
        let buf_pos = *self.buffer_pos.borrow();
        if buf_pos >= self.buffer.len() {
            if self.closed {
                return (StreamEnd, 0);
            }
            return (StreamEmpty, 0);
        }

        match self.encoding {
            Encoding::ASCII => {
                if self.config.replace_high_ascii && self.buffer[buf_pos] > 127 {
                    (Ch('?'), 1)
                } else {
                    (Ch(self.buffer[buf_pos] as char), 1)
                }
            }
            Encoding::SingleByte(encoding) => {
                let (decoded, _) = encoding.decode_without_bom_handling(&self.buffer[buf_pos..buf_pos + 1]);
                (Ch(decoded.chars().next().unwrap_or(REPLACEMENT_CHARACTER)), 1)
            }
            Encoding::UTF8 => {
                let first_byte = self.buffer[buf_pos];
                let width = utf8_char_width(first_byte);

                if buf_pos + width > self.buffer.len() {
                    if self.closed {
                        return (Ch(REPLACEMENT_CHARACTER), self.buffer.len() - buf_pos);
                    }
                    return (StreamEmpty, 0);
                }

                let ch = match width {
                    1 => first_byte as u32,
                    2 => ((first_byte as u32 & 0x1F) << 6) | (self.buffer[buf_pos + 1] as u32 & 0x3F),
                    3 => {
                        ((first_byte as u32 & 0x0F) << 12)
                            | ((self.buffer[buf_pos + 1] as u32 & 0x3F) << 6)
                            | (self.buffer[buf_pos + 2] as u32 & 0x3F)
                    }
                    4 => {
                        ((first_byte as u32 & 0x07) << 18)
                            | ((self.buffer[buf_pos + 1] as u32 & 0x3F) << 12)
                            | ((self.buffer[buf_pos + 2] as u32 & 0x3F) << 6)
                            | (self.buffer[buf_pos + 3] as u32 & 0x3F)
                    }
                    _ => 0xFFFD, // Invalid UTF-8 byte sequence
                };

                if (0xD800..=0xDFFF).contains(&ch) {
                    (Surrogate(ch as u16), width)
                } else {
                    (char::from_u32(ch).map_or(Ch(REPLACEMENT_CHARACTER), Ch), width)
                }
            }
            Encoding::UTF16LE | Encoding::UTF16BE => {
                if buf_pos + 1 >= self.buffer.len() {
                    return (StreamEmpty, 0);
                }

                let bytes = [self.buffer[buf_pos], self.buffer[buf_pos + 1]];
                let code_unit = if self.encoding == Encoding::UTF16LE {
                    u16::from_le_bytes(bytes)
                } else {
                    u16::from_be_bytes(bytes)
                };
                (
                    char::from_u32(u32::from(code_unit)).map_or(Surrogate(code_unit), Ch),
                    2,
                )
            }
        }
    }

    /// Populates the current buffer with the contents of given reader and closes the stream
    pub fn read_from_file(&mut self, mut f: impl Read) -> io::Result<()> {
        f.read_to_end(&mut self.buffer)?;
        self.close();
        self.reset_stream();
        Ok(())
    }

    /// Populates the current buffer with the contents of the given string s
    pub fn read_from_str(&mut self, s: &str, encoding: Option<Encoding>) {
        self.buffer = Vec::from(s.as_bytes());
        if let Some(encoding) = encoding {
            self.encoding = encoding;
        }
        self.reset_stream();
    }

    pub fn append_str(&mut self, s: &str) {
        self.buffer.extend_from_slice(s.as_bytes());
    }

    /// Read directly from bytes
    pub fn read_from_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buffer = bytes.to_vec();
        self.close();
        self.reset_stream();
        Ok(())
    }

    /// Returns the number of bytes left in the buffer
    #[cfg(test)]
    fn bytes_left(&self) -> usize {
        self.buffer.len() - *self.buffer_pos.borrow()
    }

    // Moves back n characters in the stream
    fn move_back(&self, n: usize) {
        let mut pos = self.buffer_pos.borrow_mut();

        match self.encoding {
            Encoding::ASCII | Encoding::SingleByte(_) => {
                *pos = pos.saturating_sub(n);
            }
            Encoding::UTF8 => {
                let mut n = n;
                while n > 0 && *pos > 0 {
                    *pos -= 1;

                    if self.buffer[*pos] & 0b1100_0000 != 0b1000_0000 {
                        n -= 1;
                    }
                }
            }
            Encoding::UTF16LE | Encoding::UTF16BE => {
                *pos = pos.saturating_sub(n * 2);
            }
        }
    }
}

impl ByteStream {
    /// Detect the encoding from the byte order mark, or from the way `<?` is laid out in the first
    /// bytes of the document. When nothing conclusive is found, chardetng takes a guess. Anything the
    /// stream cannot decode falls back to UTF-8.
    pub fn detect_encoding(&self) -> Encoding {
        let mut buf = self.buffer.as_slice();

        // Check for BOM
        if buf.starts_with(b"\xEF\xBB\xBF") {
            return Encoding::UTF8;
        } else if buf.starts_with(b"\xFF\xFE") {
            return Encoding::UTF16LE;
        } else if buf.starts_with(b"\xFE\xFF") {
            return Encoding::UTF16BE;
        }

        // UTF-16 documents without a BOM still start with "<?" or "<" as 16-bit units
        if buf.starts_with(b"\x3C\x00\x3F\x00") || buf.starts_with(b"\x3C\x00") && buf.get(3) == Some(&0x00) {
            return Encoding::UTF16LE;
        } else if buf.starts_with(b"\x00\x3C\x00\x3F") || buf.starts_with(b"\x00\x3C") && buf.get(2) == Some(&0x00) {
            return Encoding::UTF16BE;
        } else if buf.starts_with(b"<?xml") {
            return Encoding::UTF8;
        }

        // Cap the buffer size we will check to max 64KB
        const MAX_BUF_SIZE: usize = 64 * 1024;
        let mut complete = true;
        if buf.len() > MAX_BUF_SIZE {
            buf = &buf[..MAX_BUF_SIZE];
            complete = false;
        }

        let mut encoding_detector = chardetng::EncodingDetector::new();
        encoding_detector.feed(buf, complete);

        let encoding = encoding_detector.guess(None, true);
        Encoding::from_encoding_rs(encoding).unwrap_or_else(|| {
            warn!("detected encoding {} cannot be streamed, falling back to UTF-8", encoding.name());
            Encoding::UTF8
        })
    }

    /// Skips the byte order mark of the current encoding, if present at the current position.
    /// Returns true when a BOM was skipped.
    pub fn skip_bom(&self) -> bool {
        let pos = self.tell_bytes();
        let rest = &self.buffer[pos.min(self.buffer.len())..];

        let bom: &[u8] = match self.encoding {
            Encoding::UTF8 => b"\xEF\xBB\xBF",
            Encoding::UTF16LE => b"\xFF\xFE",
            Encoding::UTF16BE => b"\xFE\xFF",
            _ => return false,
        };

        if rest.starts_with(bom) {
            self.seek_bytes(pos + bom.len());
            return true;
        }

        false
    }

    /// Changes the encoding that the decoder uses to read the buffer. Note that this does not reset
    /// the buffer, so it might start on a non-valid character.
    pub fn set_encoding(&mut self, e: Encoding) {
        self.encoding = e;
    }

    /// Returns the encoding the stream currently decodes with
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// Location holds the start position of the given element in the data source
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Line number, starting with 1
    pub line: usize,
    /// Column number, starting with 1
    pub column: usize,
    /// Character offset, starting with 0
    pub offset: usize,
}

impl Default for Location {
    /// Default to line 1, column 1
    fn default() -> Self {
        Self::new(1, 1, 0)
    }
}

impl Location {
    /// Create a new Location
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl Debug for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.line, self.column)
    }
}

/// LocationHandler is a wrapper that will deal with line/column locations in the stream
pub struct LocationHandler {
    /// The current location of the stream
    pub cur_location: Location,
    /// List of all line number -> col size mappings
    line_endings: HashMap<usize, usize>,
}

impl LocationHandler {
    /// Create a new LocationHandler. Start_location can be set in case the stream is
    /// not starting at 1:1
    pub fn new(start_location: Location) -> Self {
        Self {
            cur_location: start_location,
            line_endings: HashMap::new(),
        }
    }

    /// Will decrease the current location based on the current character
    pub fn dec(&mut self) {
        if self.cur_location.column > 1 {
            self.cur_location.column -= 1;
            self.cur_location.offset -= 1;
            return;
        }

        if self.cur_location.line > 1 {
            self.cur_location.line -= 1;
            self.cur_location.column = self.line_endings.get(&self.cur_location.line).copied().unwrap_or(1);
            self.cur_location.offset -= 1;
        }
    }

    /// Will increase the current location based on the given character
    pub fn inc(&mut self, ch: Character) {
        match ch {
            Ch(CHAR_LF) => {
                self.line_endings.insert(self.cur_location.line, self.cur_location.column);

                self.cur_location.line += 1;
                self.cur_location.column = 1;
                self.cur_location.offset += 1;
            }
            Ch(_) | Surrogate(_) => {
                self.cur_location.column += 1;
                self.cur_location.offset += 1;
            }
            StreamEnd | StreamEmpty => {}
        }
    }
}

/// Returns the width of the given UTF8 character, which is based on the first byte
#[inline]
fn utf8_char_width(first_byte: u8) -> usize {
    if first_byte < 0x80 {
        1
    } else {
        2 + (first_byte >= 0xE0) as usize + (first_byte >= 0xF0) as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stream() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        assert!(stream.exhausted());
        assert!(!stream.eof());

        stream.read_from_str("f👽f", Some(Encoding::UTF8));
        stream.close();
        assert_eq!(stream.read_and_next(), Ch('f'));
        assert_eq!(stream.read_and_next(), Ch('👽'));
        assert!(!stream.eof());
        assert_eq!(stream.read_and_next(), Ch('f'));
        assert!(stream.eof());
        assert_eq!(stream.read_and_next(), StreamEnd);

        stream.prev();
        assert_eq!(stream.read_and_next(), Ch('f'));
        stream.prev();
        stream.prev();
        assert_eq!(stream.read_and_next(), Ch('👽'));
    }

    #[test]
    fn stream_closing() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        stream.read_from_str("abc", Some(Encoding::UTF8));
        assert_eq!(stream.read_and_next(), Ch('a'));
        assert_eq!(stream.read_and_next(), Ch('b'));
        assert_eq!(stream.read_and_next(), Ch('c'));
        assert_eq!(stream.read_and_next(), StreamEmpty);

        stream.append_str("de");
        stream.close();
        assert_eq!(stream.bytes_left(), 2);
        assert_eq!(stream.read_and_next(), Ch('d'));
        assert_eq!(stream.read_and_next(), Ch('e'));
        assert_eq!(stream.read_and_next(), StreamEnd);
    }

    #[test]
    fn look_ahead_does_not_advance() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        stream.read_from_str("xml", None);
        stream.close();

        assert_eq!(stream.look_ahead(2), Ch('l'));
        assert_eq!(stream.read(), Ch('x'));
        stream.next_n(2);
        assert_eq!(stream.read(), Ch('l'));
        assert_eq!(stream.look_ahead(5), StreamEnd);
    }

    #[test]
    fn test_switch_encoding() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        // "<a>é" where é is encoded as latin-1 0xE9
        let _ = stream.read_from_bytes(b"<a>\xE9");

        assert_eq!(stream.read_and_next(), Ch('<'));
        assert_eq!(stream.read_and_next(), Ch('a'));
        assert_eq!(stream.read_and_next(), Ch('>'));

        let latin = Encoding::from_encoding_rs(encoding_rs::WINDOWS_1252).unwrap();
        stream.set_encoding(latin);
        assert_eq!(stream.read_and_next(), Ch('é'));
        assert_eq!(stream.read_and_next(), StreamEnd);
    }

    #[test]
    fn test_utf16() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        let _ = stream.read_from_bytes(&[0xFF, 0xFE, 0x3C, 0x00, 0x61, 0x00, 0xE6, 0x00]);

        assert_eq!(stream.detect_encoding(), Encoding::UTF16LE);
        stream.set_encoding(Encoding::UTF16LE);
        assert!(stream.skip_bom());
        assert_eq!(stream.read_and_next(), Ch('<'));
        assert_eq!(stream.read_and_next(), Ch('a'));
        assert_eq!(stream.read_and_next(), Ch('æ'));
        assert_eq!(stream.read_and_next(), StreamEnd);

        let mut stream = ByteStream::new(Encoding::UTF8, None);
        let _ = stream.read_from_bytes(&[0x00, 0x3C, 0x00, 0x3F, 0x00, 0x78]);
        assert_eq!(stream.detect_encoding(), Encoding::UTF16BE);
    }

    #[test]
    fn test_detect_utf8() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        stream.read_from_str("\u{FEFF}<root/>", None);
        assert_eq!(stream.detect_encoding(), Encoding::UTF8);
        assert!(stream.skip_bom());
        assert_eq!(stream.read(), Ch('<'));
        assert!(!stream.skip_bom());
    }

    #[test]
    fn multibyte_legacy_encodings_are_not_streamable() {
        assert_eq!(Encoding::from_encoding_rs(encoding_rs::SHIFT_JIS), None);
        assert_eq!(Encoding::from_encoding_rs(encoding_rs::UTF_8), Some(Encoding::UTF8));
        assert_eq!(
            Encoding::from_encoding_rs(encoding_rs::ISO_8859_2).map(|e| e.name()),
            Some("ISO-8859-2")
        );
    }

    #[test]
    fn test_crlf() {
        let mut stream = ByteStream::new(Encoding::UTF8, None);
        stream.read_from_str("a\r\nb\rc", Some(Encoding::UTF8));
        stream.close();

        assert_eq!(stream.read_and_next(), Ch('a'));
        assert_eq!(stream.read_and_next(), Ch('\n'));
        assert_eq!(stream.read_and_next(), Ch('b'));
        assert_eq!(stream.read_and_next(), Ch('\n'));
        assert_eq!(stream.read_and_next(), Ch('c'));
        assert_eq!(stream.read_and_next(), StreamEnd);
    }

    #[test]
    fn location_handler() {
        let mut handler = LocationHandler::new(Location::default());
        handler.inc(Ch('a'));
        handler.inc(Ch('\n'));
        handler.inc(Ch('b'));
        assert_eq!(handler.cur_location, Location::new(2, 2, 3));

        handler.dec();
        handler.dec();
        assert_eq!(handler.cur_location, Location::new(1, 2, 1));
    }
}
