use gosub_shared::byte_stream::Encoding;
use log::warn;

/// Resolved encoding: the canonical name that is recorded on the document, and the decoder the
/// byte stream switches to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodingHandle {
    name: &'static str,
    encoding: Encoding,
}

impl EncodingHandle {
    pub fn new(name: &'static str, encoding: Encoding) -> Self {
        Self { name, encoding }
    }

    /// Canonical name of the encoding
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decoder the byte stream should use
    pub fn stream_encoding(&self) -> Encoding {
        self.encoding
    }
}

/// Maps encoding names from an xml declaration onto encodings the parser can decode
pub trait EncodingResolver: Send {
    /// Returns None when the encoding is unknown or cannot be decoded
    fn resolve(&self, name: &str) -> Option<EncodingHandle>;
}

/// Resolves encoding labels through encoding_rs. Only encodings that can be decoded character by
/// character are supported: UTF-8, UTF-16 and the single-byte encodings.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEncodingResolver;

impl EncodingResolver for DefaultEncodingResolver {
    fn resolve(&self, name: &str) -> Option<EncodingHandle> {
        let encoding = encoding_rs::Encoding::for_label(name.trim().as_bytes())?;
        let stream_encoding = Encoding::from_encoding_rs(encoding)?;

        Some(EncodingHandle::new(encoding.name(), stream_encoding))
    }
}

/// Decides which decoder to continue with once the declaration names `declared`, while the stream
/// is currently decoded as `current`.
///
/// The declaration itself was readable with the current decoder, so the code unit width is already
/// known. A declared encoding of a different width is ignored, and a UTF-16 declaration keeps the
/// byte order that was detected.
pub fn select_stream_encoding(current: Encoding, declared: Encoding) -> Encoding {
    if current.is_utf16() != declared.is_utf16() {
        warn!(
            "declared encoding {} does not match the detected {}, keeping {}",
            declared.name(),
            current.name(),
            current.name()
        );
        return current;
    }

    if current.is_utf16() {
        return current;
    }

    declared
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("UTF-8", Some("UTF-8"))]
    #[test_case("utf8", Some("UTF-8"))]
    #[test_case(" ISO-8859-1 ", Some("windows-1252"))]
    #[test_case("latin2", Some("ISO-8859-2"))]
    #[test_case("koi8-r", Some("KOI8-R"))]
    #[test_case("UTF-16", Some("UTF-16LE"))]
    #[test_case("UTF-16BE", Some("UTF-16BE"))]
    #[test_case("Shift_JIS", None)]
    #[test_case("EBCDIC-FOO", None)]
    #[test_case("", None)]
    fn resolve_names(name: &str, expected: Option<&str>) {
        let resolver = DefaultEncodingResolver;
        assert_eq!(resolver.resolve(name).map(|h| h.name()), expected);
    }

    #[test]
    fn resolved_handle_carries_stream_encoding() {
        let handle = DefaultEncodingResolver.resolve("iso-8859-5").unwrap();
        assert_eq!(
            handle.stream_encoding(),
            Encoding::SingleByte(encoding_rs::ISO_8859_5)
        );
    }

    #[test]
    fn select_encoding() {
        let latin1 = Encoding::SingleByte(encoding_rs::WINDOWS_1252);

        assert_eq!(select_stream_encoding(Encoding::UTF8, latin1), latin1);
        assert_eq!(select_stream_encoding(latin1, Encoding::UTF8), Encoding::UTF8);
        assert_eq!(select_stream_encoding(Encoding::UTF16BE, Encoding::UTF16LE), Encoding::UTF16BE);
        assert_eq!(select_stream_encoding(Encoding::UTF8, Encoding::UTF16LE), Encoding::UTF8);
        assert_eq!(select_stream_encoding(Encoding::UTF16LE, latin1), Encoding::UTF16LE);
    }
}
