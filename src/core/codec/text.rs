//! Text codec: caret notation for control characters
//!
//! A control character `c` (code point below 32) is shown as `^` followed by
//! `c + 64`, so `0x01` becomes `^A` and `0x1F` becomes `^_`. Line feeds can be
//! kept as real line breaks.

use super::{Codec, CodecError, CodecType};
use bytes::Bytes;
use std::borrow::Cow;
use std::ops::Range;

/// Caret-encoded text plus the byte ranges of every substituted `^X` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretText<'a> {
    text: Cow<'a, str>,
    carets: Vec<Range<usize>>,
}

impl<'a> CaretText<'a> {
    /// Encoded text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Byte ranges of the caret pairs, for highlighting
    pub fn carets(&self) -> &[Range<usize>] {
        &self.carets
    }

    /// True when nothing was substituted and the input is returned as-is
    pub fn is_borrowed(&self) -> bool {
        matches!(self.text, Cow::Borrowed(_))
    }

    /// Take the underlying text
    pub fn into_text(self) -> Cow<'a, str> {
        self.text
    }
}

/// Caret-encode a whole fragment
pub fn to_caret_string(s: &str, keep_newline: bool) -> CaretText<'_> {
    encode_carets(s, keep_newline)
}

/// Caret-encode the first `len` bytes of `s`.
///
/// `len` must not exceed `s.len()` and must fall on a character boundary.
pub fn to_caret_string_prefix(s: &str, keep_newline: bool, len: usize) -> Result<CaretText<'_>, CodecError> {
    let prefix = s.get(..len).ok_or(CodecError::InvalidRange {
        begin: 0,
        end: len,
        len: s.len(),
    })?;
    Ok(encode_carets(prefix, keep_newline))
}

fn needs_caret(c: char, keep_newline: bool) -> bool {
    c < ' ' && !(keep_newline && c == '\n')
}

#[allow(clippy::cast_possible_truncation)]
fn encode_carets(s: &str, keep_newline: bool) -> CaretText<'_> {
    let Some(first) = s.find(|c| needs_caret(c, keep_newline)) else {
        return CaretText {
            text: Cow::Borrowed(s),
            carets: Vec::new(),
        };
    };

    let mut out = String::with_capacity(s.len() + 8);
    let mut carets = Vec::new();
    out.push_str(&s[..first]);
    for c in s[first..].chars() {
        if needs_caret(c, keep_newline) {
            let start = out.len();
            out.push('^');
            out.push(char::from(c as u8 + 64));
            carets.push(start..out.len());
        } else {
            out.push(c);
        }
    }

    CaretText {
        text: Cow::Owned(out),
        carets,
    }
}

/// Text codec configuration
#[derive(Debug, Clone)]
pub struct TextCodecConfig {
    /// Render `\n` as a line break instead of `^J`
    pub keep_newline: bool,
}

impl Default for TextCodecConfig {
    fn default() -> Self {
        Self { keep_newline: true }
    }
}

/// Text codec for plain text display
#[derive(Debug, Clone, Default)]
pub struct TextCodec {
    config: TextCodecConfig,
}

impl TextCodec {
    /// Create a new text codec with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: TextCodecConfig) -> Self {
        Self { config }
    }

    /// Set newline handling
    #[must_use]
    pub fn keep_newline(mut self, keep: bool) -> Self {
        self.config.keep_newline = keep;
        self
    }
}

impl Codec for TextCodec {
    fn encode(&self, data: &[u8]) -> String {
        let text = String::from_utf8_lossy(data);
        to_caret_string(&text, self.config.keep_newline)
            .into_text()
            .into_owned()
    }

    fn decode(&self, text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    fn codec_type(&self) -> CodecType {
        CodecType::Text
    }
}
