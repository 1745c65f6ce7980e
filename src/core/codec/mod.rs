//! Data codec module for encoding/decoding data
//!
//! Supports two display formats:
//! - Text with caret notation for control characters
//! - Hexadecimal (lenient on input, uppercase on output)
//!
//! Plus the live hex input normalizer used by the send line.

mod hex;
mod input;
mod text;

pub use self::hex::{append_hex, decode_hex, encode_hex, encode_hex_range, HexCodec};
pub use input::{Editable, HexInputFilter};
pub use text::{to_caret_string, to_caret_string_prefix, CaretText, TextCodec};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Codec type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodecType {
    /// Plain text with caret-escaped control characters
    #[default]
    Text,
    /// Hexadecimal display
    Hex,
}

/// Codec trait for data transformation
pub trait Codec: Send + Sync {
    /// Encode bytes to display string
    fn encode(&self, data: &[u8]) -> String;

    /// Decode display string to bytes
    fn decode(&self, text: &str) -> Bytes;

    /// Get codec type
    fn codec_type(&self) -> CodecType;
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Requested range lies outside the input
    #[error("Invalid range {begin}..{end} for input of length {len}")]
    InvalidRange {
        /// Range start
        begin: usize,
        /// Range end (exclusive)
        end: usize,
        /// Input length
        len: usize,
    },
}

/// Create a codec from type
pub fn create_codec(codec_type: CodecType) -> Box<dyn Codec> {
    match codec_type {
        CodecType::Text => Box::new(TextCodec::new()),
        CodecType::Hex => Box::new(HexCodec::delimited(" ")),
    }
}

/// Format bytes as a hexdump (offset, hex columns, ASCII sidebar)
pub fn hexdump(data: &[u8], bytes_per_line: usize) -> String {
    let bytes_per_line = bytes_per_line.max(1);
    let codec = HexCodec::delimited(" ");
    let mut output = String::new();

    for (offset, chunk) in data.chunks(bytes_per_line).enumerate() {
        output.push_str(&format!("{:08X}  ", offset * bytes_per_line));

        let hex = codec.encode(chunk);
        output.push_str(&hex);
        let width = bytes_per_line * 3 - 1;
        for _ in hex.len()..width {
            output.push(' ');
        }

        output.push_str("  |");
        for &byte in chunk {
            if byte.is_ascii_graphic() || byte == b' ' {
                output.push(byte as char);
            } else {
                output.push('.');
            }
        }
        output.push_str("|\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexdump() {
        let dump = hexdump(b"Hello, World!", 16);
        assert!(dump.starts_with("00000000  48 65 6C 6C 6F"));
        assert!(dump.contains("|Hello, World!|"));
    }

    #[test]
    fn test_hexdump_pads_short_lines() {
        let dump = hexdump(&[0x00, 0x41, 0x0D, 0x42, 0x43], 4);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00000000  00 41 0D 42  |.A.B|");
        assert_eq!(lines[1], format!("00000004  43{}|C|", " ".repeat(11)));
    }

    #[test]
    fn test_create_codec() {
        assert_eq!(create_codec(CodecType::Hex).encode(b"\x01\xAB"), "01 AB");
        assert_eq!(create_codec(CodecType::Text).encode(b"a\x01"), "a^A");
    }
}
