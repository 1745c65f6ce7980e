//! Hexadecimal codec for binary data display

use super::{Codec, CodecError, CodecType};
use bytes::Bytes;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Hex codec: uppercase digits, optional separator between bytes
#[derive(Debug, Clone, Default)]
pub struct HexCodec {
    separator: String,
}

impl HexCodec {
    /// Create a compact codec (no separator, e.g. "48656C6C6F")
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec that inserts `separator` between bytes (e.g. "48 65 6C")
    pub fn delimited(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
        }
    }

    /// Separator inserted between bytes
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Encode the bytes in `[begin, end)`
    pub fn encode_range(&self, data: &[u8], begin: usize, end: usize) -> Result<String, CodecError> {
        let slice = checked_range(data, begin, end)?;
        Ok(self.encode(slice))
    }
}

impl Codec for HexCodec {
    fn encode(&self, data: &[u8]) -> String {
        let mut output = String::with_capacity(data.len() * (2 + self.separator.len()));
        for (i, &byte) in data.iter().enumerate() {
            if i > 0 {
                output.push_str(&self.separator);
            }
            push_byte(&mut output, byte);
        }
        output
    }

    fn decode(&self, text: &str) -> Bytes {
        Bytes::from(decode_hex(text))
    }

    fn codec_type(&self) -> CodecType {
        CodecType::Hex
    }
}

/// Encode bytes as compact uppercase hex
pub fn encode_hex(data: &[u8]) -> String {
    HexCodec::new().encode(data)
}

/// Encode the bytes in `[begin, end)` as compact uppercase hex
pub fn encode_hex_range(data: &[u8], begin: usize, end: usize) -> Result<String, CodecError> {
    HexCodec::new().encode_range(data, begin, end)
}

/// Append space-delimited hex to `out`.
///
/// A space is written before every byte whenever `out` is non-empty, so
/// successive calls continue the same "HH HH HH" run.
pub fn append_hex(out: &mut String, data: &[u8]) {
    for &byte in data {
        if !out.is_empty() {
            out.push(' ');
        }
        push_byte(out, byte);
    }
}

/// Decode hex text leniently.
///
/// Characters that are not hex digits are skipped. Every two digits make one
/// byte; a single trailing digit becomes the high nibble of a final byte
/// (`"A"` decodes to `[0xA0]`). Never fails.
pub fn decode_hex(text: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(text.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for digit in text.chars().filter_map(nibble) {
        match high.take() {
            Some(h) => output.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    if let Some(h) = high {
        output.push(h << 4);
    }

    output
}

#[allow(clippy::cast_possible_truncation)]
fn nibble(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

fn push_byte(out: &mut String, byte: u8) {
    out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
    out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
}

fn checked_range(data: &[u8], begin: usize, end: usize) -> Result<&[u8], CodecError> {
    data.get(begin..end).ok_or(CodecError::InvalidRange {
        begin,
        end,
        len: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_compact() {
        assert_eq!(encode_hex(b"Hello"), "48656C6C6F");
        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn test_encode_delimited() {
        let codec = HexCodec::delimited(" ");
        assert_eq!(codec.encode(b"Hello"), "48 65 6C 6C 6F");
        assert_eq!(HexCodec::delimited(":").encode(&[0x00, 0xFF]), "00:FF");
    }

    #[test]
    fn test_encode_range() {
        assert_eq!(encode_hex_range(b"\x01\x02\x03\x04", 1, 3).unwrap(), "0203");
        assert_eq!(encode_hex_range(b"\x01", 1, 1).unwrap(), "");
    }

    #[test]
    fn test_encode_range_rejects_out_of_bounds() {
        assert_eq!(
            encode_hex_range(b"\x01\x02", 1, 3),
            Err(CodecError::InvalidRange { begin: 1, end: 3, len: 2 })
        );
        assert!(encode_hex_range(b"\x01\x02", 2, 1).is_err());
    }

    #[test]
    fn test_encode_matches_hex_crate() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(encode_hex(&data), ::hex::encode_upper(&data));
    }

    #[test]
    fn test_append_hex_continues_run() {
        let mut out = String::new();
        append_hex(&mut out, b"\xAB\x01");
        append_hex(&mut out, b"\r\n");
        assert_eq!(out, "AB 01 0D 0A");
    }

    #[test]
    fn test_decode_round_trip() {
        let data: Vec<u8> = (0..=255).rev().collect();
        assert_eq!(decode_hex(&encode_hex(&data)), data);
        assert_eq!(decode_hex(&HexCodec::delimited(", ").encode(&data)), data);
    }

    #[test]
    fn test_decode_skips_non_hex() {
        assert_eq!(decode_hex("48 65-6c\t6C\n6f"), b"Hello");
        assert_eq!(decode_hex("A9G1"), decode_hex("A91"));
        assert_eq!(decode_hex("xyz"), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_trailing_nibble() {
        assert_eq!(decode_hex("A"), vec![0xA0]);
        assert_eq!(decode_hex("A91"), vec![0xA9, 0x10]);
    }
}
