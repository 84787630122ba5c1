//! ASCII control characters used on the wire, and the byte <-> text mapping.
//!
//! Replies are stored as text with every received byte mapped to the char of
//! the same value (Latin-1). Legacy Tiger cards report high-byte addresses
//! such as 0x81, which would not survive a UTF-8 conversion.

use core::convert::TryFrom;

pub const TAB: u8 = 0x09;
pub const LF: u8 = 0x0a;
pub const CR: u8 = 0x0d;
#[cfg(test)]
pub const NAK: u8 = 0x15;
pub const BACKSLASH: u8 = b'\\';

/// Map each byte to the char with the same code point.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Inverse of [`decode`]. Chars above U+00FF have no byte and become `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_bytes_survive() {
        let raw = [b':', b'A', 0x81, 0xff, CR];
        let text = decode(&raw);
        assert_eq!(text.chars().count(), raw.len());
        assert_eq!(encode(&text), raw);
    }

    #[test]
    fn test_unencodable() {
        assert_eq!(encode("a\u{263a}b"), b"a?b");
    }
}
