//! Control character escaping for the serial console.
//!
//! Replies are shown to the user with control characters spelled out, and
//! commands typed by the user may contain the same escapes. Printable
//! characters pass through; CR, LF and TAB become `\r`, `\n` and `\t`; any
//! other control character becomes a backslash and its decimal code.

use std::fmt::Write;

use crate::ascii::{BACKSLASH, CR, LF, TAB};

/// Make `text` printable.
pub fn escape_control_characters(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        let code = u32::from(c);
        if code > 31 {
            escaped.push(c);
        } else if code == u32::from(CR) {
            escaped.push_str("\\r");
        } else if code == u32::from(LF) {
            escaped.push_str("\\n");
        } else if code == u32::from(TAB) {
            escaped.push_str("\\t");
        } else {
            // writing to a String can't fail
            let _ = write!(escaped, "\\{}", code);
        }
    }
    escaped
}

/// Turn escapes typed by the user back into the characters they stand for.
///
/// A backslash followed by digits is a decimal character code (taken modulo
/// 256). `\r`, `\n`, `\t` and `\\` are the C escapes. A backslash before
/// anything else, or at the end of the input, is kept literally.
pub fn unescape_control_characters(text: &str) -> String {
    let backslash = char::from(BACKSLASH);
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != backslash {
            unescaped.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut code: u32 = 0;
                while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                    code = code.wrapping_mul(10).wrapping_add(digit);
                    chars.next();
                }
                unescaped.push(char::from((code & 0xff) as u8));
            }
            Some('r') => {
                chars.next();
                unescaped.push(char::from(CR));
            }
            Some('n') => {
                chars.next();
                unescaped.push(char::from(LF));
            }
            Some('t') => {
                chars.next();
                unescaped.push(char::from(TAB));
            }
            Some('\\') => {
                chars.next();
                unescaped.push(backslash);
            }
            _ => unescaped.push(backslash),
        }
    }
    unescaped
}
