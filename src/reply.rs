//! The text a controller sent back for one command, and field extraction.
//!
//! Parsing never panics: a reply that is too short or lacks the delimiter
//! yields a [`FieldError`], and the caller decides whether that aborts the
//! operation or falls back to a default.

use core::fmt;
use core::ops::Deref;

use snafu::{ensure, OptionExt, Snafu};

use crate::parse::LeadingNumber;

/// Error type for field extraction
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum FieldError {
    /// The delimiter doesn't occur in the reply.
    #[snafu(display("no {:?} in {:?}", delimiter, answer))]
    MissingDelimiter { delimiter: char, answer: String },
    /// The delimiter is the last character of the reply.
    #[snafu(display("nothing after {:?} in {:?}", delimiter, answer))]
    NothingAfterDelimiter { delimiter: char, answer: String },
    /// The reply has no character at the requested position.
    #[snafu(display("{:?} is too short for position {}", answer, position))]
    TooShort { position: usize, answer: String },
}

/// How [`Reply::tokenize`] treats adjacent delimiters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Adjacent delimiters produce empty tokens, so token indices match columns.
    KeepEmpty,
    /// Empty tokens are dropped.
    SkipEmpty,
}

/// Split `text` on any of the chars in `delimiters`.
pub fn tokenize(text: &str, delimiters: &str, policy: SplitPolicy) -> Vec<String> {
    let tokens = text.split(|c: char| delimiters.contains(c));
    match policy {
        SplitPolicy::KeepEmpty => tokens.map(String::from).collect(),
        SplitPolicy::SkipEmpty => tokens
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
    }
}

/// A reply, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Reply(String);

impl Reply {
    pub fn new(answer: impl Into<String>) -> Self {
        Self(answer.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the text following the first `delimiter`.
    /// # Errors
    /// Fails if the delimiter is missing or is the last character.
    pub fn after_delimiter<N: LeadingNumber>(&self, delimiter: char) -> Result<N, FieldError> {
        let pos = self.0.find(delimiter).with_context(|| MissingDelimiterSnafu {
            delimiter,
            answer: self.0.clone(),
        })?;
        let rest = &self.0[pos + delimiter.len_utf8()..];
        ensure!(
            !rest.is_empty(),
            NothingAfterDelimiterSnafu {
                delimiter,
                answer: self.0.clone(),
            }
        );
        Ok(N::from_leading(rest))
    }

    /// Parse the value of an `X=45.2` style reply.
    pub fn after_equals<N: LeadingNumber>(&self) -> Result<N, FieldError> {
        self.after_delimiter('=')
    }

    /// Parse the value of a `:A 45.2`/`X:45.2` style reply.
    pub fn after_colon<N: LeadingNumber>(&self) -> Result<N, FieldError> {
        self.after_delimiter(':')
    }

    pub fn after_underscore<N: LeadingNumber>(&self) -> Result<N, FieldError> {
        self.after_delimiter('_')
    }

    /// Parse the text starting at character `position`, e.g. 3 for `":A 45.1"`.
    pub fn after_position<N: LeadingNumber>(&self, position: usize) -> Result<N, FieldError> {
        Ok(N::from_leading(self.tail(position)?))
    }

    /// Skip a two character tag such as `"X="`.
    pub fn after_position2<N: LeadingNumber>(&self) -> Result<N, FieldError> {
        self.after_position(2)
    }

    /// Skip a three character tag such as `":A "`.
    pub fn after_position3<N: LeadingNumber>(&self) -> Result<N, FieldError> {
        self.after_position(3)
    }

    /// The character at `position`.
    pub fn char_at(&self, position: usize) -> Result<char, FieldError> {
        self.0.chars().nth(position).context(TooShortSnafu {
            position,
            answer: self.0.clone(),
        })
    }

    pub fn char_at3(&self) -> Result<char, FieldError> {
        self.char_at(3)
    }

    /// Split the reply on any of the chars in `delimiters`.
    pub fn tokenize(&self, delimiters: &str, policy: SplitPolicy) -> Vec<String> {
        tokenize(&self.0, delimiters, policy)
    }

    pub fn split_on_cr(&self) -> Vec<String> {
        self.tokenize("\r", SplitPolicy::KeepEmpty)
    }

    pub fn split_on_space(&self) -> Vec<String> {
        self.tokenize(" ", SplitPolicy::KeepEmpty)
    }

    pub fn split_on_comma(&self) -> Vec<String> {
        self.tokenize(",", SplitPolicy::KeepEmpty)
    }

    fn tail(&self, position: usize) -> Result<&str, FieldError> {
        match self.0.char_indices().nth(position) {
            Some((offset, _)) => Ok(&self.0[offset..]),
            None => TooShortSnafu {
                position,
                answer: self.0.clone(),
            }
            .fail(),
        }
    }
}

impl Deref for Reply {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Reply {
    fn from(answer: String) -> Self {
        Self(answer)
    }
}

impl From<&str> for Reply {
    fn from(answer: &str) -> Self {
        Self(answer.into())
    }
}

impl From<Reply> for String {
    fn from(reply: Reply) -> Self {
        reply.0
    }
}

impl PartialEq<str> for Reply {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Reply {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_equals() {
        assert_eq!(Reply::from("X=45.2").after_equals::<f64>(), Ok(45.2));
        assert_eq!(Reply::from("X=12 A").after_equals::<i64>(), Ok(12));
        assert!(matches!(
            Reply::from("X=").after_equals::<f64>(),
            Err(FieldError::NothingAfterDelimiter { .. })
        ));
        assert!(matches!(
            Reply::from("X45.2").after_equals::<f64>(),
            Err(FieldError::MissingDelimiter { .. })
        ));
        // garbage after the delimiter parses as zero, like atof
        assert_eq!(Reply::from("X=abc").after_equals::<f64>(), Ok(0.0));
    }

    #[test]
    fn test_other_delimiters() {
        assert_eq!(Reply::from("X:17").after_colon::<i64>(), Ok(17));
        // the leading colon of an ASI reply is the delimiter
        assert_eq!(Reply::from(":A 17").after_colon::<i64>(), Ok(0));
        assert_eq!(Reply::from("CARD_7").after_underscore::<u32>(), Ok(7));
        // only the first delimiter counts
        assert_eq!(Reply::from("A=1=2").after_equals::<i32>(), Ok(1));
    }

    #[test]
    fn test_after_position() {
        assert_eq!(Reply::from(":A 45.1").after_position3::<f64>(), Ok(45.1));
        assert_eq!(Reply::from(":A-2").after_position2::<i64>(), Ok(-2));
        assert!(matches!(
            Reply::from(":A").after_position3::<f64>(),
            Err(FieldError::TooShort { position: 3, .. })
        ));
        assert!(Reply::from("abc").after_position::<f64>(3).is_err());
        assert!(Reply::from("").after_position2::<u32>().is_err());
    }

    #[test]
    fn test_char_at() {
        let reply = Reply::from(":A P");
        assert_eq!(reply.char_at3(), Ok('P'));
        assert_eq!(reply.char_at(0), Ok(':'));
        assert!(reply.char_at(4).is_err());
        // positions count characters, not UTF-8 bytes
        let reply = Reply::from("\u{81}\u{82}Z");
        assert_eq!(reply.char_at(2), Ok('Z'));
    }

    #[test]
    fn test_tokenize() {
        let reply = Reply::from("Motor Axes: Z F P Q");
        let mut tokens = reply.split_on_space();
        tokens.drain(..2);
        assert_eq!(tokens, vec!["Z", "F", "P", "Q"]);

        let reply = Reply::from("a,,b");
        assert_eq!(reply.split_on_comma(), vec!["a", "", "b"]);
        assert_eq!(reply.tokenize(",", SplitPolicy::SkipEmpty), vec!["a", "b"]);
        assert_eq!(
            Reply::from("a b,c").tokenize(" ,", SplitPolicy::KeepEmpty),
            vec!["a", "b", "c"]
        );
        assert_eq!(Reply::from("one\rtwo").split_on_cr(), vec!["one", "two"]);
    }
}
