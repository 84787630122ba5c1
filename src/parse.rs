//! Numeric prefix parsing with the semantics of the C library.
//!
//! Controllers pad and suffix their numbers freely (`":A 45.1 "`, `"12.5um"`),
//! so a value is whatever valid number the text starts with, after leading
//! whitespace. [`LeadingNumber::from_leading`] behaves like `atof`/`atol`
//! (no number means zero), [`LeadingNumber::parse_prefix`] like
//! `strtod`/`strtol` with an end pointer check (no number means `None`).

use nom::branch::alt;
use nom::character::complete::{char, digit0, digit1, multispace0, one_of};
use nom::combinator::{opt, recognize};
use nom::sequence::{pair, preceded, tuple};
use nom::IResult;

fn sign(s: &str) -> IResult<&str, Option<char>> {
    opt(one_of("+-"))(s)
}

fn integer_prefix(s: &str) -> IResult<&str, &str> {
    preceded(multispace0, recognize(pair(sign, digit1)))(s)
}

fn exponent(s: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), sign, digit1)))(s)
}

fn float_prefix(s: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        recognize(tuple((
            sign,
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(exponent),
        ))),
    )(s)
}

/// Parse an integer prefix, clamping out-of-range values like `strtol`.
fn leading_i64(s: &str) -> Option<i64> {
    let (_, digits) = integer_prefix(s).ok()?;
    Some(digits.parse::<i64>().unwrap_or_else(|_| {
        if digits.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }
    }))
}

/// A number that can be read from the start of a reply.
pub trait LeadingNumber: Sized + Default {
    /// The number at the start of `s`, or `None` if `s` doesn't start with one.
    fn parse_prefix(s: &str) -> Option<Self>;

    /// The number at the start of `s`, or zero.
    fn from_leading(s: &str) -> Self {
        Self::parse_prefix(s).unwrap_or_default()
    }
}

impl LeadingNumber for f64 {
    fn parse_prefix(s: &str) -> Option<Self> {
        let (_, number) = float_prefix(s).ok()?;
        number.parse().ok()
    }
}

impl LeadingNumber for i64 {
    fn parse_prefix(s: &str) -> Option<Self> {
        leading_i64(s)
    }
}

// The narrower types truncate the way a C cast from long does.
impl LeadingNumber for i32 {
    fn parse_prefix(s: &str) -> Option<Self> {
        leading_i64(s).map(|v| v as i32)
    }
}

impl LeadingNumber for u32 {
    fn parse_prefix(s: &str) -> Option<Self> {
        leading_i64(s).map(|v| v as u32)
    }
}
