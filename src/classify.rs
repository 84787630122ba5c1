//! Response classification for the two controller dialects.
//!
//! ASI controllers signal a fault with `:N<n>` (in practice `:N-1`, `:N-2`, ...),
//! Prior controllers with `E,<n>` and success with a leading `R`. Classification
//! is by exact prefix only; there is no partial matching.

use core::fmt;

use crate::error::{
    Error, Result, ASI_ERROR_BASE, ASI_UNRECOGNIZED_ANSWER, PRIOR_ERROR_BASE,
    PRIOR_INVALID_RESPONSE, PRIOR_UNRECOGNIZED_ANSWER,
};
use crate::parse::LeadingNumber;

/// The reply conventions of a controller family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// ASI Tiger and MS-2000 controllers.
    Asi,
    /// Prior ProScan controllers.
    Prior,
}

impl Dialect {
    /// Added to the controller's error number to form the adapter code.
    pub const fn error_base(self) -> i32 {
        match self {
            Dialect::Asi => ASI_ERROR_BASE,
            Dialect::Prior => PRIOR_ERROR_BASE,
        }
    }

    pub const fn unrecognized_code(self) -> i32 {
        match self {
            Dialect::Asi => ASI_UNRECOGNIZED_ANSWER,
            Dialect::Prior => PRIOR_UNRECOGNIZED_ANSWER,
        }
    }

    /// The ASI dialect has no separate code for an unreadable number.
    pub const fn invalid_code(self) -> i32 {
        match self {
            Dialect::Asi => ASI_UNRECOGNIZED_ANSWER,
            Dialect::Prior => PRIOR_INVALID_RESPONSE,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Asi => "ASI",
            Dialect::Prior => "Prior",
        })
    }
}

/// What a reply means.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseOutcome<'a> {
    /// The reply had the expected shape; holds the text after the prefix.
    Success(&'a str),
    /// The controller reported a fault; holds the adapter error code.
    ControllerError(i32),
    /// Neither success nor a structured error; holds the adapter error code.
    MalformedResponse(i32),
}

impl<'a> ResponseOutcome<'a> {
    /// Convert to a `Result`, keeping `answer` for the error message.
    pub fn into_result(self, dialect: Dialect, answer: &str) -> Result<&'a str> {
        match self {
            ResponseOutcome::Success(payload) => Ok(payload),
            ResponseOutcome::ControllerError(code) => Err(Error::Controller {
                dialect,
                number: code - dialect.error_base(),
            }),
            ResponseOutcome::MalformedResponse(code) if code != dialect.unrecognized_code() => {
                Err(Error::InvalidResponse {
                    dialect,
                    answer: answer.into(),
                })
            }
            ResponseOutcome::MalformedResponse(_) => Err(Error::UnrecognizedAnswer {
                dialect,
                answer: answer.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success(_))
    }
}

/// The error number of an ASI `:N` reply.
///
/// The number is read like `atoi`: a sign directly after the `N` is skipped,
/// and a body without digits yields 0.
pub fn asi_error_number(answer: &str) -> Option<i32> {
    let body = answer.strip_prefix(":N")?;
    if body.is_empty() {
        return None;
    }
    let body = body.strip_prefix('-').unwrap_or(body);
    Some(i32::from_leading(body))
}

/// Classify an ASI reply against the prefix the command should produce.
pub fn classify_asi<'a>(answer: &'a str, expected_prefix: &str) -> ResponseOutcome<'a> {
    if let Some(payload) = answer.strip_prefix(expected_prefix) {
        ResponseOutcome::Success(payload)
    } else if let Some(number) = asi_error_number(answer) {
        ResponseOutcome::ControllerError(ASI_ERROR_BASE + number)
    } else {
        ResponseOutcome::MalformedResponse(ASI_UNRECOGNIZED_ANSWER)
    }
}

/// The error for an ASI reply that didn't have the expected prefix.
pub fn asi_error_reply(answer: &str) -> Error {
    match asi_error_number(answer) {
        Some(number) => Error::Controller {
            dialect: Dialect::Asi,
            number,
        },
        None => Error::UnrecognizedAnswer {
            dialect: Dialect::Asi,
            answer: answer.into(),
        },
    }
}

/// The error for a reply that lacks the prefix a command should produce.
///
/// A mismatch is taken to be a structured controller error first; only if
/// the reply isn't one is it reported as unrecognized.
pub fn mismatch_error(dialect: Dialect, answer: &str) -> Error {
    match dialect {
        Dialect::Asi => asi_error_reply(answer),
        Dialect::Prior => match classify_prior(answer).into_result(dialect, answer) {
            Err(e) => e,
            Ok(_) => Error::UnrecognizedAnswer {
                dialect,
                answer: answer.into(),
            },
        },
    }
}

pub fn is_prior_success(answer: &str) -> bool {
    answer.starts_with('R')
}

pub fn is_prior_error(answer: &str) -> bool {
    answer.starts_with("E,")
}

/// Classify a Prior reply.
///
/// `E,` without a readable number is malformed with the invalid-response code,
/// distinct from the code for a reply of unknown shape.
pub fn classify_prior(answer: &str) -> ResponseOutcome<'_> {
    if is_prior_success(answer) {
        ResponseOutcome::Success(&answer[1..])
    } else if let Some(body) = answer.strip_prefix("E,") {
        match i32::parse_prefix(body) {
            Some(number) => ResponseOutcome::ControllerError(PRIOR_ERROR_BASE + number),
            None => ResponseOutcome::MalformedResponse(PRIOR_INVALID_RESPONSE),
        }
    } else {
        ResponseOutcome::MalformedResponse(PRIOR_UNRECOGNIZED_ANSWER)
    }
}

/// The adapter code for a Prior reply that isn't a success.
pub fn prior_error_code(answer: &str) -> i32 {
    match classify_prior(answer) {
        ResponseOutcome::ControllerError(code) | ResponseOutcome::MalformedResponse(code) => code,
        ResponseOutcome::Success(_) => PRIOR_UNRECOGNIZED_ANSWER,
    }
}
