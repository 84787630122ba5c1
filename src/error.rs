//! Error type shared by the session, the hubs and the peripherals.
//!
//! Every error maps into the adapter error-code space with [`Error::code`],
//! which is what the host shows through its error-reporting mechanism.

use snafu::Snafu;
use std::fmt;
use std::io;

use crate::classify::Dialect;
use crate::reply::FieldError;

/// Unrecognized serial answer from an ASI device.
pub const ASI_UNRECOGNIZED_ANSWER: i32 = 10009;
/// The build report did not list any axes.
pub const ASI_NOT_ENOUGH_AXES: i32 = 10021;
/// Card addresses beyond '9' need firmware that reports hex addresses.
pub const ASI_TOO_LARGE_ADDRESSES: i32 = 10022;
/// Added to the number in a `:N<n>` reply.
pub const ASI_ERROR_BASE: i32 = 10100;

const PRIOR_OFFSET: i32 = 11000;
/// Unrecognized response from a Prior controller.
pub const PRIOR_UNRECOGNIZED_ANSWER: i32 = PRIOR_OFFSET + 1;
/// Response could not be parsed as the requested value.
pub const PRIOR_INVALID_RESPONSE: i32 = PRIOR_OFFSET + 2;
/// A command was answered, but not with the expected value.
pub const PRIOR_COMMAND_FAILED: i32 = PRIOR_OFFSET + 4;
/// Nothing answers on the port, or a device isn't on the controller.
pub const PRIOR_DEVICE_NOT_PRESENT: i32 = PRIOR_OFFSET + 22;
/// A filter wheel position outside the wheel.
pub const PRIOR_WHEEL_POSITION_INVALID: i32 = PRIOR_OFFSET + 23;
/// Added to the number in an `E,<n>` reply.
pub const PRIOR_ERROR_BASE: i32 = PRIOR_OFFSET + 100;

/// The step of an exchange during which the transport failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Purge,
    Send,
    Receive,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Purge => "purging the input buffer",
            Step::Send => "sending",
            Step::Receive => "receiving",
        })
    }
}

/// Error type for this crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The serial transport failed. Never retried by this crate.
    #[snafu(display("Serial transport failed while {}: {}", step, source))]
    Transport { step: Step, source: io::Error },

    /// A reply that matches neither the expected shape nor a structured error.
    #[snafu(display("Unrecognized serial answer from {} controller: {:?}", dialect, answer))]
    UnrecognizedAnswer { dialect: Dialect, answer: String },

    /// A reply with the right shape but without a readable number.
    #[snafu(display("Invalid response format from {} controller: {:?}", dialect, answer))]
    InvalidResponse { dialect: Dialect, answer: String },

    /// The controller reported a fault.
    #[snafu(display("{} controller reported error {}", dialect, number))]
    Controller { dialect: Dialect, number: i32 },

    /// A field could not be extracted from an otherwise successful reply.
    #[snafu(display("Unrecognized serial answer: {}", source), context(false))]
    Field { source: FieldError },

    #[snafu(display("Do not have any axes installed"))]
    NotEnoughAxes,

    #[snafu(display("Need new firmware for more than 10 cards"))]
    TooLargeAddresses,

    /// The controller answered, but not with the value the command requires.
    #[snafu(display("Command {:?} failed, controller answered {:?}", command, answer))]
    CommandFailed { command: String, answer: String },

    #[snafu(display("No Prior controller detected on {}", port))]
    NotDetected { port: String },

    #[snafu(display("Invalid filter wheel position {} for {} positions", position, positions))]
    WheelPosition { position: i64, positions: i64 },

    #[snafu(display("Unknown serial terminator {:?}", name))]
    UnknownTerminator { name: String },
}

impl Error {
    /// The adapter error code for this error.
    ///
    /// Transport failures return `None`; the host reports its own serial
    /// status for those.
    pub fn code(&self) -> Option<i32> {
        use Error::*;
        match self {
            Transport { .. } | UnknownTerminator { .. } => None,
            UnrecognizedAnswer { dialect, .. } => Some(dialect.unrecognized_code()),
            InvalidResponse { dialect, .. } => Some(dialect.invalid_code()),
            Controller { dialect, number } => Some(dialect.error_base() + number),
            Field { .. } => Some(ASI_UNRECOGNIZED_ANSWER),
            NotEnoughAxes => Some(ASI_NOT_ENOUGH_AXES),
            TooLargeAddresses => Some(ASI_TOO_LARGE_ADDRESSES),
            CommandFailed { .. } => Some(PRIOR_COMMAND_FAILED),
            NotDetected { .. } => Some(PRIOR_DEVICE_NOT_PRESENT),
            WheelPosition { .. } => Some(PRIOR_WHEEL_POSITION_INVALID),
        }
    }

    /// True if the transport timed out waiting for a reply.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport { source, .. } if source.kind() == io::ErrorKind::TimedOut)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let e = Error::Controller {
            dialect: Dialect::Asi,
            number: 1,
        };
        assert_eq!(e.code(), Some(10101));
        let e = Error::Controller {
            dialect: Dialect::Prior,
            number: 8,
        };
        assert_eq!(e.code(), Some(11108));
        assert_eq!(Error::NotEnoughAxes.code(), Some(10021));
        let e = Error::UnrecognizedAnswer {
            dialect: Dialect::Prior,
            answer: "?".into(),
        };
        assert_eq!(e.code(), Some(11001));
    }

    #[test]
    fn test_timeout() {
        let e = Error::Transport {
            step: Step::Receive,
            source: io::Error::new(io::ErrorKind::TimedOut, "no reply"),
        };
        assert!(e.is_timeout());
        assert_eq!(e.code(), None);
        assert_eq!(
            e.to_string(),
            "Serial transport failed while receiving: no reply"
        );
    }
}
