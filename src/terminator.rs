//! Reply terminators.
//!
//! Commands always go out with a trailing CR. Replies end with one of a few
//! fixed sequences depending on which card answers; the Tiger comm card uses
//! CR LF, a filter wheel card LF CR.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// Appended to every outgoing command.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Separates the lines of a multi-line reply such as the build report.
pub const LINE_SEPARATOR: &str = "\r";

/// The selectable reply terminator presets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// `\r\n`, the Tiger default.
    CrLf,
    /// `\n\r`, used by filter wheel cards.
    LfCr,
    /// A single NAK byte.
    Nak,
    /// `\r` only.
    Cr,
    /// `\n` only.
    Lf,
}

impl Terminator {
    pub const ALL: [Terminator; 5] = [
        Terminator::CrLf,
        Terminator::LfCr,
        Terminator::Nak,
        Terminator::Cr,
        Terminator::Lf,
    ];

    /// The terminator characters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Terminator::CrLf => "\r\n",
            Terminator::LfCr => "\n\r",
            Terminator::Nak => "\u{15}",
            Terminator::Cr => "\r",
            Terminator::Lf => "\n",
        }
    }

    /// The name shown in the terminator selection list.
    pub const fn label(self) -> &'static str {
        match self {
            Terminator::CrLf => "Tiger+WK Default - \\r\\n",
            Terminator::LfCr => "FilterWheel - \\n\\r",
            Terminator::Nak => "<NAK> - \\0x15",
            Terminator::Cr => "return only - \\r",
            Terminator::Lf => "newline only - \\n",
        }
    }
}

impl Default for Terminator {
    fn default() -> Self {
        Terminator::CrLf
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Terminator {
    type Err = Error;

    /// Parse a selection list label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Terminator::ALL
            .iter()
            .copied()
            .find(|t| t.label() == s)
            .ok_or_else(|| Error::UnknownTerminator { name: s.into() })
    }
}

impl AsRef<str> for Terminator {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
