//! Command/response engine for ASI Tiger and Prior ProScan serial controllers.
//!
//! Both controller families speak line based ASCII: a command goes out with a
//! trailing CR and a single reply comes back with a terminator. This crate
//! runs that exchange over a [`Transport`], one exchange at a time per
//! channel, and makes sense of the reply:
//!
//! * [`classify`] tells success from a controller error (`:N-1`, `E,8`) and
//!   from noise, and maps controller errors to adapter error codes.
//! * [`Reply`] pulls numbers and tokens out of a reply the way the C library
//!   does: a number is whatever numeric prefix follows the delimiter.
//! * [`FirmwareBuild`] parses the build report of an ASI card.
//! * [`escape_control_characters`] and [`unescape_control_characters`] carry
//!   replies to and commands from the serial console.
//!
//! [`AsiHub`] and [`PriorHub`] bundle this for each controller family, and
//! the peripherals in [`devices`] issue their commands through a hub.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use serial_hub_proto::{AsiHub, SerialSession, SessionConfig, StreamTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = serialport::new("/dev/ttyUSB0", 115_200)
//!     .timeout(Duration::from_millis(10))
//!     .open()?;
//! let session = SerialSession::new(
//!     "/dev/ttyUSB0",
//!     StreamTransport::new(port),
//!     SessionConfig::default(),
//! );
//! let hub = AsiHub::new(session);
//! let build = hub.build_info("")?;
//! println!("{} has axes {:?}", build.build_name, build.axis_letters);
//! let x: f64 = hub.query_verify("W X", ":A")?.after_position3()?;
//! println!("X is at {}", x);
//! # Ok(()) }
//! ```

mod ascii;
pub mod asi;
mod buffer;
mod build;
pub mod classify;
pub mod devices;
mod error;
mod escape;
mod parse;
pub mod prior;
mod registry;
mod reply;
mod session;
mod terminator;
mod transport;

pub use crate::asi::{is_info_command, AsiHub};
pub use crate::build::FirmwareBuild;
pub use crate::classify::{Dialect, ResponseOutcome};
pub use crate::error::{
    Error, Result, Step, ASI_ERROR_BASE, ASI_NOT_ENOUGH_AXES, ASI_TOO_LARGE_ADDRESSES,
    ASI_UNRECOGNIZED_ANSWER, PRIOR_COMMAND_FAILED, PRIOR_DEVICE_NOT_PRESENT, PRIOR_ERROR_BASE,
    PRIOR_INVALID_RESPONSE, PRIOR_UNRECOGNIZED_ANSWER, PRIOR_WHEEL_POSITION_INVALID,
};
pub use crate::escape::{escape_control_characters, unescape_control_characters};
pub use crate::parse::LeadingNumber;
pub use crate::prior::{PriorDevice, PriorHub};
pub use crate::registry::DeviceRegistry;
pub use crate::reply::{tokenize, FieldError, Reply, SplitPolicy};
pub use crate::session::{SerialSession, SessionConfig};
pub use crate::terminator::{Terminator, COMMAND_TERMINATOR, LINE_SEPARATOR};
pub use crate::transport::{RawReply, StreamTransport, Transport, MAX_UNTERMINATED_REPLY};
