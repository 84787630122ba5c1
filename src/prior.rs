//! Prior ProScan hub.
//!
//! Replies end with a CR. `R` acknowledges a command, `E,<n>` reports error
//! `n`, and queries answer with a bare number. The controller must be in
//! standard mode (`COMP 0`) for replies to look like this.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use snafu::ensure;

use crate::classify::{classify_prior, is_prior_error, Dialect};
use crate::error::{CommandFailedSnafu, Error, NotDetectedSnafu, Result};
use crate::parse::LeadingNumber;
use crate::registry::DeviceRegistry;
use crate::reply::Reply;
use crate::session::SerialSession;
use crate::transport::Transport;

/// Prior replies end with a CR.
pub const PRIOR_TERMINATOR: &str = "\r";

/// Highest shutter and filter wheel number probed by detection.
const MAX_PROBED_ID: i32 = 3;

/// A device found by [`PriorHub::detect_installed_devices`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PriorDevice {
    XYStage,
    ZStage,
    Shutter(i32),
    Wheel(i32),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse a bare numeric reply.
///
/// An `E,<n>` reply is returned as the controller error. Empty replies and
/// replies not starting with a number are invalid.
pub fn parse_numeric<N: LeadingNumber>(answer: &str) -> Result<N> {
    let invalid = || Error::InvalidResponse {
        dialect: Dialect::Prior,
        answer: answer.into(),
    };
    if is_prior_error(answer) {
        return Err(classify_prior(answer)
            .into_result(Dialect::Prior, answer)
            .err()
            .unwrap_or_else(invalid));
    }
    N::parse_prefix(answer).ok_or_else(invalid)
}

/// Hub for a Prior ProScan controller.
#[derive(Debug)]
pub struct PriorHub<T> {
    session: SerialSession<T>,
    registry: Mutex<DeviceRegistry<i32>>,
    initialized: AtomicBool,
}

impl<T: Transport> PriorHub<T> {
    /// The ProScan console sends every command, so the session's
    /// only-send-changed setting is switched off.
    pub fn new(session: SerialSession<T>) -> Self {
        session.set_only_send_changed(false);
        Self {
            session,
            registry: Mutex::new(DeviceRegistry::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &SerialSession<T> {
        &self.session
    }

    pub fn query(&self, command: &str) -> Result<Reply> {
        self.session.query_command(command, PRIOR_TERMINATOR, None)
    }

    /// Send `command` and require a reply starting with `expected_prefix`.
    /// An `E,<n>` reply comes back as the controller error.
    pub fn query_verify(&self, command: &str, expected_prefix: &str) -> Result<Reply> {
        self.session.query_command_verify(
            command,
            expected_prefix,
            PRIOR_TERMINATOR,
            None,
            Dialect::Prior,
        )
    }

    /// Send a command that is acknowledged with `R`.
    pub fn expect_success(&self, command: &str) -> Result<()> {
        let reply = self.query(command)?;
        classify_prior(&reply).into_result(Dialect::Prior, &reply)?;
        Ok(())
    }

    /// Send a command whose acknowledgement varies between firmware
    /// versions. Only an `E,<n>` reply is an error.
    pub fn expect_no_error(&self, command: &str) -> Result<Reply> {
        let reply = self.query(command)?;
        if is_prior_error(&reply) {
            classify_prior(&reply).into_result(Dialect::Prior, &reply)?;
        }
        Ok(reply)
    }

    /// Send `command` and parse the numeric reply.
    pub fn query_numeric<N: LeadingNumber>(&self, command: &str) -> Result<N> {
        let reply = self.query(command)?;
        parse_numeric(&reply)
    }

    /// The controller status byte (`$`). The low bits are set while stage
    /// axes move, bits 4 to 6 while filter wheels move.
    pub fn status(&self) -> Result<i64> {
        let reply = self.query("$")?;
        Ok(i64::from_leading(&reply))
    }

    /// Switch off compatibility mode. The controller answers `0`.
    pub fn set_standard_mode(&self) -> Result<()> {
        let reply = self.query("COMP 0")?;
        ensure!(
            reply == "0",
            CommandFailedSnafu {
                command: "COMP 0",
                answer: reply.as_str(),
            }
        );
        Ok(())
    }

    /// Put the controller in standard mode and check that it answers.
    pub fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.set_standard_mode()?;
        let status = self.query("$")?;
        info!("{} Prior controller status {}", self.session.port(), status);
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// True if a controller answers on the port.
    pub fn detect_device(&self) -> bool {
        if self.is_initialized() {
            return true;
        }
        self.query("COMP 0").is_ok() && self.query("$").map_or(false, |r| !r.is_empty())
    }

    fn answers_with_number(&self, command: &str) -> bool {
        self.query(command)
            .map_or(false, |r| i64::parse_prefix(&r).is_some())
    }

    fn answers_without_error(&self, command: &str) -> bool {
        self.query(command).map_or(false, |r| !is_prior_error(&r))
    }

    /// Probe for stages, shutters and filter wheels.
    pub fn detect_installed_devices(&self) -> Result<Vec<PriorDevice>> {
        ensure!(
            self.detect_device(),
            NotDetectedSnafu {
                port: self.session.port(),
            }
        );
        let mut found = Vec::new();
        if self.answers_with_number("PX") {
            found.push(PriorDevice::XYStage);
        }
        if self.answers_with_number("PZ") {
            found.push(PriorDevice::ZStage);
        }
        for id in 1..=MAX_PROBED_ID {
            if self.answers_without_error(&format!("8,{}", id)) {
                found.push(PriorDevice::Shutter(id));
            }
        }
        for id in 1..=MAX_PROBED_ID {
            if self.answers_without_error(&format!("7,{}", id)) {
                found.push(PriorDevice::Wheel(id));
            }
        }
        debug!("{} found {:?}", self.session.port(), found);
        Ok(found)
    }

    pub fn register_peripheral(&self, label: &str, id: i32) {
        lock(&self.registry).register(label, id);
    }

    pub fn unregister_peripheral(&self, label: &str) {
        lock(&self.registry).unregister(label);
    }

    pub fn is_peripheral_registered(&self, label: &str) -> bool {
        lock(&self.registry).is_registered(label)
    }

    /// Labels of the registered peripherals with device `id`.
    pub fn peripherals_with_id(&self, id: i32) -> Vec<String> {
        lock(&self.registry).labels_with(&id)
    }

    /// Send a command typed at the console. Empty commands are ignored,
    /// repeated ones are sent again.
    pub fn send_serial_command(&self, escaped: &str) -> Result<bool> {
        if escaped.is_empty() {
            return Ok(false);
        }
        self.session.manual_exchange(escaped, |session, command| {
            session.query_command(command, PRIOR_TERMINATOR, None)
        })
    }

    /// The reply to the last console command, escaped for display.
    pub fn serial_response(&self) -> String {
        self.session.manual_answer_escaped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric::<i64>("12345").unwrap(), 12345);
        assert_eq!(parse_numeric::<i64>("-17,R").unwrap(), -17);
        assert_eq!(parse_numeric::<f64>("0.1").unwrap(), 0.1);
        assert_eq!(parse_numeric::<i64>("E,8").unwrap_err().code(), Some(11108));
        assert_eq!(parse_numeric::<i64>("E,").unwrap_err().code(), Some(11002));
        assert_eq!(parse_numeric::<i64>("").unwrap_err().code(), Some(11002));
        assert_eq!(parse_numeric::<i64>("R").unwrap_err().code(), Some(11002));
    }
}
