//! ASI Tiger hub.
//!
//! Replies end with the selected [`Terminator`] preset; commands end with a
//! CR. A reply without the expected prefix is checked for an `:N` error
//! first. The hub also runs the serial console and broadcasts settings
//! shared by peripherals on the same card.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{info, warn};

use crate::build::FirmwareBuild;
use crate::classify::Dialect;
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::reply::Reply;
use crate::session::SerialSession;
use crate::terminator::Terminator;
use crate::transport::Transport;

/// True for the `INFO` command, whatever the card address.
///
/// INFO is the only Tiger command starting with `I`, so it is enough to look
/// at the first character after the address digits and spaces.
pub fn is_info_command(command: &str) -> bool {
    command
        .chars()
        .find(|c| *c != ' ' && !c.is_ascii_digit())
        .map_or(false, |c| c.eq_ignore_ascii_case(&'I'))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts one running broadcast for as long as it lives, including when a
/// setter panics.
struct Broadcast<'a>(&'a AtomicUsize);

impl<'a> Broadcast<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Broadcast(depth)
    }
}

impl Drop for Broadcast<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Hub for an ASI Tiger controller.
#[derive(Debug)]
pub struct AsiHub<T> {
    session: SerialSession<T>,
    terminator: Mutex<Terminator>,
    registry: Mutex<DeviceRegistry<String>>,
    broadcasts: AtomicUsize,
}

impl<T: Transport> AsiHub<T> {
    pub fn new(session: SerialSession<T>) -> Self {
        Self {
            session,
            terminator: Mutex::new(Terminator::default()),
            registry: Mutex::new(DeviceRegistry::new()),
            broadcasts: AtomicUsize::new(0),
        }
    }

    pub fn session(&self) -> &SerialSession<T> {
        &self.session
    }

    /// The reply terminator used by the `query` methods.
    pub fn terminator(&self) -> Terminator {
        *lock(&self.terminator)
    }

    pub fn set_terminator(&self, terminator: Terminator) {
        *lock(&self.terminator) = terminator;
    }

    /// Select the reply terminator by its label.
    pub fn set_terminator_label(&self, label: &str) -> Result<()> {
        self.set_terminator(label.parse()?);
        Ok(())
    }

    /// Send `command`, read the reply up to the current terminator.
    pub fn query(&self, command: &str) -> Result<Reply> {
        self.query_with(command, self.terminator().as_str(), None)
    }

    pub fn query_with(
        &self,
        command: &str,
        terminator: &str,
        delay: Option<Duration>,
    ) -> Result<Reply> {
        self.session.query_command(command, terminator, delay)
    }

    /// Send `command` and require a reply starting with `expected_prefix`,
    /// usually `":A"`.
    pub fn query_verify(&self, command: &str, expected_prefix: &str) -> Result<Reply> {
        self.query_verify_with(command, expected_prefix, self.terminator().as_str(), None)
    }

    pub fn query_verify_with(
        &self,
        command: &str,
        expected_prefix: &str,
        terminator: &str,
        delay: Option<Duration>,
    ) -> Result<Reply> {
        self.session
            .query_command_verify(command, expected_prefix, terminator, delay, Dialect::Asi)
    }

    pub fn query_unterminated(
        &self,
        command: &str,
        timeout: Duration,
        reply_len: usize,
    ) -> Result<Reply> {
        self.session.query_unterminated(command, timeout, reply_len)
    }

    pub fn query_long_reply(&self, command: &str) -> Result<Reply> {
        self.session
            .query_long_reply(command, self.terminator().as_str())
    }

    /// Ask the card at `address` for its build report. An empty address
    /// asks the comm card.
    pub fn build_info(&self, address: &str) -> Result<FirmwareBuild> {
        let reply = self.query(&format!("{}BU X", address))?;
        let build = FirmwareBuild::parse(&reply)?;
        info!(
            "{} card {:?}: {} with axes {:?}",
            self.session.port(),
            address,
            build.build_name,
            build.axis_letters
        );
        Ok(build)
    }

    /// Send a command typed at the console, escapes and all.
    ///
    /// INFO replies span many lines and are read as a long reply. Returns
    /// false if the command was skipped as unchanged.
    pub fn send_serial_command(&self, escaped: &str) -> Result<bool> {
        let terminator = self.terminator();
        self.session.manual_exchange(escaped, |session, command| {
            if is_info_command(command) {
                session.query_long_reply(command, terminator.as_str())
            } else {
                session.query_command(command, terminator.as_str(), None)
            }
        })
    }

    /// The reply to the last console command, escaped for display.
    pub fn serial_response(&self) -> String {
        self.session.manual_answer_escaped()
    }

    /// Repeat the last console command for `duration`.
    pub fn repeat_serial_command(&self, duration: Duration) -> Result<usize> {
        let terminator = self.terminator();
        self.session
            .repeat_manual_command(duration, |session, command| {
                session.query_command(command, terminator.as_str(), None)
            })
    }

    pub fn register_peripheral(&self, label: &str, address: &str) {
        lock(&self.registry).register(label, address.to_string());
    }

    pub fn unregister_peripheral(&self, label: &str) {
        lock(&self.registry).unregister(label);
    }

    pub fn is_peripheral_registered(&self, label: &str) -> bool {
        lock(&self.registry).is_registered(label)
    }

    /// True while any [`update_shared_properties`](Self::update_shared_properties)
    /// call runs. A peripheral property handler checks this to avoid
    /// broadcasting a change it received from the broadcast.
    pub fn is_updating_shared_properties(&self) -> bool {
        self.broadcasts.load(Ordering::SeqCst) > 0
    }

    /// Call `set` with the label of every peripheral on the card at
    /// `address`.
    ///
    /// All peripherals are updated even if some fail; the last failure is
    /// returned.
    pub fn update_shared_properties<F>(&self, address: &str, mut set: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        // the setters may call back into the hub, so don't hold the registry
        let labels = lock(&self.registry).labels_with(&address.to_string());
        let _broadcast = Broadcast::enter(&self.broadcasts);
        let mut last_error = None;
        for label in &labels {
            if let Err(e) = set(label.as_str()) {
                warn!("updating {}: {}", label, e);
                last_error = Some(e);
            }
        }
        last_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_info_command() {
        assert!(is_info_command("INFO X"));
        assert!(is_info_command("2info z"));
        assert!(is_info_command(" 12 I X"));
        assert!(!is_info_command("2HS X?"));
        assert!(!is_info_command("W X"));
        assert!(!is_info_command(""));
        assert!(!is_info_command("  123"));
    }
}
