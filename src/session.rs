//! The command/response engine.
//!
//! A [`SerialSession`] owns one serial channel. Each exchange (purge, send,
//! optional delay, receive) runs under the session's channel lock, so
//! exchanges from different threads never interleave. Nothing is atomic
//! across calls: a caller needing two round trips as a unit must hold its
//! own lock around both.
//!
//! The session also keeps the diagnostic record (last command and reply)
//! and the state of the interactive console. The record is last-write-wins;
//! a reader may see the reply to another thread's command.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, warn};
use snafu::ResultExt;

use crate::ascii;
use crate::classify::{mismatch_error, Dialect};
use crate::error::{Result, Step, TransportSnafu};
use crate::escape::{escape_control_characters, unescape_control_characters};
use crate::reply::Reply;
use crate::terminator::COMMAND_TERMINATOR;
use crate::transport::Transport;

/// Pause between the lines of a long reply.
const LONG_REPLY_LINE_PAUSE: Duration = Duration::from_millis(1);

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a reply terminator.
    pub timeout: Duration,
    /// Upper bound on the accumulated size of a long reply.
    pub long_reply_limit: usize,
    /// Pause between the sends of a repeated console command.
    pub repeat_period: Duration,
    /// Skip console commands identical to the previous one.
    pub only_send_changed: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            long_reply_limit: 64 * 1024,
            repeat_period: Duration::from_millis(500),
            only_send_changed: true,
        }
    }
}

#[derive(Debug, Default)]
struct Record {
    last_command: String,
    last_answer: String,
    manual_answer: String,
}

#[derive(Debug)]
struct Console {
    last_command: Option<String>,
    only_send_changed: bool,
    repeat_period: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // the guarded state stays consistent even if a holder panicked
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One serial channel and its protocol state.
#[derive(Debug)]
pub struct SerialSession<T> {
    port: String,
    timeout: Duration,
    long_reply_limit: usize,
    channel: Mutex<T>,
    record: Mutex<Record>,
    console: Mutex<Console>,
}

impl<T: Transport> SerialSession<T> {
    /// Create a session on `port`, the host's name for the channel.
    /// The port can't be changed afterwards.
    pub fn new(port: impl Into<String>, transport: T, config: SessionConfig) -> Self {
        Self {
            port: port.into(),
            timeout: config.timeout,
            long_reply_limit: config.long_reply_limit,
            channel: Mutex::new(transport),
            record: Mutex::new(Record::default()),
            console: Mutex::new(Console {
                last_command: None,
                only_send_changed: config.only_send_changed,
                repeat_period: config.repeat_period,
            }),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Purge, then send `command` with the command terminator.
    fn start(&self, channel: &mut T, command: &str) -> Result<()> {
        channel.purge().context(TransportSnafu { step: Step::Purge })?;
        let mut bytes = ascii::encode(command);
        bytes.extend_from_slice(COMMAND_TERMINATOR.as_bytes());
        debug!("{} TX {:?}", self.port, command);
        channel
            .send(&bytes)
            .context(TransportSnafu { step: Step::Send })?;
        let mut record = lock(&self.record);
        record.last_command = command.into();
        record.last_answer.clear();
        Ok(())
    }

    fn finish(&self, answer: String) -> Reply {
        debug!("{} RX {:?}", self.port, answer);
        lock(&self.record).last_answer = answer.clone();
        Reply::from(answer)
    }

    /// Send `command` and read the reply up to `terminator`.
    ///
    /// If `delay` is given the calling thread sleeps that long between send
    /// and receive, for controllers that are slow to answer. The reply is
    /// not classified; transport failures are returned as they are.
    pub fn query_command(
        &self,
        command: &str,
        terminator: &str,
        delay: Option<Duration>,
    ) -> Result<Reply> {
        let mut channel = lock(&self.channel);
        self.start(&mut channel, command)?;
        if let Some(delay) = delay {
            sleep(delay);
        }
        let bytes = channel
            .receive_until(terminator.as_bytes(), self.timeout)
            .context(TransportSnafu {
                step: Step::Receive,
            })?;
        Ok(self.finish(ascii::decode(&bytes)))
    }

    /// Like [`query_command`](Self::query_command), but the reply must start
    /// with `expected_prefix`.
    ///
    /// A reply without the prefix is classified in `dialect`, so a controller
    /// error comes back as [`Error::Controller`](crate::Error::Controller).
    pub fn query_command_verify(
        &self,
        command: &str,
        expected_prefix: &str,
        terminator: &str,
        delay: Option<Duration>,
        dialect: Dialect,
    ) -> Result<Reply> {
        let reply = self.query_command(command, terminator, delay)?;
        if reply.starts_with(expected_prefix) {
            Ok(reply)
        } else {
            let err = mismatch_error(dialect, &reply);
            warn!("{} {:?}: {}", self.port, command, err);
            Err(err)
        }
    }

    /// Send `command` and collect whatever arrives within `timeout`, up to
    /// `reply_len` bytes, for replies without a usable terminator. At most
    /// [`MAX_UNTERMINATED_REPLY`](crate::MAX_UNTERMINATED_REPLY) bytes are
    /// kept.
    pub fn query_unterminated(
        &self,
        command: &str,
        timeout: Duration,
        reply_len: usize,
    ) -> Result<Reply> {
        let mut channel = lock(&self.channel);
        self.start(&mut channel, command)?;
        let raw = channel
            .read_available(reply_len, timeout)
            .context(TransportSnafu {
                step: Step::Receive,
            })?;
        Ok(self.finish(ascii::decode(&raw)))
    }

    /// Send `command` and read a reply spanning many `terminator` lines.
    ///
    /// Lines are joined with the terminator re-appended. Reading stops at
    /// the first empty line or failed read, which is the normal end of the
    /// reply, or before the reply would exceed the long reply limit.
    pub fn query_long_reply(&self, command: &str, terminator: &str) -> Result<Reply> {
        let mut channel = lock(&self.channel);
        self.start(&mut channel, command)?;
        let mut answer = String::new();
        // the limit counts wire bytes; high bytes take two in `answer`
        let mut received = 0;
        loop {
            let line = match channel.receive_until(terminator.as_bytes(), self.timeout) {
                Ok(line) if !line.is_empty() => line,
                _ => break,
            };
            sleep(LONG_REPLY_LINE_PAUSE);
            received += line.len() + terminator.len();
            if received > self.long_reply_limit {
                warn!("{} long reply to {:?} truncated", self.port, command);
                break;
            }
            answer.push_str(&ascii::decode(&line));
            answer.push_str(terminator);
        }
        Ok(self.finish(answer))
    }

    /// The last command sent on this channel, by any caller.
    pub fn last_command(&self) -> String {
        lock(&self.record).last_command.clone()
    }

    /// The last reply received on this channel, by any caller.
    pub fn last_answer(&self) -> String {
        lock(&self.record).last_answer.clone()
    }

    pub fn only_send_changed(&self) -> bool {
        lock(&self.console).only_send_changed
    }

    pub fn set_only_send_changed(&self, only_changed: bool) {
        lock(&self.console).only_send_changed = only_changed;
    }

    pub fn repeat_period(&self) -> Duration {
        lock(&self.console).repeat_period
    }

    pub fn set_repeat_period(&self, period: Duration) {
        lock(&self.console).repeat_period = period;
    }

    /// The last console command, unescaped.
    pub fn last_manual_command(&self) -> Option<String> {
        lock(&self.console).last_command.clone()
    }

    /// Run a command typed at the console.
    ///
    /// `escaped` is unescaped first. If only changed commands are sent and
    /// this one equals the previous console command, nothing is sent and
    /// `Ok(false)` is returned. Otherwise `exchange` runs the command and
    /// its reply becomes the console answer.
    pub fn manual_exchange<F>(&self, escaped: &str, exchange: F) -> Result<bool>
    where
        F: FnOnce(&Self, &str) -> Result<Reply>,
    {
        let command = unescape_control_characters(escaped);
        {
            let mut console = lock(&self.console);
            if console.only_send_changed && console.last_command.as_deref() == Some(&*command) {
                return Ok(false);
            }
            console.last_command = Some(command.clone());
        }
        let result = exchange(self, &command);
        let mut record = lock(&self.record);
        match result {
            Ok(reply) => {
                record.manual_answer = reply.into_string();
                Ok(true)
            }
            Err(e) => {
                record.manual_answer.clear();
                Err(e)
            }
        }
    }

    /// The reply to the last console command.
    pub fn manual_answer(&self) -> String {
        lock(&self.record).manual_answer.clone()
    }

    /// The reply to the last console command, made printable.
    pub fn manual_answer_escaped(&self) -> String {
        escape_control_characters(&lock(&self.record).manual_answer)
    }

    /// Re-send the last console command every repeat period for `duration`.
    ///
    /// Blocks the calling thread for the whole duration. Each send takes the
    /// channel lock like any other exchange, so other traffic goes in between.
    /// Stops at the first error. Returns how many times the command was sent.
    pub fn repeat_manual_command<F>(&self, duration: Duration, mut exchange: F) -> Result<usize>
    where
        F: FnMut(&Self, &str) -> Result<Reply>,
    {
        let command = match self.last_manual_command() {
            Some(command) => command,
            None => return Ok(0),
        };
        let period = self.repeat_period();
        let start = Instant::now();
        let mut sent = 0;
        while start.elapsed() < duration {
            if let Err(e) = exchange(self, &command) {
                warn!("{} repeating {:?} stopped: {}", self.port, command, e);
                return Err(e);
            }
            sent += 1;
            sleep(period);
        }
        Ok(sent)
    }
}
