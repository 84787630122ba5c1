#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Error, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serial_hub_proto::{RawReply, SerialSession, SessionConfig, Transport};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One call into the transport, tagged with the calling thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Purge(String),
    Send(String, String),
    Receive(String),
}

impl Step {
    pub fn thread(&self) -> &str {
        match self {
            Step::Purge(t) | Step::Send(t, _) | Step::Receive(t) => t,
        }
    }
}

pub type StepLog = Arc<Mutex<Vec<Step>>>;

fn thread_name() -> String {
    thread::current().name().unwrap_or("main").to_string()
}

/// A controller simulated at the command level.
///
/// Replies come from a table of fixed answers first, then from a queue of
/// scripted answers. A command with neither gets no reply, which the
/// transport reports as a timeout. An answer may span several lines, each
/// returned by its own receive.
pub struct FakeController {
    answers: HashMap<String, Vec<String>>,
    script: VecDeque<String>,
    pending: VecDeque<String>,
    log: StepLog,
    step_delay: Duration,
    pub fail_send: bool,
}

impl FakeController {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            script: VecDeque::new(),
            pending: VecDeque::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            step_delay: Duration::from_millis(0),
            fail_send: false,
        }
    }

    /// Always answer `command` with `reply`.
    pub fn answer(self, command: &str, reply: &str) -> Self {
        self.answer_lines(command, &[reply])
    }

    /// Always answer `command` with `lines`, one per receive.
    pub fn answer_lines(mut self, command: &str, lines: &[&str]) -> Self {
        self.answers
            .insert(command.into(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Answer the next unmatched command with `reply`.
    pub fn then(mut self, reply: &str) -> Self {
        self.script.push_back(reply.into());
        self
    }

    /// Sleep this long in every step, to give other threads a chance to
    /// cut in.
    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn log(&self) -> StepLog {
        Arc::clone(&self.log)
    }

    fn record(&self, step: Step) {
        self.log.lock().unwrap().push(step);
        thread::sleep(self.step_delay);
    }

    /// The commands sent so far, without terminators.
    pub fn sent(log: &StepLog) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Step::Send(_, cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for FakeController {
    fn purge(&mut self) -> io::Result<()> {
        self.record(Step::Purge(thread_name()));
        self.pending.clear();
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        if self.fail_send {
            return Err(Error::new(ErrorKind::BrokenPipe, "port closed"));
        }
        let command: String = data.iter().copied().map(char::from).collect();
        let command = command.trim_end_matches('\r').to_string();
        self.record(Step::Send(thread_name(), command.clone()));
        self.pending = match self.answers.get(&command) {
            Some(lines) => lines.iter().cloned().collect(),
            None => self.script.pop_front().into_iter().collect(),
        };
        Ok(())
    }

    fn receive_until(&mut self, _terminator: &[u8], _timeout: Duration) -> io::Result<Vec<u8>> {
        self.record(Step::Receive(thread_name()));
        match self.pending.pop_front() {
            Some(reply) => Ok(reply.chars().map(|c| c as u8).collect()),
            None => Err(Error::new(ErrorKind::TimedOut, "no reply")),
        }
    }

    fn read_available(&mut self, max: usize, _timeout: Duration) -> io::Result<RawReply> {
        self.record(Step::Receive(thread_name()));
        let mut raw = RawReply::new();
        if let Some(reply) = self.pending.pop_front() {
            let len = max.min(raw.capacity());
            raw.extend(reply.chars().map(|c| c as u8).take(len));
        }
        Ok(raw)
    }
}

pub fn session(controller: FakeController) -> SerialSession<FakeController> {
    init_logging();
    let config = SessionConfig {
        timeout: Duration::from_millis(50),
        repeat_period: Duration::from_millis(1),
        ..Default::default()
    };
    SerialSession::new("COM3", controller, config)
}

/// A byte-level serial line. Each CR-terminated command written to it
/// queues the bytes of its answer for reading.
pub struct SerialLine {
    answers: HashMap<Vec<u8>, Vec<u8>>,
    line: Vec<u8>,
    rx: VecDeque<u8>,
    pub written: Vec<u8>,
}

impl SerialLine {
    pub fn new(answers: &[(&str, &[u8])]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(cmd, reply)| (cmd.as_bytes().to_vec(), reply.to_vec()))
                .collect(),
            line: Vec::new(),
            rx: VecDeque::new(),
            written: Vec::new(),
        }
    }

    /// Bytes already waiting to be read before anything is sent, such as
    /// a late answer to an earlier command.
    pub fn pending(mut self, bytes: &[u8]) -> Self {
        self.rx.extend(bytes.iter().copied());
        self
    }
}

impl Read for SerialLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.rx.is_empty() {
            return Err(Error::new(ErrorKind::TimedOut, "nothing to read"));
        }
        // trickle out a few bytes at a time
        let len = buf.len().min(self.rx.len()).min(3);
        for b in buf[..len].iter_mut() {
            *b = self.rx.pop_front().unwrap_or_default();
        }
        Ok(len)
    }
}

impl Write for SerialLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        for &b in buf {
            if b == b'\r' {
                if let Some(reply) = self.answers.get(&self.line) {
                    self.rx.extend(reply.iter().copied());
                }
                self.line.clear();
            } else {
                self.line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
