//! The serial channel as seen by a session.
//!
//! A [`Transport`] offers the three primitives an exchange needs: drop stale
//! input, send bytes, and receive up to a terminator within a timeout.
//! [`StreamTransport`] implements them over anything that is `Read + Write`
//! and has a read timeout of its own, such as a serial port.

use std::io::{self, ErrorKind, Read, Write};
use std::thread::sleep;
use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use log::{debug, trace};

use crate::buffer::Buffer;

/// The longest reply an unterminated read keeps.
pub const MAX_UNTERMINATED_REPLY: usize = 1024;

/// The raw bytes of an unterminated read.
pub type RawReply = ArrayVec<u8, MAX_UNTERMINATED_REPLY>;

/// How long a purge keeps draining input that is still arriving.
const PURGE_DRAIN: Duration = Duration::from_millis(20);

/// The channel primitives used by [`SerialSession`](crate::SerialSession).
pub trait Transport {
    /// Discard everything received but not yet read, including input still
    /// held by the channel below.
    fn purge(&mut self) -> io::Result<()>;

    /// Write all of `data` to the channel.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read until `terminator` and return the bytes before it.
    ///
    /// Fails with [`ErrorKind::TimedOut`] if the terminator doesn't arrive
    /// within `timeout`.
    fn receive_until(&mut self, terminator: &[u8], timeout: Duration) -> io::Result<Vec<u8>>;

    /// Read whatever arrives within `timeout`, up to `max` bytes and at most
    /// [`MAX_UNTERMINATED_REPLY`]. Returns early once that many have been read.
    fn read_available(&mut self, max: usize, timeout: Duration) -> io::Result<RawReply>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn purge(&mut self) -> io::Result<()> {
        (**self).purge()
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).send(data)
    }

    fn receive_until(&mut self, terminator: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
        (**self).receive_until(terminator, timeout)
    }

    fn read_available(&mut self, max: usize, timeout: Duration) -> io::Result<RawReply> {
        (**self).read_available(max, timeout)
    }
}

const READ_CHUNK: usize = 64;

/// A [`Transport`] over a byte stream.
///
/// The stream's own read timeout should be short compared to the session
/// timeout; reads that time out or would block are retried until the
/// deadline passes. A read of zero bytes means the stream is closed.
#[derive(Debug)]
pub struct StreamTransport<IO> {
    io: IO,
    buffer: Buffer,
}

impl<IO: Read + Write> StreamTransport<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            io,
            buffer: Buffer::new(),
        }
    }

    pub fn get_ref(&self) -> &IO {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Read one chunk into the buffer. Returns false if nothing arrived.
    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.io.read(&mut chunk) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "serial stream closed",
            )),
            Ok(len) => {
                trace!("read {:?}", &chunk[..len]);
                self.buffer.write(&chunk[..len]);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                sleep(Duration::from_millis(1));
                Ok(false)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn timed_out() -> io::Error {
    io::Error::new(ErrorKind::TimedOut, "no reply")
}

impl<IO: Read + Write> Transport for StreamTransport<IO> {
    /// Drops the buffer, then reads and drops whatever the stream still
    /// holds until a read comes back empty or the drain time is up.
    fn purge(&mut self) -> io::Result<()> {
        let deadline = Instant::now() + PURGE_DRAIN;
        let mut discarded = 0;
        loop {
            discarded += self.buffer.len();
            self.buffer.clear();
            if Instant::now() >= deadline {
                break;
            }
            match self.fill() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        if discarded > 0 {
            debug!("purged {} stale bytes", discarded);
        }
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.io.write_all(data)?;
        self.io.flush()
    }

    fn receive_until(&mut self, terminator: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.buffer.take_until(terminator) {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(timed_out());
            }
            self.fill()?;
        }
    }

    fn read_available(&mut self, max: usize, timeout: Duration) -> io::Result<RawReply> {
        let max = max.min(MAX_UNTERMINATED_REPLY);
        let deadline = Instant::now() + timeout;
        while self.buffer.len() < max && Instant::now() < deadline {
            if let Err(e) = self.fill() {
                // a closed stream ends the read like the timeout does
                if e.kind() != ErrorKind::UnexpectedEof {
                    return Err(e);
                }
                break;
            }
        }
        Ok(self.buffer.take(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reads from a script, records writes.
    struct Loopback {
        rx: Cursor<Vec<u8>>,
        tx: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // one byte at a time, like a slow serial line
            let len = buf.len().min(1);
            self.rx.read(&mut buf[..len])
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn transport(rx: &[u8]) -> StreamTransport<Loopback> {
        StreamTransport::new(Loopback {
            rx: Cursor::new(rx.to_vec()),
            tx: Vec::new(),
        })
    }

    #[test]
    fn test_receive_until() {
        let mut t = transport(b":A 1\r\n:A 2\r\n");
        let timeout = Duration::from_millis(100);
        assert_eq!(t.receive_until(b"\r\n", timeout).unwrap(), b":A 1");
        assert_eq!(t.receive_until(b"\r\n", timeout).unwrap(), b":A 2");
        let err = t.receive_until(b"\r\n", timeout).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_send_and_purge() {
        let mut t = transport(b"stale\r");
        t.send(b"WHERE X\r").unwrap();
        assert_eq!(t.get_ref().tx, b"WHERE X\r");
        let raw = t.read_available(2, Duration::from_millis(50)).unwrap();
        assert_eq!(raw.as_slice(), b"st");
        // purge drains the stream as well as the buffer
        t.purge().unwrap();
        assert!(t
            .read_available(1024, Duration::from_millis(50))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_read_available_is_bounded() {
        let mut t = transport(&[b'x'; 2000]);
        let raw = t.read_available(5000, Duration::from_millis(500)).unwrap();
        assert_eq!(raw.len(), MAX_UNTERMINATED_REPLY);
    }

    #[test]
    fn test_zero_timeout() {
        let mut t = transport(b"");
        let err = t.receive_until(b"\r", Duration::from_millis(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }
}
