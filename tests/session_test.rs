mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use serial_hub_proto::{Error, SerialSession, SessionConfig, StreamTransport};

fn worker<F>(name: &str, work: F) -> thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(work)
        .expect("spawn failed")
}

/// Split the step log into exchanges, each starting with a purge.
fn exchanges(log: &[Step]) -> Vec<&[Step]> {
    let mut starts: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, Step::Purge(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts.first(), Some(&0), "log starts mid exchange");
    starts.push(log.len());
    starts.windows(2).map(|w| &log[w[0]..w[1]]).collect()
}

#[test]
fn exchanges_never_interleave() {
    const THREADS: usize = 4;
    const QUERIES: usize = 10;

    let mut controller = FakeController::new()
        .step_delay(Duration::from_millis(1))
        .answer_lines("INFO X", &["Axis X", "Enc Pos: 12", ""])
        .answer("RDADC X", "512");
    for t in 0..THREADS {
        controller = controller.answer(&format!("W T{}", t), &format!(":A {}", t));
    }
    let log = controller.log();
    let session = Arc::new(session(controller));

    let mut workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let session = Arc::clone(&session);
            worker(&format!("query{}", t), move || {
                for _ in 0..QUERIES {
                    let reply = session
                        .query_command(&format!("W T{}", t), "\r\n", None)
                        .expect("query failed");
                    // a reply never goes to the wrong caller
                    assert_eq!(reply, format!(":A {}", t).as_str());
                }
            })
        })
        .collect();
    let long = Arc::clone(&session);
    workers.push(worker("long", move || {
        for _ in 0..QUERIES {
            let reply = long.query_long_reply("INFO X", "\r\n").unwrap();
            assert_eq!(reply, "Axis X\r\nEnc Pos: 12\r\n");
        }
    }));
    let raw = Arc::clone(&session);
    workers.push(worker("raw", move || {
        for _ in 0..QUERIES {
            let reply = raw
                .query_unterminated("RDADC X", Duration::from_millis(5), 16)
                .unwrap();
            assert_eq!(reply, "512");
        }
    }));
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let log = log.lock().unwrap();
    let exchanges = exchanges(&log);
    assert_eq!(exchanges.len(), (THREADS + 2) * QUERIES);
    for exchange in exchanges {
        let thread = exchange[0].thread();
        let receives = match &exchange[1] {
            Step::Send(_, cmd) if cmd == "INFO X" => 3,
            Step::Send(..) => 1,
            _ => panic!("no send after purge: {:?}", exchange),
        };
        assert_eq!(exchange.len(), 2 + receives, "{:?}", exchange);
        assert!(
            exchange[2..].iter().all(|s| matches!(s, Step::Receive(_))),
            "{:?}",
            exchange
        );
        assert!(exchange.iter().all(|s| s.thread() == thread), "{:?}", exchange);
    }
}

#[test]
fn stale_input_is_purged() {
    init_logging();
    // a late answer to an earlier command is still waiting in the stream
    let line = SerialLine::new(&[("W Y", b":A 222\r\n")]).pending(b":A 111\r\n");
    let config = SessionConfig {
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let session = SerialSession::new("/dev/ttyS0", StreamTransport::new(line), config);
    assert_eq!(session.query_command("W Y", "\r\n", None).unwrap(), ":A 222");
    assert_eq!(session.last_answer(), ":A 222");
}

#[test]
fn delayed_query_keeps_the_channel() {
    let controller = FakeController::new()
        .answer("RDSBYTE", ":A 10")
        .answer("W X", ":A 5");
    let log = controller.log();
    let session = Arc::new(session(controller));

    let slow = {
        let session = Arc::clone(&session);
        thread::Builder::new()
            .name("slow".into())
            .spawn(move || {
                session
                    .query_command("RDSBYTE", "\r\n", Some(Duration::from_millis(30)))
                    .expect("slow query failed")
            })
            .expect("spawn failed")
    };
    thread::sleep(Duration::from_millis(5));
    assert_eq!(session.query_command("W X", "\r\n", None).unwrap(), ":A 5");
    assert_eq!(slow.join().unwrap(), ":A 10");

    let sent = FakeController::sent(&log);
    assert_eq!(sent, vec!["RDSBYTE", "W X"]);
}

#[test]
fn transport_failures_are_passed_through() {
    let mut controller = FakeController::new();
    controller.fail_send = true;
    let session = session(controller);
    let err = session.query_command("W X", "\r\n", None).unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(err.code(), None);
    assert!(!err.is_timeout());

    let session = common::session(FakeController::new());
    let err = session.query_command("W X", "\r\n", None).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn stream_transport_session() {
    init_logging();
    let line = SerialLine::new(&[
        ("W X", b":A 123.4 \r\n"),
        ("BU", b"TIGER_COMM\r\n"),
        ("RDADC Z", b":A 512\r"),
    ]);
    let config = SessionConfig {
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let session = SerialSession::new("/dev/ttyS0", StreamTransport::new(line), config);

    let reply = session.query_command("W X", "\r\n", None).unwrap();
    assert_eq!(reply.after_position3::<f64>().unwrap(), 123.4);
    assert_eq!(session.query_command("BU", "\r\n", None).unwrap(), "TIGER_COMM");

    // no terminator: whatever arrives before the timeout
    let reply = session
        .query_unterminated("RDADC Z", Duration::from_millis(20), 64)
        .unwrap();
    assert_eq!(reply, ":A 512\r");

    // nothing answers this one
    assert!(session
        .query_command("HALT", "\r\n", None)
        .unwrap_err()
        .is_timeout());
}
