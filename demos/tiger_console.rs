use anyhow::{Context, Result};
use std::io::Write;
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};
use std::time::Duration;

use serial_hub_proto::{
    AsiHub, SerialSession, SessionConfig, StreamTransport, Terminator, Transport,
};

fn cmd_send<T: Transport>(args: &mut CmdScanner, hub: &AsiHub<T>) -> Result<()> {
    let command = args.rest();
    if !hub.send_serial_command(&command)? {
        println!("(unchanged, not sent)");
    }
    println!("{}", hub.serial_response());
    Ok(())
}

fn cmd_build<T: Transport>(args: &mut CmdScanner, hub: &AsiHub<T>) -> Result<()> {
    let address = args.next().unwrap_or("");
    let build = hub.build_info(address)?;
    println!("{}", build.build_name);
    for i in 0..build.num_axes {
        println!(
            "  {} type {} addr {} (0x{}) props {}",
            build.axis_letters[i],
            build.axis_types[i],
            build.axis_addrs[i],
            build.axis_addrs_hex[i],
            build.axis_props[i]
        );
    }
    for define in &build.defines {
        println!("  {}", define);
    }
    Ok(())
}

fn cmd_where<T: Transport>(args: &mut CmdScanner, hub: &AsiHub<T>) -> Result<()> {
    let axis = args.next()?;
    let position: f64 = hub
        .query_verify(&format!("W {}", axis), ":A")?
        .after_position3()?;
    println!("{} = {}", axis, position);
    Ok(())
}

fn cmd_repeat<T: Transport>(args: &mut CmdScanner, hub: &AsiHub<T>) -> Result<()> {
    let duration = Duration::from_secs_f32(args.parse_next()?);
    let sent = hub.repeat_serial_command(duration)?;
    println!("sent {} times, last answer {}", sent, hub.serial_response());
    Ok(())
}

fn cmd_term<T: Transport>(args: &mut CmdScanner, hub: &AsiHub<T>) -> Result<()> {
    match args.parse_next::<usize>() {
        Ok(i) => {
            let terminator = *Terminator::ALL.get(i).context("No such terminator")?;
            hub.set_terminator(terminator);
        }
        Err(_) => {
            for (i, t) in Terminator::ALL.iter().enumerate() {
                println!("{} {}", i, t);
            }
        }
    }
    println!("terminator: {}", hub.terminator());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let serial = serialport::new(&port, 115_200)
        .timeout(Duration::from_millis(10))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;

    let hub = AsiHub::new(SerialSession::new(
        port,
        StreamTransport::new(serial),
        SessionConfig::default(),
    ));

    let mut stdout = std::io::stdout();
    loop {
        print!(">> ");
        stdout.flush()?;
        let mut cmd = String::new();
        let mut scan = CmdScanner::read_stdin(&mut cmd)?;
        if let Err(err) = match scan.next() {
            Err(_) => continue,
            Ok("send") | Ok("s") => cmd_send(&mut scan, &hub),
            Ok("build") => cmd_build(&mut scan, &hub),
            Ok("where") | Ok("w") => cmd_where(&mut scan, &hub),
            Ok("repeat") => cmd_repeat(&mut scan, &hub),
            Ok("term") => cmd_term(&mut scan, &hub),
            Ok("quit") | Ok("q") => return Ok(()),
            Ok(cmd) => {
                println!("Unknown command {}", cmd);
                continue;
            }
        } {
            println!("{:?}", err)
        }
    }
}

struct CmdScanner<'a> {
    splt: Peekable<SplitWhitespace<'a>>,
}

impl<'a> CmdScanner<'a> {
    fn read_stdin(buf: &'a mut String) -> Result<Self> {
        buf.clear();
        std::io::stdin().read_line(buf)?;
        let splt = buf.split_whitespace().peekable();
        Ok(Self { splt })
    }
    fn next(&mut self) -> Result<&'a str> {
        self.splt.next().context("End of stream")
    }
    fn parse_next<T: FromStr>(&mut self) -> Result<T> {
        self.next()?.parse::<T>().ok().context("Parse error")
    }
    /// The remaining words, joined by single spaces.
    fn rest(&mut self) -> String {
        self.splt.by_ref().collect::<Vec<_>>().join(" ")
    }
}
