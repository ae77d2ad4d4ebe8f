//! MPD idle subscription over the daemon's line protocol.

use std::{
    io::{BufRead, BufReader, Write},
    net::TcpStream,
    time::Duration,
};

use super::{HookEvent, Notification, Runner};
use crate::{
    error::{Error, Result},
    tools::split_sleep,
};

/// Connection parameters of one MPD instance. These are the identity
/// fields: two MPD hooks are interchangeable only when all three match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MpdConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6600,
            password: None,
        }
    }
}

/// Minimal client for the MPD text protocol: one command out, `key: value`
/// lines back until `OK` (or an `ACK` failure).
pub struct MpdClient {
    reader: BufReader<TcpStream>,
}

impl MpdClient {
    pub fn connect(config: &MpdConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))?;
        let mut client = Self {
            reader: BufReader::new(stream),
        };

        let greeting = client.read_line()?;
        if !greeting.starts_with("OK MPD") {
            return Err(Error::Mpd(format!("unexpected greeting {greeting:?}")));
        }
        if let Some(password) = &config.password {
            client.command(&format!("password {password}"))?;
        }
        Ok(client)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.read_line_into(&mut line)
    }

    /// Read one line, appending to `buf`. On an error (including a read
    /// timeout) the bytes read so far stay in `buf`, so passing the same
    /// buffer again resumes the interrupted line instead of dropping it.
    fn read_line_into(&mut self, buf: &mut String) -> Result<String> {
        if self.reader.read_line(buf)? == 0 {
            return Err(Error::Mpd("connection closed".to_string()));
        }
        let line = buf.trim_end().to_string();
        buf.clear();
        Ok(line)
    }

    fn send(&mut self, command: &str) -> Result<()> {
        let mut stream = self.reader.get_ref();
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
        Ok(())
    }

    /// Run one command and collect its `key: value` response pairs.
    pub fn command(&mut self, command: &str) -> Result<Vec<(String, String)>> {
        self.send(command)?;
        let mut pairs = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "OK" {
                return Ok(pairs);
            }
            if line.starts_with("ACK") {
                return Err(Error::Mpd(line));
            }
            if let Some((key, value)) = line.split_once(": ") {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }

    pub fn status(&mut self) -> Result<Vec<(String, String)>> {
        self.command("status")
    }

    pub fn current_song(&mut self) -> Result<Vec<(String, String)>> {
        self.command("currentsong")
    }

    fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        Ok(())
    }
}

/// Look a key up in a response, case-insensitively (MPD is inconsistent
/// about tag capitalisation).
#[must_use]
pub fn value_of<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn is_timeout(error: &Error) -> bool {
    matches!(
        error,
        Error::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        )
    )
}

/// Idle loop: wait for `changed: <subsystem>` lines, notify on each
/// completed idle cycle and reconnect (with a degraded notification) when
/// the daemon goes away.
///
/// The read timeout doubles as the stop-token check interval, since a
/// blocked socket read cannot observe the token.
pub(crate) fn run(runner: &Runner, config: &MpdConfig) {
    let refresh = if runner.refresh.is_zero() {
        Duration::from_secs(1)
    } else {
        runner.refresh
    };
    let backoff = if runner.failure_refresh.is_zero() {
        refresh
    } else {
        runner.failure_refresh
    };

    let mut client: Option<MpdClient> = None;
    let mut idling = false;
    let mut changed: Vec<String> = Vec::new();
    let mut partial = String::new();

    while !runner.stop.is_set() {
        let Some(c) = client.as_mut() else {
            match MpdClient::connect(config) {
                Ok(c) => {
                    if let Err(e) = c.set_read_timeout(refresh) {
                        tracing::error!("could not set the mpd read timeout: {e}");
                    }
                    client = Some(c);
                    idling = false;
                    changed.clear();
                    partial.clear();
                    // Force an initial notification: idle only reports
                    // changes, so subscribers would otherwise stay empty
                    // until the first one.
                    runner.notify(&Notification {
                        running: true,
                        event: HookEvent::Mpd(Vec::new()),
                    });
                }
                Err(e) => {
                    tracing::error!("mpd is maybe not running or host/port are not correct: {e}");
                    runner.notify(&Notification {
                        running: false,
                        event: HookEvent::Mpd(Vec::new()),
                    });
                    split_sleep(backoff, &runner.stop);
                }
            }
            continue;
        };

        if !idling {
            if let Err(e) = c.send("idle") {
                tracing::error!("mpd connection lost: {e}");
                client = None;
                continue;
            }
            idling = true;
        }

        match c.read_line_into(&mut partial) {
            Ok(line) => {
                if line == "OK" {
                    idling = false;
                    if !changed.is_empty() {
                        runner.notify(&Notification {
                            running: true,
                            event: HookEvent::Mpd(std::mem::take(&mut changed)),
                        });
                    }
                } else if let Some(subsystem) = line.strip_prefix("changed: ") {
                    changed.push(subsystem.to_string());
                }
            }
            Err(e) if is_timeout(&e) => {}
            Err(e) => {
                tracing::error!("mpd connection lost: {e}");
                client = None;
                idling = false;
                changed.clear();
                partial.clear();
                runner.notify(&Notification {
                    running: false,
                    event: HookEvent::Mpd(Vec::new()),
                });
                split_sleep(backoff, &runner.stop);
            }
        }
    }
}
