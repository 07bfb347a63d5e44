// Live location source backed by an external command.
//
// Each poll runs the configured command (default `termux-location`, which
// prints a JSON object with `latitude`, `longitude` and optional `altitude`)
// and parses its stdout. Missing or null altitude reads as 0.
//
// One deadline covers the whole query: the child is polled with `try_wait`
// and killed once it passes, and the pipe contents must also arrive before
// it. stdout and stderr are drained on helper threads that report back over
// a channel, so a chatty child can't block on a full pipe and a background
// process that inherits the pipes can't hold `poll` open. Drain threads left
// behind by a timeout exit when the last writer closes the pipe.
//
// Every failure (spawn, timeout, non-zero exit, bad JSON) is logged and turned
// into `LocationReading::invalid()`.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use gps_beacon_protocol::LocationReading;
use log::{debug, info, warn};
use serde::Deserialize;

use super::{LocationSource, SourceError};
use crate::config::LiveSourceConfig;

/// How often a running child is checked for exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct LiveSource {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Clone, Copy, Debug)]
enum Pipe {
    Stdout,
    Stderr,
}

/// The subset of the location command's output we use.
#[derive(Debug, Deserialize)]
struct RawFix {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: Option<f64>,
}

impl LiveSource {
    pub fn new(config: &LiveSourceConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Run the command once and parse its output.
    pub fn query(&self) -> Result<LocationReading, SourceError> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (tx, rx) = mpsc::channel();
        drain(Pipe::Stdout, child.stdout.take(), tx.clone());
        drain(Pipe::Stderr, child.stderr.take(), tx);

        let status = wait_with_deadline(&mut child, deadline)?
            .ok_or(SourceError::Timeout(self.timeout))?;
        let (stdout, stderr) =
            collect_output(&rx, deadline).ok_or(SourceError::Timeout(self.timeout))?;

        if !status.success() {
            return Err(SourceError::Failed {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        parse_fix(&stdout)
    }
}

impl LocationSource for LiveSource {
    fn poll(&self) -> LocationReading {
        match self.query() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Error getting GPS data: {e}");
                LocationReading::invalid()
            }
        }
    }

    /// Run the command once up front so the device can ask for location
    /// permission before the first client connects.
    fn prepare(&self) {
        info!("Requesting location access via '{}'", self.command);
        match self.query() {
            Ok(reading) => debug!(
                "Initial fix: {}, {} ({} m)",
                reading.latitude, reading.longitude, reading.altitude
            ),
            Err(e) => warn!("Initial location query failed: {e}"),
        }
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            format!("live ({})", self.command)
        } else {
            format!("live ({} {})", self.command, self.args.join(" "))
        }
    }
}

fn parse_fix(stdout: &[u8]) -> Result<LocationReading, SourceError> {
    let fix: RawFix = serde_json::from_slice(stdout)?;
    Ok(LocationReading::new(
        fix.latitude,
        fix.longitude,
        fix.altitude.unwrap_or(0.0),
    ))
}

fn drain<R>(which: Pipe, pipe: Option<R>, tx: Sender<(Pipe, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send((which, buf)); // receiver gone after a timeout
    });
}

/// Both pipes' contents, or `None` if they don't close before `deadline`.
fn collect_output(
    rx: &Receiver<(Pipe, Vec<u8>)>,
    deadline: Instant,
) -> Option<(Vec<u8>, Vec<u8>)> {
    let (mut stdout, mut stderr) = (None, None);
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match rx.recv_timeout(remaining).ok()? {
            (Pipe::Stdout, buf) => stdout = Some(buf),
            (Pipe::Stderr, buf) => stderr = Some(buf),
        }
    }
    Some((stdout?, stderr?))
}

/// Exit status, or `None` after killing a child still running at `deadline`.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}
