// Interactive operator console.
//
// Reads line commands and applies them to the `TargetRegistry`:
//
//   y / yes   prompt for "lat lon [alt]" and set the target
//   clear     remove the target
//   help      list commands
//
// Commands are case-insensitive. Bad input only prints a `[!]` diagnostic and
// re-prompts; the loop never exits on bad input. It stops when the input
// ends (stdin closed) or the output can't be written, and in both cases the
// server keeps running without a console.
//
// `OperatorConsole` is generic over `BufRead`/`Write` so tests can drive it
// with in-memory buffers; `spawn_stdin_console` wires it to the terminal on
// its own thread.

use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use thiserror::Error;

use crate::target::TargetRegistry;

const COMMAND_PROMPT: &str = "[?] Enter command (y/clear/help): ";
const COORDINATE_PROMPT: &str = "[?] Enter target coordinates (lat lon [alt]): ";

const HELP_TEXT: &str = "\
Commands:
  y, yes          - Set a target location
  clear           - Remove existing target
  help            - Show this help
  Ctrl+C          - Exit the server";

/// A parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    SetTarget,
    Clear,
    Help,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => ConsoleCommand::SetTarget,
            "clear" => ConsoleCommand::Clear,
            "help" => ConsoleCommand::Help,
            other => ConsoleCommand::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Invalid format. Expected: latitude longitude [altitude]")]
    WrongTokenCount(usize),
    #[error("Invalid coordinates. Please enter numeric values.")]
    NotNumeric(String),
}

/// Parse `"lat lon [alt]"`. Altitude defaults to 0; tokens past the third are
/// ignored. Values must be finite but are not range-checked.
pub fn parse_coordinates(line: &str) -> Result<(f64, f64, f64), CoordinateError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(CoordinateError::WrongTokenCount(tokens.len()));
    }
    // `nan` and `inf` parse as f64 but serialize as null, which reads as
    // "no target" on the wire.
    let number = |token: &str| {
        token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| CoordinateError::NotNumeric(token.to_string()))
    };
    let latitude = number(tokens[0])?;
    let longitude = number(tokens[1])?;
    let altitude = match tokens.get(2) {
        Some(&token) => number(token)?,
        None => 0.0,
    };
    Ok((latitude, longitude, altitude))
}

pub struct OperatorConsole<R, W> {
    input: R,
    output: W,
    targets: TargetRegistry,
}

impl<R: BufRead, W: Write> OperatorConsole<R, W> {
    pub fn new(input: R, output: W, targets: TargetRegistry) -> Self {
        Self {
            input,
            output,
            targets,
        }
    }

    /// Prompt and handle commands until the input ends.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            write!(self.output, "\n{COMMAND_PROMPT}")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(());
            };
            self.handle(&line)?;
        }
    }

    /// Apply one command line. Only output errors are returned.
    pub fn handle(&mut self, line: &str) -> io::Result<()> {
        match ConsoleCommand::parse(line) {
            ConsoleCommand::SetTarget => self.prompt_target(),
            ConsoleCommand::Clear => {
                self.targets.clear();
                writeln!(self.output, "[*] Target location cleared")
            }
            ConsoleCommand::Help => writeln!(self.output, "\n{HELP_TEXT}"),
            ConsoleCommand::Unknown(_) => writeln!(
                self.output,
                "[!] Unknown command. Type 'help' for available commands."
            ),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt_target(&mut self) -> io::Result<()> {
        write!(self.output, "{COORDINATE_PROMPT}")?;
        self.output.flush()?;
        let Some(line) = self.read_line()? else {
            return Ok(());
        };
        match parse_coordinates(&line) {
            Ok((lat, lon, alt)) => {
                self.targets.set(lat, lon, alt);
                writeln!(
                    self.output,
                    "[*] Target location set to: Lat={lat}, Lon={lon}, Alt={alt}"
                )
            }
            Err(e) => writeln!(self.output, "[!] {e}"),
        }
    }

    /// Next line, lossily decoded; `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// Run a console on stdin/stdout in a background thread.
pub fn spawn_stdin_console(targets: TargetRegistry) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("operator-console".into())
        .spawn(move || {
            let mut console = OperatorConsole::new(io::stdin().lock(), io::stdout(), targets);
            match console.run() {
                Ok(()) => info!("Console input closed; target can no longer be changed"),
                Err(e) => warn!("Console stopped: {e}"),
            }
        })
}
