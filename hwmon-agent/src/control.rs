//! Limit control channel
//!
//! Line commands read from stdin while the poll loop runs:
//! - `limit <class> <kind> <value>` sets a limit, effective from the next tick
//! - `limits` lists the current limits
//! - `help` lists the commands
//!
//! Invalid input is reported and ignored; it never stops the loop.

use hwmon_engine::{EngineError, HardwareClass, LimitHandle, MeasurementKind, MonitorKey, ParseError};
use std::io::BufRead;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const HELP: &str = "commands: limit <class> <kind> <value> | limits | help";

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetLimit { key: MonitorKey, value: f64 },
    ShowLimits,
    Help,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("'{0}' is not a number")]
    BadValue(String),
    #[error(transparent)]
    Rejected(#[from] EngineError),
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ControlCommand>, ControlError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = words.split_first() else {
        return Ok(None);
    };

    let parsed = match command.to_ascii_lowercase().as_str() {
        "limit" => {
            let [class, kind, value] = args else {
                return Err(ControlError::Usage("limit <class> <kind> <value>"));
            };
            let class: HardwareClass = class.parse()?;
            let kind: MeasurementKind = kind.parse()?;
            let value: f64 = value.parse().map_err(|_| ControlError::BadValue(value.to_string()))?;
            ControlCommand::SetLimit {
                key: MonitorKey::new(class, kind),
                value,
            }
        }
        "limits" => ControlCommand::ShowLimits,
        "help" | "?" => ControlCommand::Help,
        other => return Err(ControlError::Unknown(other.to_string())),
    };
    Ok(Some(parsed))
}

/// Apply a command and return the reply for the operator
pub fn apply(command: &ControlCommand, limits: &LimitHandle) -> Result<String, ControlError> {
    match command {
        ControlCommand::SetLimit { key, value } => {
            limits.set(*key, *value)?;
            info!("Limit for {} set to {}", key, value);
            Ok(format!("{} limit = {}", key, value))
        }
        ControlCommand::ShowLimits => Ok(limits
            .entries()
            .into_iter()
            .map(|(key, limit)| format!("{} limit = {}", key, limit))
            .collect::<Vec<_>>()
            .join("\n")),
        ControlCommand::Help => Ok(HELP.to_string()),
    }
}

/// Parse and apply one line; `None` when there is nothing to say
pub fn handle_line(line: &str, limits: &LimitHandle) -> Option<String> {
    let outcome = parse(line).and_then(|command| command.map(|c| apply(&c, limits)).transpose());
    match outcome {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Ignoring control input '{}': {}", line.trim(), e);
            Some(format!("error: {}", e))
        }
    }
}

/// Read stdin on a dedicated thread, forwarding lines until EOF
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read control input: {}", e);
                    break;
                }
            }
        }
        debug!("Control input closed");
    });
    rx
}

/// Serve control lines until the sender side closes
pub async fn serve(mut lines: mpsc::Receiver<String>, limits: LimitHandle) {
    while let Some(line) = lines.recv().await {
        if let Some(reply) = handle_line(&line, &limits) {
            println!("{}", reply);
        }
    }
}
