//! Alert presentation
//!
//! Handles:
//! - Terminal bell cue, one at a time
//! - External command per alert, with the event in its environment
//! - Fan-out to several sinks
//!
//! Sinks never block the tick and never queue: an alert arriving while the
//! previous one is still being presented is dropped.

use chrono::SecondsFormat;
use hwmon_engine::{AlertEvent, AlertSink};
use parking_lot::Mutex;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const BELL: &[u8] = b"\x07";

#[derive(Debug, Error)]
pub enum AlertSetupError {
    #[error("alert command is empty")]
    EmptyCommand,
    #[error("alert command has unbalanced quoting: {0}")]
    Quoting(#[from] shell_words::ParseError),
}

/// Rings the terminal bell, at most one cue per `cue` window
pub struct BellSink {
    out: Mutex<Box<dyn Write + Send>>,
    cue: Duration,
    last_cue: Mutex<Option<Instant>>,
}

impl BellSink {
    pub fn new(cue: Duration) -> Self {
        Self::with_writer(Box::new(std::io::stderr()), cue)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, cue: Duration) -> Self {
        Self {
            out: Mutex::new(out),
            cue,
            last_cue: Mutex::new(None),
        }
    }

    fn start_cue(&self) -> bool {
        let mut last = self.last_cue.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.cue => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl AlertSink for BellSink {
    fn notify(&self, event: &AlertEvent) {
        if !self.start_cue() {
            debug!("Bell still sounding, skipping cue for {}", event.key);
            return;
        }

        let mut out = self.out.lock();
        if let Err(e) = out.write_all(BELL).and_then(|_| out.flush()) {
            debug!("Failed to ring bell: {}", e);
        }
    }
}

/// Clears the busy flag when the child is done, or when it never started
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a configured command for each alert, one child at a time
///
/// The child sees `HWMON_KEY`, `HWMON_VALUE`, `HWMON_LIMIT` and `HWMON_AT`.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    busy: Arc<AtomicBool>,
}

impl CommandSink {
    pub fn new(command: &str) -> Result<Self, AlertSetupError> {
        let mut words = shell_words::split(command)?.into_iter();
        let program = words.next().ok_or(AlertSetupError::EmptyCommand)?;

        Ok(Self {
            program,
            args: words.collect(),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl AlertSink for CommandSink {
    fn notify(&self, event: &AlertEvent) {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("Alert command still running, dropping alert for {}", event.key);
            return;
        }
        let guard = InFlight(Arc::clone(&self.busy));

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .env("HWMON_KEY", event.key.to_string())
            .env("HWMON_VALUE", event.value.to_string())
            .env("HWMON_LIMIT", event.limit.to_string())
            .env("HWMON_AT", event.at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .stdin(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let program = self.program.clone();
                std::thread::spawn(move || {
                    let _guard = guard;
                    match child.wait() {
                        Ok(status) if !status.success() => warn!("Alert command {} exited with {}", program, status),
                        Ok(_) => {}
                        Err(e) => warn!("Failed to wait for alert command {}: {}", program, e),
                    }
                });
            }
            Err(e) => warn!("Failed to run alert command {}: {}", self.program, e),
        }
    }
}

/// Hands every alert to each of its sinks
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AlertSink for FanOutSink {
    fn notify(&self, event: &AlertEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }
}
