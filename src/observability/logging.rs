//! Structured logging.
//!
//! # Responsibilities
//! - Stamp events with timestamp, service, domain and environment
//! - Emit each event to the console, then the local NDJSON file
//! - Hand events to the remote shipper without waiting on it
//!
//! # Design Decisions
//! - Console output is the bare JSON line on stdout, independent of `RUST_LOG`
//! - Sink failures are reported on the console and never reach the caller
//! - Reserved stamp keys win over caller metadata; `domain` is caller-overridable
//! - `debug` events exist only in development mode

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{AppConfig, Environment};
use crate::observability::shipper::{RemoteLogShipper, ShipError};

/// Caller-supplied structured fields.
pub type Metadata = serde_json::Map<String, Value>;

/// Keys owned by the logger. Caller values under these keys are dropped.
pub const RESERVED_KEYS: [&str; 5] = ["timestamp", "level", "message", "service", "environment"];

/// Turn a `json!` object into [`Metadata`]. Non-object values land under `value`.
pub fn meta(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        Value::Null => Metadata::new(),
        other => {
            let mut map = Metadata::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags stamped on every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    pub service: String,
    pub domain: String,
    pub environment: Environment,
}

impl EventStamp {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            service: config.logging.service.clone(),
            domain: config.logging.domain.clone(),
            environment: config.environment,
        }
    }
}

/// One structured log event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    service: String,
    domain: String,
    environment: Environment,
    #[serde(flatten)]
    metadata: Metadata,
}

impl LogEvent {
    /// Build an event stamped now.
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        stamp: &EventStamp,
        mut metadata: Metadata,
    ) -> Self {
        for key in RESERVED_KEYS {
            if metadata.remove(key).is_some() {
                tracing::debug!(key, "Dropped caller metadata colliding with a reserved key");
            }
        }
        let domain = match metadata.remove("domain") {
            Some(Value::String(domain)) => domain,
            _ => stamp.domain.clone(),
        };

        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            service: stamp.service.clone(),
            domain,
            environment: stamp.environment,
            metadata,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Single-line JSON form used by the console and file sinks.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Append-only NDJSON file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Point the sink at `dir/file_name`, creating `dir` if needed.
    ///
    /// A directory that cannot be created is reported, not returned: every
    /// later append will fail and be reported the same way.
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Self {
        let dir = dir.as_ref();
        if let Err(e) = fs::create_dir_all(dir) {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to create log directory");
        }
        Self {
            path: dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write_line(&mut file, line)
    }
}

/// Logger shared by every component through `Arc`.
#[derive(Debug)]
pub struct StructuredLogger {
    stamp: EventStamp,
    file: Option<FileSink>,
    shipper: Option<RemoteLogShipper>,
}

impl StructuredLogger {
    /// Console-only logger.
    pub fn new(stamp: EventStamp) -> Self {
        Self {
            stamp,
            file: None,
            shipper: None,
        }
    }

    pub fn with_file(mut self, file: FileSink) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_shipper(mut self, shipper: RemoteLogShipper) -> Self {
        self.shipper = Some(shipper);
        self
    }

    /// Wire up the sinks selected by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ShipError> {
        let mut logger = Self::new(EventStamp::from_config(config));

        if config.logging.file_enabled {
            logger = logger.with_file(FileSink::new(
                &config.logging.directory,
                &config.logging.file_name,
            ));
        }

        if config.remote_log.enabled {
            let remote = &config.remote_log;
            let shipper = RemoteLogShipper::new(
                remote.push_url(),
                &remote.app,
                &remote.service,
                Duration::from_secs(remote.timeout_secs),
            )?;
            logger = logger.with_shipper(shipper);
        }

        Ok(logger)
    }

    pub fn is_development(&self) -> bool {
        self.stamp.environment.is_development()
    }

    /// Emit one event. Returns the event, or `None` when it was suppressed.
    ///
    /// Console and file writes happen before this returns; the remote push
    /// runs on a detached task.
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Metadata,
    ) -> Option<LogEvent> {
        if level == LogLevel::Debug && !self.is_development() {
            return None;
        }

        let event = LogEvent::new(level, message, &self.stamp, metadata);
        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, event_message = %event.message(), "Failed to serialize log event");
                return None;
            }
        };

        write_console(&line);

        if let Some(file) = &self.file {
            if let Err(e) = file.append(&line) {
                tracing::error!(path = %file.path().display(), error = %e, "Failed to write to log file");
            }
        }

        if let Some(shipper) = &self.shipper {
            shipper.dispatch(vec![event.clone()]);
        }

        Some(event)
    }

    pub fn debug(&self, message: impl Into<String>, metadata: Metadata) -> Option<LogEvent> {
        self.log(LogLevel::Debug, message, metadata)
    }

    pub fn info(&self, message: impl Into<String>, metadata: Metadata) -> Option<LogEvent> {
        self.log(LogLevel::Info, message, metadata)
    }

    pub fn warn(&self, message: impl Into<String>, metadata: Metadata) -> Option<LogEvent> {
        self.log(LogLevel::Warn, message, metadata)
    }

    pub fn error(&self, message: impl Into<String>, metadata: Metadata) -> Option<LogEvent> {
        self.log(LogLevel::Error, message, metadata)
    }

    /// Local sinks are written synchronously, so there is nothing to flush.
    pub fn flush(&self) {}
}

/// One line per event on stdout, outside the `tracing` filter.
fn write_console(line: &str) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_line(&mut out, line).and_then(|()| out.flush()) {
        tracing::error!(error = %e, "Failed to write log line to stdout");
    }
}

/// Write `line` and its newline in a single call.
fn write_line(out: &mut impl Write, line: &str) -> io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    out.write_all(buf.as_bytes())
}
