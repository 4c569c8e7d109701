//! Log targets and the JSON-lines writer behind the event and access logs.

use crate::event::{Event, EventSink};
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use thiserror::Error;
use tracing::error;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

pub const APPLICATION_LOG: &str = "krbgate.log";
pub const ACCESS_LOG: &str = "access.log";
pub const EVENT_LOG: &str = "event.log";

#[derive(Debug, Error)]
pub enum LogTargetError {
    #[error("could not open log file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
}

/// Where one of the logs is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
    Null,
    File(PathBuf),
}

impl LogTarget {
    /// Resolve the target for log `file` under the `--log-dir` value `dir`.
    ///
    /// `stdout` (or an empty value), `stderr` and `null` are special in any
    /// letter case; anything else is a directory.
    #[must_use]
    pub fn resolve(dir: &str, file: &str) -> Self {
        let dir = dir.trim();
        match dir.to_ascii_lowercase().as_str() {
            "" | "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            "null" => Self::Null,
            _ => Self::File(Path::new(dir).join(file)),
        }
    }

    /// # Errors
    /// Returns an error if a file target cannot be opened for appending.
    pub fn open(&self) -> Result<Box<dyn Write + Send>, LogTargetError> {
        Ok(match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
            Self::Null => Box::new(io::sink()),
            Self::File(path) => Box::new(open_append(path)?),
        })
    }
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
            Self::Null => f.write_str("null"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Open `path` for appending, creating it with mode 0640 on unix.
///
/// # Errors
/// Returns an error if the file cannot be created or opened.
pub fn open_append(path: &Path) -> Result<File, LogTargetError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }

    options.open(path).map_err(|source| LogTargetError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Hand `writer` to a dedicated writer thread.
///
/// Records are queued in order and never dropped; a full queue blocks the
/// caller. Dropping the guard flushes what is queued.
#[must_use]
pub fn non_blocking(writer: Box<dyn Write + Send>, name: &str) -> (NonBlocking, WorkerGuard) {
    NonBlockingBuilder::default()
        .lossy(false)
        .thread_name(&format!("krbgate-{name}-log"))
        .finish(writer)
}

/// Serializes records as one JSON object per line.
///
/// Each record reaches the writer thread as a single message, so concurrent
/// records never interleave. Dropping the value flushes pending lines.
pub struct JsonLines {
    name: &'static str,
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl JsonLines {
    #[must_use]
    pub fn new(name: &'static str, writer: Box<dyn Write + Send>) -> Self {
        let (writer, guard) = non_blocking(writer, name);
        Self {
            name,
            writer,
            _guard: guard,
        }
    }

    /// # Errors
    /// Returns an error if the target cannot be opened.
    pub fn open(name: &'static str, target: &LogTarget) -> Result<Self, LogTargetError> {
        Ok(Self::new(name, target.open()?))
    }

    /// Write one record; failures are logged and dropped.
    pub fn write<T: Serialize>(&self, record: &T) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(err) => {
                error!("{} log: could not serialize record: {}", self.name, err);
                return;
            }
        };
        line.push(b'\n');

        if let Err(err) = self.writer.clone().write_all(&line) {
            error!("{} log: write failed: {}", self.name, err);
        }
    }
}

impl std::fmt::Debug for JsonLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLines").field("name", &self.name).finish()
    }
}

impl EventSink for JsonLines {
    fn append(&self, event: Event) {
        self.write(&event);
    }
}

/// Keeps events in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl EventSink for MemorySink {
    fn append(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}
