//! Log sink: console + size-rotating file.
//!
//! [`LogContext`] owns the tracing dispatcher and the background writer that
//! drains file records off the async runtime. Named [`Logger`]s are handed
//! out from it, one per running client, and carry the account identifier
//! that ends up in the `logger name` column of the file:
//!
//! ```text
//! 2024-05-01 12:00:00,123 - 80351110224678912 - INFO - Message <...> was sent with content "hi".
//! ```

use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{info, Dispatch, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::{Error, Result};

/// Target used for event records so they can be filtered separately
/// (`RUST_LOG=complete_logger::records=info`).
pub const RECORD_TARGET: &str = "complete_logger::records";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where and how records are written.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub directory: PathBuf,
    pub file_name: String,
    /// Rotate once the file would grow past this many bytes. `0` disables
    /// rotation.
    pub max_bytes: u64,
    /// Number of rotated files (`<file>.1` .. `<file>.N`) to keep.
    pub max_backups: usize,
    /// `EnvFilter` directive, e.g. `info` or `complete_logger=debug`.
    pub level: String,
    pub console: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "complogger.log".to_string(),
            max_bytes: 1_000_000,
            max_backups: 5,
            level: "info".to_string(),
            console: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

// ---------------------------------------------------------------------------
// Rotating file writer
// ---------------------------------------------------------------------------

/// A file that is rolled over to `<path>.1` (shifting older backups up)
/// before a write would push it past `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_backups: usize,
}

impl RotatingFile {
    /// Open (or create) `path` in append mode, creating parent directories.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            written,
            max_bytes,
            max_backups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.<index>`
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn should_rollover(&self, incoming: usize) -> bool {
        // An oversized record still lands in an empty file.
        self.max_bytes > 0 && self.written > 0 && self.written + incoming as u64 > self.max_bytes
    }

    fn rollover(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups > 0 {
            for index in (1..self.max_backups).rev() {
                let src = self.backup_path(index);
                if src.exists() {
                    let dst = self.backup_path(index + 1);
                    if dst.exists() {
                        fs::remove_file(&dst)?;
                    }
                    fs::rename(&src, &dst)?;
                }
            }
            let first = self.backup_path(1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            fs::rename(&self.path, &first)?;
        }

        // With no backups configured the current file is simply truncated.
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rollover(buf.len()) {
            self.rollover()?;
        }
        // Whole records only, so a line never straddles two files.
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

// ---------------------------------------------------------------------------
// Line format
// ---------------------------------------------------------------------------

/// `timestamp - logger name - LEVEL - message` lines.
///
/// The logger name comes from a `logger` field on the event, falling back to
/// the event target. Any other fields are appended as `key=value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let name = visitor.logger.as_deref().unwrap_or(metadata.target());
        writeln!(
            writer,
            "{} - {} - {} - {}{}",
            Local::now().format(TIMESTAMP_FORMAT),
            name,
            metadata.level(),
            visitor.message,
            visitor.fields
        )
    }
}

#[derive(Default)]
struct LineVisitor {
    logger: Option<String>,
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "logger" => self.logger = Some(value.to_string()),
            "message" => self.message.push_str(value),
            name => {
                let _ = write!(self.fields, " {}={}", name, value);
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "logger" => self.logger = Some(format!("{:?}", value)),
            "message" => {
                let _ = write!(self.message, "{:?}", value);
            }
            name => {
                let _ = write!(self.fields, " {}={:?}", name, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// A named handle onto a [`LogContext`]'s sink.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    dispatch: Dispatch,
}

impl Logger {
    pub fn new(name: impl Into<String>, dispatch: Dispatch) -> Self {
        Self {
            name: Arc::from(name.into()),
            dispatch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one INFO record attributed to this logger.
    pub fn info(&self, message: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            info!(target: RECORD_TARGET, logger = %self.name, "{}", message);
        });
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// LogContext
// ---------------------------------------------------------------------------

/// The process's logging sink. Dropping it flushes outstanding file records
/// and stops the writer thread.
pub struct LogContext {
    dispatch: Dispatch,
    _guard: WorkerGuard,
}

impl LogContext {
    /// Build the sink without installing it globally.
    pub fn build(config: &LogConfig) -> Result<Self> {
        let filter = EnvFilter::try_new(&config.level)
            .map_err(|e| Error::Config(format!("invalid log level {:?}: {}", config.level, e)))?;

        let file = RotatingFile::open(config.file_path(), config.max_bytes, config.max_backups)?;
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("complogger-log-writer")
            .finish(file);

        let console = config.console.then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(config.ansi)
                .with_target(true)
        });

        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(console)
            .with(file_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            _guard: guard,
        })
    }

    /// Build the sink and make it the global default, so `tracing` macros
    /// outside any [`Logger`] land in it too.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let context = Self::build(config)?;
        tracing::dispatcher::set_global_default(context.dispatch.clone())
            .map_err(|e| Error::Config(format!("logging already initialised: {}", e)))?;
        Ok(context)
    }

    /// A logger named `name` writing to this sink.
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        Logger::new(name, self.dispatch.clone())
    }
}

// ---------------------------------------------------------------------------
// Test capture
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Dispatch;
    use tracing_subscriber::fmt::MakeWriter;

    use super::{LineFormat, Logger};

    /// In-memory sink collecting formatted lines.
    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// The single record written so far; panics otherwise.
        pub fn only_line(&self) -> String {
            let lines = self.lines();
            assert_eq!(lines.len(), 1, "expected exactly one record, got {:?}", lines);
            lines.into_iter().next().unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    pub fn dispatch() -> (Dispatch, Captured) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .event_format(LineFormat)
            .with_writer(captured.clone())
            .finish();
        (Dispatch::new(subscriber), captured)
    }

    pub fn logger(name: &str) -> (Logger, Captured) {
        let (dispatch, captured) = dispatch();
        (Logger::new(name, dispatch), captured)
    }
}
