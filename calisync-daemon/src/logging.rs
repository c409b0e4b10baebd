//! Line-oriented logging: `"{timestamp} - {message}"` on stdout, teed into
//! the sync log file while a cycle scope is open.
//!
//! The file handle lives in a shared [`LogFileSlot`]. [`CycleLog::open`]
//! fills the slot and returns a [`CycleLogGuard`]; dropping the guard
//! empties it, so the file is closed at cycle end on every exit path.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

use crate::log_rotation;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event format producing `2024-05-01 12:00:00 - message key=value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} - ", Local::now().format(TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Shared, optionally-open log file.
#[derive(Debug, Clone, Default)]
pub struct LogFileSlot(Arc<Mutex<Option<File>>>);

impl LogFileSlot {
    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }
}

/// `MakeWriter` that writes every formatted line to a console writer and,
/// when the slot holds a file, appends it there too.
#[derive(Debug, Clone)]
pub struct TeeMakeWriter<C> {
    console: C,
    slot: LogFileSlot,
}

impl<C> TeeMakeWriter<C> {
    pub fn new(console: C, slot: LogFileSlot) -> Self {
        Self { console, slot }
    }
}

impl TeeMakeWriter<fn() -> io::Stdout> {
    pub fn stdout(slot: LogFileSlot) -> Self {
        Self::new(io::stdout, slot)
    }
}

impl<'a, C> MakeWriter<'a> for TeeMakeWriter<C>
where
    C: MakeWriter<'a>,
{
    type Writer = TeeWriter<'a, C::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            console: self.console.make_writer(),
            slot: &self.slot,
        }
    }
}

pub struct TeeWriter<'a, W> {
    console: W,
    slot: &'a LogFileSlot,
}

impl<W: Write> Write for TeeWriter<'_, W> {
    /// Both destinations are always attempted; the write only fails when
    /// neither of them took the line.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let console = self.console.write_all(buf);
        let file_written = match self.slot.lock().as_mut() {
            Some(file) => match file.write_all(buf) {
                Ok(()) => true,
                Err(err) => {
                    eprintln!("Failed to write to log file: {err}");
                    false
                }
            },
            None => false,
        };
        match console {
            Ok(()) => Ok(buf.len()),
            Err(err) if file_written => {
                eprintln!("Failed to write to console: {err}");
                Ok(buf.len())
            }
            Err(err) => Err(err),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.slot.lock().as_mut() {
            let _ = file.flush();
        }
        self.console.flush()
    }
}

/// Per-cycle log file scope.
#[derive(Debug, Clone)]
pub struct CycleLog {
    path: PathBuf,
    slot: LogFileSlot,
}

impl CycleLog {
    pub fn new(path: impl Into<PathBuf>, slot: LogFileSlot) -> Self {
        Self {
            path: path.into(),
            slot,
        }
    }

    /// Rotate the file if it has grown too large, then open it for append.
    ///
    /// An open failure is logged; the cycle still runs with console-only
    /// output.
    pub fn open(&self) -> CycleLogGuard {
        log_rotation::rotate_log(&self.path);
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => *self.slot.lock() = Some(file),
            Err(err) => tracing::warn!("Failed to open log file: {err}"),
        }
        CycleLogGuard {
            slot: self.slot.clone(),
        }
    }
}

/// Closes the cycle's log file when dropped.
#[must_use = "the log file closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CycleLogGuard {
    slot: LogFileSlot,
}

impl Drop for CycleLogGuard {
    fn drop(&mut self) {
        let file = self.slot.lock().take();
        if let Some(mut file) = file {
            if let Err(err) = file.flush() {
                eprintln!("Failed to close log file: {err}");
            }
        }
    }
}

/// Install the process-wide subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init(slot: LogFileSlot) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(LineFormat)
        .with_writer(TeeMakeWriter::stdout(slot))
        .try_init();
}
