//! Diagnostic logging setup and the transaction log.
//!
//! Diagnostics (startup, warnings, statistics, eviction) go through `tracing` to stderr.
//! Transaction records are written by [`TransactionLogSink`] to the configured output, one line
//! per answered request, so stdout stays a clean JSON-lines stream by default.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use chaos_server::events::{EventSink, StatsEvent, TracingSink, TransactionEvent};
use chaos_server::tracker::EvictionReport;
use tracing::{error, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::SettingsError;
use crate::settings::LogFormat;

/// Records queued for the writer thread before new ones are dropped.
pub const DEFAULT_QUEUE_DEPTH: usize = 4096;

/// Install the global subscriber. `RUST_LOG` wins over `default_directive` when set.
pub fn init_tracing(default_directive: &str) -> Result<(), SettingsError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| SettingsError::Invalid(format!("log level: {e}")))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init()
        .map_err(|e| SettingsError::Invalid(format!("logging already initialised: {e}")))
}

/// Writes transaction records as JSON lines or one-line text.
///
/// Records are rendered on the calling task and handed to a dedicated writer thread over a
/// bounded queue, so a slow output never stalls request handling. When the queue is full the
/// record is dropped and counted; the writer reports the loss once it catches up. Dropping the
/// sink flushes everything still queued.
///
/// Statistics and eviction reports are forwarded to [`TracingSink`].
pub struct TransactionLogSink {
    format: LogFormat,
    tx: Option<SyncSender<String>>,
    dropped: Arc<AtomicU64>,
    writer: Option<JoinHandle<()>>,
}

impl TransactionLogSink {
    /// Write to any sink with the default queue depth.
    pub fn new(format: LogFormat, out: Box<dyn Write + Send>) -> Result<Self, SettingsError> {
        Self::with_queue_depth(format, out, DEFAULT_QUEUE_DEPTH)
    }

    /// Write to any sink, holding at most `depth` records while the output is busy.
    pub fn with_queue_depth(
        format: LogFormat,
        out: Box<dyn Write + Send>,
        depth: usize,
    ) -> Result<Self, SettingsError> {
        let (tx, rx) = mpsc::sync_channel(depth);
        let dropped = Arc::new(AtomicU64::new(0));
        let writer = thread::Builder::new()
            .name("transaction-log".into())
            .spawn({
                let dropped = Arc::clone(&dropped);
                move || write_loop(rx, out, &dropped)
            })?;
        Ok(TransactionLogSink {
            format,
            tx: Some(tx),
            dropped,
            writer: Some(writer),
        })
    }

    /// Open `output`: `stdout`, `stderr`, or a file path opened for appending.
    pub fn open(output: &str, format: LogFormat) -> Result<Self, SettingsError> {
        let out: Box<dyn Write + Send> = match output {
            "stdout" => Box::new(io::stdout()),
            "stderr" => Box::new(io::stderr()),
            path => Box::new(OpenOptions::new().create(true).append(true).open(path)?),
        };
        Self::new(format, out)
    }

    /// Render one record without the trailing newline.
    pub fn render(&self, event: &TransactionEvent) -> String {
        match self.format {
            LogFormat::Json => match serde_json::to_string(event) {
                Ok(line) => line,
                Err(e) => format!("{{\"event\":\"ntp_request\",\"error\":\"{e}\"}}"),
            },
            LogFormat::Text => format_text(event),
        }
    }
}

impl EventSink for TransactionLogSink {
    fn transaction(&self, event: &TransactionEvent) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(self.render(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("transaction log writer has stopped");
            }
        }
    }

    fn statistics(&self, event: &StatsEvent) {
        TracingSink.statistics(event);
    }

    fn eviction(&self, report: &EvictionReport) {
        TracingSink.eviction(report);
    }
}

impl Drop for TransactionLogSink {
    fn drop(&mut self) {
        // Closing the queue ends the writer loop after it drains.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

/// Write queued lines, flushing whenever the queue runs dry.
fn write_loop(rx: Receiver<String>, out: Box<dyn Write + Send>, dropped: &AtomicU64) {
    let mut out = BufWriter::new(out);
    while let Ok(line) = rx.recv() {
        let mut result = writeln!(out, "{line}");
        while result.is_ok() {
            match rx.try_recv() {
                Ok(line) => result = writeln!(out, "{line}"),
                Err(_) => break,
            }
        }
        if let Err(e) = result.and_then(|()| out.flush()) {
            error!("failed to write transaction log: {}", e);
        }
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            warn!(
                "transaction log output too slow, dropped {} records",
                lost
            );
        }
    }
    if let Err(e) = out.flush() {
        error!("failed to flush transaction log: {}", e);
    }
}

/// `[timestamp] initial request from ip:port - offset: -93.4 sec (-1.56 min)`
pub fn format_text(event: &TransactionEvent) -> String {
    format!(
        "[{}] {} request from {}:{} - offset: {:.1} sec ({:.2} min)",
        event.timestamp,
        event.request_type.as_str(),
        event.client.ip,
        event.client.port,
        event.response.offset_seconds,
        event.response.offset_minutes
    )
}
