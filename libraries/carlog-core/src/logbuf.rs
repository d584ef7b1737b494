//! Bounded in-memory log of recent pipeline messages.

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::watch;

/// Maximum retained entries; oldest are evicted first.
const MAX_LOG_ENTRIES: usize = 500;

/// Collects sync- and geocoding-related log messages for display.
///
/// Keeps a rolling buffer of the most recent entries behind a mutex and
/// publishes a snapshot through a watch channel after every append, so
/// observers receive updates without polling. Entries also go to `tracing`.
pub struct SyncLogCollector {
    buffer: Mutex<VecDeque<String>>,
    tx: watch::Sender<Vec<String>>,
}

impl SyncLogCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)),
            tx,
        }
    }

    /// Append a message.
    pub fn log(&self, tag: &str, message: &str) {
        tracing::debug!(target: "carlog", "[{tag}] {message}");
        self.push(format!("{} [{tag}] {message}", Self::timestamp()));
    }

    /// Append an error message, with its cause when available.
    pub fn log_error(&self, tag: &str, message: &str, error: Option<&dyn std::error::Error>) {
        tracing::error!(target: "carlog", "[{tag}] {message}");
        let suffix = error.map(|e| format!(" - {e}")).unwrap_or_default();
        self.push(format!(
            "{} [{tag}] ERROR: {message}{suffix}",
            Self::timestamp()
        ));
    }

    /// Subscribe to buffer snapshots. The receiver sees the current contents
    /// immediately and a fresh snapshot after every append.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<String>> {
        self.tx.subscribe()
    }

    /// Current buffer contents, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.buffer
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all retained entries.
    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
            let _ = self.tx.send(Vec::new());
        }
    }

    fn push(&self, entry: String) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_back(entry);
            while buffer.len() > MAX_LOG_ENTRIES {
                buffer.pop_front();
            }
            let _ = self.tx.send(buffer.iter().cloned().collect());
        }
    }

    fn timestamp() -> String {
        chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
    }
}

impl Default for SyncLogCollector {
    fn default() -> Self {
        Self::new()
    }
}
