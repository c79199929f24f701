use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::job_engine::types::AppEvent;

/// Default maximum number of activity entries to keep in memory
pub const DEFAULT_MAX_LOG_LINES: usize = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub job_id: Option<String>,
}

/// Activity log of the current session.
///
/// Every entry is kept in a bounded ring and, when a sender is attached,
/// forwarded to the event loop as [`AppEvent::Log`].
pub struct LogManager {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_lines: usize,
    events: Option<UnboundedSender<AppEvent>>,
}

impl LogManager {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_lines.min(1024)))),
            max_lines,
            events: None,
        }
    }

    pub fn with_events(max_lines: usize, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new(max_lines)
        }
    }

    pub fn log(&self, level: LogLevel, message: &str, job_id: Option<String>) {
        match level {
            LogLevel::Info => tracing::info!(job_id = ?job_id, "{message}"),
            LogLevel::Warning => tracing::warn!(job_id = ?job_id, "{message}"),
            LogLevel::Error => tracing::error!(job_id = ?job_id, "{message}"),
        }

        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            message: message.to_string(),
            job_id,
        };

        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry.clone());
            while entries.len() > self.max_lines {
                entries.pop_front();
            }
        }

        if let Some(events) = &self.events {
            // The loop may already be gone during shutdown.
            let _ = events.send(AppEvent::Log(entry));
        }
    }

    pub fn info(&self, message: &str, job_id: Option<String>) {
        self.log(LogLevel::Info, message, job_id);
    }

    pub fn warn(&self, message: &str, job_id: Option<String>) {
        self.log(LogLevel::Warning, message, job_id);
    }

    pub fn error(&self, message: &str, job_id: Option<String>) {
        self.log(LogLevel::Error, message, job_id);
    }

    pub fn get_logs(&self, job_id: Option<&str>) -> Vec<LogEntry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        match job_id {
            Some(id) => entries
                .iter()
                .filter(|e| e.job_id.as_deref() == Some(id))
                .cloned()
                .collect(),
            None => entries.iter().cloned().collect(),
        }
    }
}

/// Installs the `tracing` subscriber used by the binaries.
/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
