//! Progress events for observers of a run
//!
//! The crawler publishes `ProgressEvent`s on an unbounded channel; a CLI (or
//! any other front-end) drains the receiver. Every event is also logged
//! through `tracing` so a run without a subscriber still leaves a trace.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Severity of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        };
        write!(f, "{}", label)
    }
}

/// One observable step of a run
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub level: EventLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Sending side of the event channel
///
/// Cloned into every worker. Sending never blocks and never fails: once the
/// receiver is dropped events are only logged.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl EventSink {
    /// Creates a connected sink/receiver pair
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, level: EventLevel, message: impl Into<String>) {
        let event = ProgressEvent::new(level, message);

        match level {
            EventLevel::Success | EventLevel::Info => tracing::info!("{}", event.message),
            EventLevel::Warning => tracing::warn!("{}", event.message),
            EventLevel::Error => tracing::error!("{}", event.message),
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(EventLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(EventLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(EventLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(EventLevel::Error, message);
    }
}
