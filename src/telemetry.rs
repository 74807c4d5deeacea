//! Structured observability events for the delivery path.
//!
//! Policies and senders describe what happened as [`DeliveryEvent`] values
//! and hand them to an [`EventSink`]. The default [`TracingSink`] maps each
//! event to a `tracing` record at its severity; [`MemorySink`] collects
//! events for assertions in tests.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Severity a sink should use when recording an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine progress worth surfacing.
    Info,
    /// Degraded but recovering behavior.
    Warning,
    /// Terminal failure handling.
    Error,
}

/// Events emitted while delivering events and messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A retry is about to happen after a failed attempt.
    RetryScheduled {
        /// Name of the pipeline retrying.
        pipeline: String,
        /// The retry number (1-based).
        attempt: usize,
        /// Backoff delay before the retry.
        delay: Duration,
        /// The failure that triggered the retry.
        error: String,
    },
    /// All attempts failed.
    Exhausted {
        /// Name of the exhausted pipeline.
        pipeline: String,
        /// Total attempts made.
        attempts: usize,
        /// The final failure.
        error: String,
    },
    /// The exhaustion fallback fired before re-raising.
    FallbackInvoked {
        /// Name of the pipeline giving up.
        pipeline: String,
        /// The error being re-raised.
        error: String,
    },
    /// A queue message was rejected for its size. Carries the payload so
    /// the failing message can be diagnosed from the logs.
    OversizedPayload {
        /// Destination queue name.
        queue: String,
        /// The serialized message body that was rejected.
        payload: String,
    },
    /// A missing destination queue was created on demand.
    DestinationProvisioned {
        /// Name of the queue that was created.
        queue: String,
    },
}

impl DeliveryEvent {
    /// Severity this event is recorded at.
    pub fn severity(&self) -> Severity {
        match self {
            Self::RetryScheduled { .. } | Self::Exhausted { .. } => Severity::Warning,
            Self::FallbackInvoked { .. } | Self::OversizedPayload { .. } => Severity::Error,
            Self::DestinationProvisioned { .. } => Severity::Info,
        }
    }
}

/// Destination for delivery events.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Record one event.
    fn record(&self, event: DeliveryEvent);
}

/// Default sink: forwards events to `tracing` at their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: DeliveryEvent) {
        match &event {
            DeliveryEvent::RetryScheduled { pipeline, attempt, delay, error } => {
                tracing::warn!(
                    pipeline = %pipeline,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "delivery attempt failed, retrying"
                );
            }
            DeliveryEvent::Exhausted { pipeline, attempts, error } => {
                tracing::warn!(pipeline = %pipeline, attempts, %error, "retry budget exhausted");
            }
            DeliveryEvent::FallbackInvoked { pipeline, error } => {
                tracing::error!(
                    pipeline = %pipeline,
                    %error,
                    "failed to deliver after multiple retries"
                );
            }
            DeliveryEvent::OversizedPayload { queue, payload } => {
                tracing::error!(queue = %queue, %payload, "message rejected as too large");
            }
            DeliveryEvent::DestinationProvisioned { queue } => {
                tracing::info!(queue = %queue, "created missing destination queue");
            }
        }
    }
}

/// Test sink that stores every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DeliveryEvent>>>,
}

impl MemorySink {
    /// New empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in order.
    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Recorded events at the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<DeliveryEvent> {
        self.events().into_iter().filter(|event| event.severity() == severity).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: DeliveryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
