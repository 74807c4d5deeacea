//! Transport seams and the closed transport failure taxonomy.
//!
//! Adapters around concrete bus/queue clients implement these traits and
//! translate their SDK's error shapes into [`TransportError`] variants at
//! the boundary, so the delivery path dispatches on tagged variants instead
//! of inspecting error codes.
//!
//! Clients are long-lived, externally owned, and safe for concurrent use by
//! simultaneous publish/send calls; the delivery path neither pools nor
//! locks them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::Envelope;

/// How long a queue message may wait before expiring.
///
/// `Never` is an explicit infinite sentinel the adapter must pass through to
/// its transport, not a large finite number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeToLive {
    /// The message does not expire.
    #[default]
    Never,
    /// The message expires after this long.
    For(Duration),
}

/// Failure shapes a transport adapter may report.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The destination does not exist.
    #[error("destination not found")]
    NotFound,
    /// The message was rejected for its size.
    #[error("payload too large ({size} bytes)")]
    PayloadTooLarge {
        /// Rejected payload size in bytes.
        size: usize,
    },
    /// Anything else: timeouts, connection resets, throttling.
    #[error("{message}")]
    Other {
        /// Adapter-provided description.
        message: String,
    },
}

impl TransportError {
    /// Build an `Other` failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }
}

/// Fan-out bus client: one call per batch, no batching of its own.
#[async_trait]
pub trait BusTransport: Send + Sync + std::fmt::Debug {
    /// Transmit one sealed batch of wire-ready envelopes.
    async fn send_batch(&self, envelopes: &[Envelope]) -> Result<(), TransportError>;
}

/// Point-to-point queue-service client.
#[async_trait]
pub trait QueueTransport: Send + Sync + std::fmt::Debug {
    /// Submit one serialized message to the named queue.
    ///
    /// `visibility_delay: None` means immediately visible to consumers.
    async fn send_message(
        &self,
        queue: &str,
        body: &str,
        visibility_delay: Option<Duration>,
        time_to_live: TimeToLive,
    ) -> Result<(), TransportError>;

    /// Create the named queue if it does not exist. Idempotent.
    async fn create_if_absent(&self, queue: &str) -> Result<(), TransportError>;
}
