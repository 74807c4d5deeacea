//! Error taxonomy for the delivery path.
//!
//! Every failure that can surface from a publish or send call is one of the
//! closed set of variants below. Transport adapters translate their own error
//! shapes into this taxonomy before anything reaches the resilience pipeline,
//! so retry decisions are a variant check, not error-string sniffing.
//!
//! Invariants:
//! - `is_transient` is the single source of truth for retryability.
//! - `Cancelled` is never retried and never wrapped.
//! - Terminal errors always reach the caller; nothing in the delivery path
//!   swallows them.

use thiserror::Error;

/// Result alias used throughout the delivery path.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Unified error type for all delivery operations.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Required configuration is missing or empty. Fatal at startup.
    #[error("configuration error: {message}")]
    Configuration {
        /// Which setting failed validation and why.
        message: String,
    },

    /// The transport client was never wired up. Fatal at call time.
    #[error("bus transport is not configured; wire a client into the publisher before calling publish")]
    NotConfigured,

    /// The caller passed an invalid argument. Fatal immediately.
    #[error("invalid argument: {message}")]
    Caller {
        /// What the caller got wrong.
        message: String,
    },

    /// A transient transport failure. Retried per policy, then escalated.
    #[error("transport failure: {message}")]
    Transport {
        /// Adapter-provided failure description.
        message: String,
    },

    /// The destination queue does not exist yet. Self-healing via
    /// provisioning inside the normal retry loop.
    #[error("destination queue '{queue}' does not exist")]
    DestinationAbsent {
        /// Name of the missing queue.
        queue: String,
    },

    /// The transport rejected the message for its size. Fatal regardless of
    /// remaining retry budget.
    #[error("payload of {size} bytes rejected as too large for queue '{queue}'")]
    PayloadTooLarge {
        /// Destination queue name.
        queue: String,
        /// Serialized payload size in bytes.
        size: usize,
    },

    /// Cancellation was observed at a blocking point.
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Build a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Build a `Caller` error.
    pub fn caller(message: impl Into<String>) -> Self {
        Self::Caller { message: message.into() }
    }

    /// Build a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Whether a retry could plausibly change the outcome.
    ///
    /// `Transport` failures are transient by definition; `DestinationAbsent`
    /// is transient because provisioning happens between attempts. Everything
    /// else is either a caller/configuration bug or a condition retries
    /// cannot fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::DestinationAbsent { .. })
    }

    /// Whether this error is a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
