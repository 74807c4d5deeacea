#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Courier 📯
//!
//! Event and message delivery for async Rust: metadata enrichment,
//! size-bounded batching, and retry-with-fallback resilience for bus and
//! queue transports.
//!
//! ## Features
//!
//! - **Enrichment**: source, timestamp, priority, and caller-identity
//!   claims attached to every outbound event
//! - **Greedy batching** against a wire-size ceiling, order-preserving
//! - **Resilience pipeline** with linear/exponential backoff, retry
//!   warnings, and an exhaustion fallback
//! - **On-demand queue provisioning** inside the shared retry budget
//! - **Cancellation** at every blocking point via `CancellationToken`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::{BusPublisher, Event, Priority};
//! use serde::Serialize;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize)]
//! struct InvoiceCreated { invoice_id: u64 }
//!
//! impl Event for InvoiceCreated {
//!     fn event_type(&self) -> &str { "invoice.created" }
//! }
//!
//! # async fn demo(client: Arc<dyn courier::BusTransport>) -> courier::Result<()> {
//! let publisher = BusPublisher::builder()
//!     .client(client)
//!     .source("/billing/api")
//!     .build()?;
//!
//! publisher
//!     .publish(Priority::Normal, &[InvoiceCreated { invoice_id: 42 }], &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod batch;
pub mod bus;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod principal;
pub mod queue;
pub mod sleeper;
pub mod telemetry;
pub mod transport;

// Re-exports
pub use backoff::Backoff;
pub use batch::{pack, Batch, BatchLimits};
pub use bus::{BusPublisher, BusPublisherBuilder};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BusConfig, QueueConfig};
pub use envelope::{Enricher, Envelope, Event, Priority, RawEvent};
pub use error::{DeliveryError, Result};
pub use pipeline::{PipelineBuilder, ResiliencePipeline};
pub use principal::{Anonymous, Claim, Principal, PrincipalProvider, StaticPrincipal};
pub use queue::{QueueSender, QueueSenderBuilder, SendOptions};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use telemetry::{DeliveryEvent, EventSink, MemorySink, Severity, TracingSink};
pub use transport::{BusTransport, QueueTransport, TimeToLive, TransportError};
