//! Point-to-point queue sender.
//!
//! Enriches event-shaped messages, serializes them, and submits through the
//! resilience pipeline. Two transport failures get special handling inside
//! each attempt: a missing destination is provisioned on the spot and then
//! resubmitted by the normal retry loop (shared budget, no separate policy),
//! and a size rejection fails immediately with the payload recorded for
//! diagnosis, since retries cannot shrink a message.
//!
//! Policy: exponential backoff starting at 5s, up to 3 attempts, no
//! fallback; exhaustion surfaces the last error.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::envelope::{Enricher, Envelope, Priority};
use crate::error::{DeliveryError, Result};
use crate::pipeline::ResiliencePipeline;
use crate::principal::{Anonymous, PrincipalProvider};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{DeliveryEvent, EventSink, TracingSink};
use crate::transport::{QueueTransport, TimeToLive, TransportError};

const MAX_ATTEMPTS: usize = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(5);
const PIPELINE_NAME: &str = "queue-send";

/// Per-send delivery options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// How long the message stays invisible to consumers after arrival.
    /// `None` means immediately visible.
    pub visibility_delay: Option<Duration>,
    /// Message expiry. Defaults to [`TimeToLive::Never`].
    pub time_to_live: TimeToLive,
}

/// Sends enriched messages to named queues, provisioning them on demand.
#[derive(Debug)]
pub struct QueueSender {
    client: Arc<dyn QueueTransport>,
    enricher: Enricher,
    pipeline: ResiliencePipeline,
    sink: Arc<dyn EventSink>,
}

impl QueueSender {
    /// Start assembling a sender.
    pub fn builder() -> QueueSenderBuilder {
        QueueSenderBuilder::new()
    }

    /// Enrich and send one envelope.
    pub async fn send(
        &self,
        queue: &str,
        envelope: Envelope,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let enriched = self.enricher.enrich(envelope);
        let body = serialize_body(&enriched)?;
        self.submit(queue, body, options, cancel).await
    }

    /// Send a sequence of envelopes one at a time, in order. The first
    /// terminal failure stops the iteration.
    pub async fn send_all(
        &self,
        queue: &str,
        envelopes: Vec<Envelope>,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for envelope in envelopes {
            self.send(queue, envelope, options, cancel).await?;
        }
        Ok(())
    }

    /// Build an event-shaped message from a typed payload, enrich it, and
    /// send it.
    pub async fn send_event<T: Serialize>(
        &self,
        queue: &str,
        event_type: &str,
        data: &T,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let envelope = self.enricher.envelope_from_parts(event_type, data, Priority::Normal)?;
        let body = serialize_body(&envelope)?;
        self.submit(queue, body, options, cancel).await
    }

    /// Send an arbitrary payload serialized as-is, with no enrichment.
    pub async fn send_payload<T: Serialize>(
        &self,
        queue: &str,
        payload: &T,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let body = serde_json::to_string(payload)
            .map_err(|err| DeliveryError::caller(format!("payload is not serializable: {err}")))?;
        self.submit(queue, body, options, cancel).await
    }

    async fn submit(
        &self,
        queue: &str,
        body: String,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if queue.trim().is_empty() {
            return Err(DeliveryError::caller(
                "queue name cannot be empty; check the configuration",
            ));
        }

        let queue: Arc<str> = queue.into();
        let body: Arc<str> = body.into();
        let client = self.client.clone();
        let sink = self.sink.clone();

        self.pipeline
            .execute(cancel, move || {
                let client = client.clone();
                let queue = queue.clone();
                let body = body.clone();
                let sink = sink.clone();
                async move {
                    match client
                        .send_message(&queue, &body, options.visibility_delay, options.time_to_live)
                        .await
                    {
                        Ok(()) => Ok(()),
                        Err(TransportError::NotFound) => {
                            // Provision, then surface as retryable so the
                            // shared budget resubmits the message.
                            client
                                .create_if_absent(&queue)
                                .await
                                .map_err(|err| DeliveryError::transport(err.to_string()))?;
                            sink.record(DeliveryEvent::DestinationProvisioned {
                                queue: queue.to_string(),
                            });
                            Err(DeliveryError::DestinationAbsent { queue: queue.to_string() })
                        }
                        Err(TransportError::PayloadTooLarge { size }) => {
                            sink.record(DeliveryEvent::OversizedPayload {
                                queue: queue.to_string(),
                                payload: body.to_string(),
                            });
                            Err(DeliveryError::PayloadTooLarge {
                                queue: queue.to_string(),
                                size,
                            })
                        }
                        Err(other) => Err(DeliveryError::transport(other.to_string())),
                    }
                }
            })
            .await
    }
}

fn serialize_body(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope)
        .map_err(|err| DeliveryError::caller(format!("message is not serializable: {err}")))
}

/// Builder wiring transport, identity, and timing into a sender.
pub struct QueueSenderBuilder {
    client: Option<Arc<dyn QueueTransport>>,
    config: Option<QueueConfig>,
    default_source: Option<String>,
    principal: Arc<dyn PrincipalProvider>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn EventSink>,
}

impl QueueSenderBuilder {
    fn new() -> Self {
        Self {
            client: None,
            config: None,
            default_source: None,
            principal: Arc::new(Anonymous),
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(TracingSink),
        }
    }

    /// The queue-service transport client. Required.
    pub fn client(mut self, client: Arc<dyn QueueTransport>) -> Self {
        self.client = Some(client);
        self
    }

    /// Full queue configuration; validated at build time. Its
    /// `default_source` becomes the default envelope source.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Default envelope source, for callers wiring the transport client
    /// themselves.
    pub fn default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = Some(source.into());
        self
    }

    /// Caller identity source. Defaults to anonymous.
    pub fn principal(mut self, principal: Arc<dyn PrincipalProvider>) -> Self {
        self.principal = principal;
        self
    }

    /// Wall-clock source for envelope timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wait implementation for backoff delays (tests).
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Destination for retry/provisioning/oversize events.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate configuration and assemble the sender.
    pub fn build(self) -> Result<QueueSender> {
        let client = self
            .client
            .ok_or_else(|| DeliveryError::configuration("queue transport client must be set"))?;

        let source = match (self.config, self.default_source) {
            (Some(config), _) => {
                config.validate()?;
                config.default_source
            }
            (None, Some(source)) => {
                if source.trim().is_empty() {
                    return Err(DeliveryError::configuration("default_source must be set"));
                }
                source
            }
            (None, None) => {
                return Err(DeliveryError::configuration("default_source must be set"))
            }
        };

        let sink = self.sink;
        let pipeline = ResiliencePipeline::builder(PIPELINE_NAME)
            .max_attempts(MAX_ATTEMPTS)
            .backoff(Backoff::exponential(BACKOFF_BASE))
            .sleeper(self.sleeper)
            .sink(sink.clone())
            .build()?;

        Ok(QueueSender {
            client,
            enricher: Enricher::new(source, self.clock, self.principal),
            pipeline,
            sink,
        })
    }
}
