//! Fan-out bus publisher.
//!
//! Drives enrichment, batching, and the resilience pipeline to deliver
//! events to the bus. Batches are sent strictly in sealed order, one
//! transport call per batch, and batch N+1 only goes out after batch N's
//! pipeline completes, so the bus observes events in call order.
//! Terminal failure of one batch aborts the
//! remainder of the call.
//!
//! Policy: linear backoff of 2s, up to 5 attempts, then a fallback that
//! records a critical-level event and re-raises the last error.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::batch::{pack, BatchLimits};
use crate::clock::{Clock, SystemClock};
use crate::config::BusConfig;
use crate::envelope::{Enricher, Envelope, Event, Priority};
use crate::error::{DeliveryError, Result};
use crate::pipeline::ResiliencePipeline;
use crate::principal::{Anonymous, PrincipalProvider};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{DeliveryEvent, EventSink, TracingSink};
use crate::transport::BusTransport;

const MAX_ATTEMPTS: usize = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const PIPELINE_NAME: &str = "bus-publish";

/// Publishes enriched, batched events to the fan-out bus.
#[derive(Debug)]
pub struct BusPublisher {
    client: Option<Arc<dyn BusTransport>>,
    enricher: Enricher,
    limits: BatchLimits,
    pipeline: ResiliencePipeline,
}

impl BusPublisher {
    /// Start assembling a publisher.
    pub fn builder() -> BusPublisherBuilder {
        BusPublisherBuilder::new()
    }

    /// Publish events at `Normal` priority.
    pub async fn publish_normal<E: Event>(
        &self,
        events: &[E],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.publish(Priority::Normal, events, cancel).await
    }

    /// Publish events at the given priority.
    ///
    /// An empty event list is a no-op. Each event is enriched, packed into
    /// size-bounded batches, and each batch is sent through the resilience
    /// pipeline in sealed order.
    pub async fn publish<E: Event>(
        &self,
        priority: Priority,
        events: &[E],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let client = self.client.clone().ok_or(DeliveryError::NotConfigured)?;

        let mut envelopes = Vec::with_capacity(events.len());
        for event in events {
            envelopes.push(self.enricher.envelope_for(event, priority)?);
        }

        for batch in pack(envelopes, &self.limits) {
            let envelopes: Arc<[Envelope]> = batch.into_envelopes().into();
            self.pipeline
                .execute(cancel, || {
                    let client = client.clone();
                    let envelopes = envelopes.clone();
                    async move {
                        client
                            .send_batch(&envelopes)
                            .await
                            .map_err(|err| DeliveryError::transport(err.to_string()))
                    }
                })
                .await?;
        }
        Ok(())
    }
}

/// Builder wiring transport, identity, and timing into a publisher.
pub struct BusPublisherBuilder {
    client: Option<Arc<dyn BusTransport>>,
    config: Option<BusConfig>,
    source: Option<String>,
    principal: Arc<dyn PrincipalProvider>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn EventSink>,
    limits: BatchLimits,
}

impl BusPublisherBuilder {
    fn new() -> Self {
        Self {
            client: None,
            config: None,
            source: None,
            principal: Arc::new(Anonymous),
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(TracingSink),
            limits: BatchLimits::default(),
        }
    }

    /// The bus transport client. Leaving it unset builds a publisher whose
    /// `publish` fails with [`DeliveryError::NotConfigured`].
    pub fn client(mut self, client: Arc<dyn BusTransport>) -> Self {
        self.client = Some(client);
        self
    }

    /// Full bus configuration; validated at build time. Its `source`
    /// becomes the default envelope source.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Default envelope source, for callers wiring the transport client
    /// themselves.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
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

    /// Destination for retry/fallback events.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Batching tunables.
    pub fn limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate configuration and assemble the publisher.
    pub fn build(self) -> Result<BusPublisher> {
        let source = match (self.config, self.source) {
            (Some(config), _) => {
                config.validate()?;
                config.source
            }
            (None, Some(source)) => {
                if source.trim().is_empty() {
                    return Err(DeliveryError::configuration("source must be set"));
                }
                source
            }
            (None, None) => return Err(DeliveryError::configuration("source must be set")),
        };

        let sink = self.sink;
        let fallback_sink = sink.clone();
        let pipeline = ResiliencePipeline::builder(PIPELINE_NAME)
            .max_attempts(MAX_ATTEMPTS)
            .backoff(Backoff::linear(BACKOFF_BASE))
            .sleeper(self.sleeper)
            .sink(sink)
            .fallback(move |err| {
                fallback_sink.record(DeliveryEvent::FallbackInvoked {
                    pipeline: PIPELINE_NAME.to_string(),
                    error: err.to_string(),
                });
            })
            .build()?;

        Ok(BusPublisher {
            client: self.client,
            enricher: Enricher::new(source, self.clock, self.principal),
            limits: self.limits,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::InstantSleeper;
    use async_trait::async_trait;
    use serde::Serialize;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingBus {
        batches: Mutex<Vec<Vec<Envelope>>>,
    }

    #[async_trait]
    impl BusTransport for RecordingBus {
        async fn send_batch(
            &self,
            envelopes: &[Envelope],
        ) -> std::result::Result<(), crate::transport::TransportError> {
            self.batches.lock().unwrap().push(envelopes.to_vec());
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct Ping {
        n: u32,
    }

    impl Event for Ping {
        fn event_type(&self) -> &str {
            "ping"
        }
    }

    fn publisher_with(client: Arc<RecordingBus>) -> BusPublisher {
        BusPublisher::builder()
            .client(client)
            .source("/billing/api")
            .sleeper(Arc::new(InstantSleeper))
            .build()
            .expect("valid publisher")
    }

    #[tokio::test]
    async fn empty_event_list_is_a_no_op() {
        let client = Arc::new(RecordingBus::default());
        let publisher = publisher_with(client.clone());

        let events: Vec<Ping> = Vec::new();
        publisher
            .publish(Priority::Normal, &events, &CancellationToken::new())
            .await
            .unwrap();

        assert!(client.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_client_fails_fast() {
        let publisher = BusPublisher::builder().source("/billing/api").build().unwrap();

        let result = publisher
            .publish(Priority::Normal, &[Ping { n: 1 }], &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DeliveryError::NotConfigured)));
    }

    #[tokio::test]
    async fn events_are_enriched_and_sent_in_order() {
        let client = Arc::new(RecordingBus::default());
        let publisher = publisher_with(client.clone());

        let events = [Ping { n: 1 }, Ping { n: 2 }, Ping { n: 3 }];
        publisher.publish(Priority::High, &events, &CancellationToken::new()).await.unwrap();

        let batches = client.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let sent = &batches[0];
        assert_eq!(sent.len(), 3);
        for (index, envelope) in sent.iter().enumerate() {
            assert_eq!(envelope.data["n"], (index as u64 + 1));
            assert_eq!(envelope.priority, Priority::High);
            assert_eq!(envelope.source, "/billing/api");
            assert!(envelope.time.is_some());
        }
    }

    #[test]
    fn builder_rejects_missing_source() {
        assert!(matches!(
            BusPublisher::builder().build(),
            Err(DeliveryError::Configuration { .. })
        ));
        assert!(matches!(
            BusPublisher::builder().source("  ").build(),
            Err(DeliveryError::Configuration { .. })
        ));
    }

    #[test]
    fn builder_takes_source_from_validated_config() {
        let publisher = BusPublisher::builder()
            .config(BusConfig {
                endpoint: "https://bus.example.net".into(),
                access_key: "key".into(),
                source: "/billing/api".into(),
            })
            .build();
        assert!(publisher.is_ok());

        let invalid = BusPublisher::builder()
            .config(BusConfig {
                endpoint: String::new(),
                access_key: "key".into(),
                source: "/billing/api".into(),
            })
            .build();
        assert!(matches!(invalid, Err(DeliveryError::Configuration { .. })));
    }
}
