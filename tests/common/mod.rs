#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use courier::{BusTransport, Envelope, Event, QueueTransport, TimeToLive, TransportError};
use serde::Serialize;

/// Bus transport that fails a fixed number of sends before succeeding and
/// records every batch that gets through.
#[derive(Debug, Default)]
pub struct FlakyBus {
    failures_remaining: AtomicUsize,
    pub calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<Envelope>>>,
}

impl FlakyBus {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self { failures_remaining: AtomicUsize::new(times), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_batches(&self) -> Vec<Vec<Envelope>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BusTransport for FlakyBus {
    async fn send_batch(&self, envelopes: &[Envelope]) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::other("bus unavailable"));
        }
        self.batches.lock().unwrap().push(envelopes.to_vec());
        Ok(())
    }
}

/// Queue transport driven by a script of failures; once the script runs out
/// every send succeeds.
#[derive(Debug, Default)]
pub struct ScriptedQueue {
    script: Mutex<VecDeque<TransportError>>,
    pub sends: AtomicUsize,
    pub creates: AtomicUsize,
    pub bodies: Mutex<Vec<String>>,
}

impl ScriptedQueue {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing_with(failures: Vec<TransportError>) -> Self {
        Self { script: Mutex::new(failures.into()), ..Self::default() }
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for ScriptedQueue {
    async fn send_message(
        &self,
        _queue: &str,
        body: &str,
        _visibility_delay: Option<Duration>,
        _time_to_live: TimeToLive,
    ) -> Result<(), TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => {
                self.bodies.lock().unwrap().push(body.to_string());
                Ok(())
            }
        }
    }

    async fn create_if_absent(&self, _queue: &str) -> Result<(), TransportError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Event with a numbered payload, for order assertions.
#[derive(Serialize)]
pub struct Numbered {
    pub n: usize,
}

impl Event for Numbered {
    fn event_type(&self) -> &str {
        "numbered"
    }
}

/// Event padded so its enriched envelope estimates to an exact wire size
/// under the default limits (no claims attached).
#[derive(Serialize)]
pub struct SizedEvent {
    pub fill: String,
}

impl Event for SizedEvent {
    fn event_type(&self) -> &str {
        "sized"
    }
}

impl SizedEvent {
    /// The serialized payload is `{"fill":"<n a's>"}` (n + 11 bytes); with
    /// 21 bytes of priority metadata and 300 bytes of overhead the estimate
    /// lands exactly on `estimated`.
    pub fn of_estimated_size(estimated: usize) -> Self {
        Self { fill: "a".repeat(estimated - 332) }
    }
}

pub fn numbered(count: usize) -> Vec<Numbered> {
    (1..=count).map(|n| Numbered { n }).collect()
}
