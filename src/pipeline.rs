//! Retry-then-fallback execution wrapper for outbound transport calls.
//!
//! One pipeline instance is built per delivery path and reused for every
//! call. Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Only errors the `should_retry` predicate accepts are retried; anything
//!   else returns immediately.
//! - Backoff computes the delay before retry `n`; the sleeper applies it.
//! - Exhaustion invokes the fallback hook (if any) with the last error, then
//!   surfaces that error unchanged; the fallback is a "give up loudly"
//!   hook, not error suppression.
//! - Cancellation wins over both attempts and waits, surfacing
//!   [`DeliveryError::Cancelled`] without a further attempt.
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`; the loop is bounded, never
//!   recursive.
//! - A retry warning is emitted exactly once per wait.
//! - The fallback runs at most once per invocation.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::error::{DeliveryError, Result};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{DeliveryEvent, EventSink, TracingSink};

/// Exhaustion hook invoked with the last error before it is re-raised.
pub type Fallback = Arc<dyn Fn(&DeliveryError) + Send + Sync>;

/// Reusable retry+fallback executor for one delivery path.
#[derive(Clone)]
pub struct ResiliencePipeline {
    name: String,
    max_attempts: usize,
    backoff: Backoff,
    should_retry: Arc<dyn Fn(&DeliveryError) -> bool + Send + Sync>,
    fallback: Option<Fallback>,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ResiliencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePipeline")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("fallback", &self.fallback.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl ResiliencePipeline {
    /// Start describing a pipeline policy.
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Execute `operation` under this policy.
    ///
    /// The operation is invoked afresh for each attempt. Cancellation is
    /// checked before every attempt and races every backoff wait.
    pub async fn execute<T, Fut, Op>(
        &self,
        cancel: &CancellationToken,
        mut operation: Op,
    ) -> Result<T>
    where
        T: Send,
        Fut: Future<Output = Result<T>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        for attempt in 1..=self.max_attempts {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                outcome = operation() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => err,
            };

            if !(self.should_retry)(&err) {
                return Err(err);
            }

            if attempt == self.max_attempts {
                self.sink.record(DeliveryEvent::Exhausted {
                    pipeline: self.name.clone(),
                    attempts: attempt,
                    error: err.to_string(),
                });
                if let Some(fallback) = &self.fallback {
                    fallback(&err);
                }
                return Err(err);
            }

            let delay = self.backoff.delay(attempt);
            self.sink.record(DeliveryEvent::RetryScheduled {
                pipeline: self.name.clone(),
                attempt,
                delay,
                error: err.to_string(),
            });
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
        }

        // The loop either returns a result or exhausts on its final
        // iteration; reaching here means max_attempts was zero, which the
        // builder rejects.
        debug_assert!(false, "pipeline loop should have returned");
        Err(DeliveryError::configuration("pipeline built with zero attempts"))
    }
}

/// Policy descriptor: retry count, backoff shape, and fallback action.
pub struct PipelineBuilder {
    name: String,
    max_attempts: usize,
    backoff: Backoff,
    should_retry: Arc<dyn Fn(&DeliveryError) -> bool + Send + Sync>,
    fallback: Option<Fallback>,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn EventSink>,
}

impl PipelineBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_attempts: 3,
            backoff: Backoff::exponential(std::time::Duration::from_secs(1)),
            should_retry: Arc::new(DeliveryError::is_transient),
            fallback: None,
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(TracingSink),
        }
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay progression between attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Predicate deciding whether an error is worth another attempt.
    /// Defaults to [`DeliveryError::is_transient`].
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DeliveryError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Hook invoked once with the last error when the budget is exhausted.
    pub fn fallback<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryError) + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(hook));
        self
    }

    /// Swap the wait implementation (tests).
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Destination for retry/exhaustion events.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate and build the pipeline.
    pub fn build(self) -> Result<ResiliencePipeline> {
        if self.max_attempts == 0 {
            return Err(DeliveryError::configuration("max_attempts must be greater than zero"));
        }
        Ok(ResiliencePipeline {
            name: self.name,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            should_retry: self.should_retry,
            fallback: self.fallback,
            sleeper: self.sleeper,
            sink: self.sink,
        })
    }
}
