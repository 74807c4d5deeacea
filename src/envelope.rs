//! Events, envelopes, and enrichment.
//!
//! An [`Event`] is what application code hands over: a type tag plus a
//! serializable payload. An [`Envelope`] is the transmission-ready form:
//! the payload enriched with id, source, timestamp, priority, and optional
//! caller-identity metadata.
//!
//! Enrichment never overwrites: a timestamp or source that is already set
//! survives re-enrichment unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DeliveryError, Result};
use crate::principal::PrincipalProvider;

/// Delivery priority, tagged onto every envelope by name so consumers can
/// filter or dead-letter on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Background work.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Latency-sensitive.
    High,
}

impl Priority {
    /// The name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
        }
    }
}

/// A domain event ready for publication.
///
/// The implementing type is the payload; it is serialized as-is into the
/// envelope's `data` field.
pub trait Event: Serialize {
    /// Stable string identifier for this event's type.
    fn event_type(&self) -> &str;
}

/// An event whose payload was serialized ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event type tag.
    pub event_type: String,
    /// Pre-serialized payload.
    pub data: serde_json::Value,
}

impl RawEvent {
    /// Wrap a pre-serialized payload.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self { event_type: event_type.into(), data }
    }
}

impl Serialize for RawEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl Event for RawEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// A transmission-ready event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique envelope id.
    pub id: Uuid,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Identifier of the publishing application. Empty means "not set yet";
    /// enrichment fills it with the configured default.
    #[serde(default)]
    pub source: String,
    /// Creation timestamp. Set once by enrichment if absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time: Option<DateTime<Utc>>,
    /// Delivery priority, serialized by name.
    #[serde(default)]
    pub priority: Priority,
    /// Caller-identity claims as a compact JSON string; absent for
    /// anonymous callers.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub claims: Option<String>,
    /// The event payload.
    pub data: serde_json::Value,
}

impl Envelope {
    /// New envelope around a payload, with nothing enriched yet.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source: String::new(),
            time: None,
            priority: Priority::default(),
            claims: None,
            data,
        }
    }

    /// Set the source explicitly.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the creation timestamp explicitly.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// The metadata pairs transmitted alongside the payload. Used for wire
    /// size estimation.
    pub fn wire_attributes(&self) -> Vec<(&'static str, &str)> {
        let mut attributes = vec![("priority", self.priority.as_str())];
        if let Some(claims) = &self.claims {
            attributes.push(("claims", claims.as_str()));
        }
        attributes
    }
}

/// Attaches priority, source, timestamp, and caller-identity metadata to
/// outbound events.
#[derive(Debug, Clone)]
pub struct Enricher {
    default_source: String,
    clock: Arc<dyn Clock>,
    principal: Arc<dyn PrincipalProvider>,
}

impl Enricher {
    /// Enricher using the given default source, clock, and identity source.
    pub fn new(
        default_source: impl Into<String>,
        clock: Arc<dyn Clock>,
        principal: Arc<dyn PrincipalProvider>,
    ) -> Self {
        Self { default_source: default_source.into(), clock, principal }
    }

    /// Fill in whatever the envelope is missing: timestamp if absent, source
    /// if empty, claims if a caller identity is established. Populated
    /// fields pass through untouched.
    pub fn enrich(&self, mut envelope: Envelope) -> Envelope {
        if envelope.time.is_none() {
            envelope.time = Some(self.clock.now());
        }
        if envelope.source.trim().is_empty() {
            envelope.source = self.default_source.clone();
        }
        if let Some(principal) = self.principal.current() {
            envelope.claims = Some(principal.claims_json());
        }
        envelope
    }

    /// Enriched envelope for a typed event at the given priority.
    ///
    /// Serialization failure of the payload is a caller bug, not a
    /// transient fault.
    pub fn envelope_for<E: Event>(&self, event: &E, priority: Priority) -> Result<Envelope> {
        self.envelope_from_parts(event.event_type(), event, priority)
    }

    /// Enriched envelope from a raw (type, payload) pair.
    pub fn envelope_from_parts<T: Serialize>(
        &self,
        event_type: &str,
        data: &T,
        priority: Priority,
    ) -> Result<Envelope> {
        let data = serde_json::to_value(data).map_err(|err| {
            DeliveryError::caller(format!(
                "payload for event '{event_type}' is not serializable: {err}"
            ))
        })?;
        Ok(self.enrich(Envelope::new(event_type, data).with_priority(priority)))
    }
}
