//! Configuration surface for the two delivery paths.
//!
//! Both structs are plain deserializable settings; `validate` runs at
//! construction time so misconfiguration fails fast instead of becoming a
//! runtime retry condition.

use serde::Deserialize;

use crate::error::{DeliveryError, Result};

fn require(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DeliveryError::configuration(format!("{name} must be set")));
    }
    Ok(())
}

/// Settings for the fan-out bus path.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Bus endpoint the transport client connects to.
    pub endpoint: String,
    /// Access credential for the endpoint.
    pub access_key: String,
    /// Default source identifier stamped onto envelopes, URI-style,
    /// e.g. `/accounting/api`.
    pub source: String,
}

impl BusConfig {
    /// Reject empty required settings.
    pub fn validate(&self) -> Result<()> {
        require(&self.endpoint, "endpoint")?;
        require(&self.access_key, "access_key")?;
        require(&self.source, "source")
    }
}

/// Settings for the queue path.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Connection string for the queue service.
    pub connection_string: String,
    /// Default source identifier for messages published here, URI-style.
    pub default_source: String,
}

impl QueueConfig {
    /// Reject empty required settings.
    pub fn validate(&self) -> Result<()> {
        require(&self.connection_string, "connection_string")?;
        require(&self.default_source, "default_source")
    }
}
