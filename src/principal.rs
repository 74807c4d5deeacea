//! Caller identity as an ordered set of claims.
//!
//! Identity is explicit context: the publisher and sender hold a
//! [`PrincipalProvider`] and pass whatever it returns into enrichment. An
//! anonymous caller is a valid, non-error state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One (type, value) claim pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. `"sub"` or a URI-style type.
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Build a claim from any pair of string-likes.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self { claim_type: claim_type.into(), value: value.into() }
    }
}

/// An established caller identity: every claim across every identity the
/// caller holds, in the order they were presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    claims: Vec<Claim>,
}

impl Principal {
    /// Principal holding the given claims.
    pub fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    /// The claims, input order preserved.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// All claims serialized to one compact JSON string, suitable for
    /// attaching to an envelope as audit metadata.
    pub fn claims_json(&self) -> String {
        serde_json::to_string(&self.claims).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Exposes the identity of the current caller, if any.
pub trait PrincipalProvider: Send + Sync + fmt::Debug {
    /// The established identity, or `None` for an anonymous caller.
    fn current(&self) -> Option<Principal>;
}

/// Provider for contexts with no caller identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl PrincipalProvider for Anonymous {
    fn current(&self) -> Option<Principal> {
        None
    }
}

/// Provider pinned to one fixed identity, for services that publish under a
/// service account and for tests.
#[derive(Debug, Clone)]
pub struct StaticPrincipal(pub Principal);

impl PrincipalProvider for StaticPrincipal {
    fn current(&self) -> Option<Principal> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_json_preserves_order() {
        let principal = Principal::new(vec![
            Claim::new("sub", "123"),
            Claim::new("name", "Alice"),
            Claim::new("custom", "value"),
        ]);

        let json = principal.claims_json();
        assert_eq!(
            json,
            r#"[{"type":"sub","value":"123"},{"type":"name","value":"Alice"},{"type":"custom","value":"value"}]"#
        );

        let sub = json.find("sub").unwrap();
        let name = json.find("name").unwrap();
        let custom = json.find("custom").unwrap();
        assert!(sub < name && name < custom);
    }

    #[test]
    fn empty_principal_serializes_to_empty_array() {
        assert_eq!(Principal::default().claims_json(), "[]");
    }

    #[test]
    fn claims_json_round_trips() {
        let principal = Principal::new(vec![Claim::new("role", "admin")]);
        let parsed: Vec<Claim> = serde_json::from_str(&principal.claims_json()).unwrap();
        assert_eq!(parsed, principal.claims());
    }

    #[test]
    fn anonymous_yields_none() {
        assert!(Anonymous.current().is_none());
    }

    #[test]
    fn static_provider_yields_its_principal() {
        let principal = Principal::new(vec![Claim::new("sub", "svc")]);
        let provider = StaticPrincipal(principal.clone());
        assert_eq!(provider.current(), Some(principal));
    }
}
