//! Greedy size-bounded batching for bus delivery.
//!
//! Envelopes are packed left to right into batches whose estimated wire size
//! stays under a ceiling. Order preservation takes priority over minimizing
//! batch count; the packing is greedy by arrival order, not optimal.
//!
//! Sizing is an estimate, not a contract enforced client-side: an envelope
//! that alone exceeds the ceiling is emitted as its own one-element batch
//! rather than rejected, and estimation itself never fails: a metadata
//! serialization error degrades to a coarser length sum.

use std::collections::BTreeMap;

use crate::envelope::Envelope;

/// Tunables for wire-size estimation and batch sealing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLimits {
    /// Ceiling on a batch's estimated size in bytes.
    pub max_batch_bytes: usize,
    /// Fixed per-envelope overhead approximating wire framing cost.
    /// Empirically derived; tune against the actual transport.
    pub item_overhead: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self { max_batch_bytes: 1_536_000, item_overhead: 300 }
    }
}

/// An ordered, size-bounded group of envelopes sent in one transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    envelopes: Vec<Envelope>,
    estimated_bytes: usize,
}

impl Batch {
    /// The envelopes, in arrival order.
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Running size estimate for the whole batch.
    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    /// Number of envelopes in the batch.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Whether the batch holds no envelopes. `pack` never yields one.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Consume the batch, yielding its envelopes.
    pub fn into_envelopes(self) -> Vec<Envelope> {
        self.envelopes
    }
}

/// Estimated wire size of one envelope: payload bytes plus serialized
/// metadata bytes plus the fixed per-item overhead.
pub fn estimated_size(envelope: &Envelope, limits: &BatchLimits) -> usize {
    let payload_bytes = match serde_json::to_vec(&envelope.data) {
        Ok(bytes) => bytes.len(),
        Err(_) => envelope.data.to_string().len(),
    };

    let attributes = envelope.wire_attributes();
    let metadata_bytes = match serde_json::to_vec(&attributes.iter().copied().collect::<BTreeMap<_, _>>()) {
        Ok(bytes) => bytes.len(),
        // Estimation must never block delivery; degrade to a length sum.
        Err(_) => attributes.iter().map(|(key, value)| key.len() + value.len()).sum(),
    };

    payload_bytes
        .saturating_add(metadata_bytes)
        .saturating_add(limits.item_overhead)
}

/// Partition envelopes into sealed batches, preserving arrival order.
///
/// An empty input yields no batches. An envelope whose estimate alone
/// exceeds the ceiling is sealed into its own one-element batch.
pub fn pack(envelopes: Vec<Envelope>, limits: &BatchLimits) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current: Vec<Envelope> = Vec::new();
    let mut current_bytes = 0usize;

    for envelope in envelopes {
        let size = estimated_size(&envelope, limits);
        if current_bytes.saturating_add(size) > limits.max_batch_bytes && !current.is_empty() {
            batches.push(Batch {
                envelopes: std::mem::take(&mut current),
                estimated_bytes: current_bytes,
            });
            current_bytes = 0;
        }
        current.push(envelope);
        current_bytes = current_bytes.saturating_add(size);
    }

    if !current.is_empty() {
        batches.push(Batch { envelopes: current, estimated_bytes: current_bytes });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Envelope whose estimated size is exactly `target` bytes: a JSON
    /// string payload of `target - 323` characters plus 2 quote bytes,
    /// 21 bytes of `{"priority":"Normal"}` metadata, and 300 overhead.
    fn envelope_of_estimated_size(target: usize) -> Envelope {
        let envelope = Envelope::new("sized", json!("a".repeat(target - 323)));
        assert_eq!(estimated_size(&envelope, &BatchLimits::default()), target);
        envelope
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(pack(Vec::new(), &BatchLimits::default()).is_empty());
    }

    #[test]
    fn single_small_envelope_yields_one_batch() {
        let batches = pack(vec![Envelope::new("t", json!({}))], &BatchLimits::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn five_four_hundred_kilobyte_events_split_three_then_two() {
        let envelopes: Vec<Envelope> =
            (0..5).map(|_| envelope_of_estimated_size(400_000)).collect();
        let ids: Vec<_> = envelopes.iter().map(|envelope| envelope.id).collect();

        let batches = pack(envelopes, &BatchLimits::default());

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[0].estimated_bytes(), 1_200_000);

        let repacked: Vec<_> = batches
            .iter()
            .flat_map(|batch| batch.envelopes().iter().map(|envelope| envelope.id))
            .collect();
        assert_eq!(repacked, ids);
    }

    #[test]
    fn concatenation_reproduces_input_order() {
        let limits = BatchLimits { max_batch_bytes: 1_000, item_overhead: 300 };
        let envelopes: Vec<Envelope> =
            (0..17).map(|n| Envelope::new("t", json!({ "n": n }))).collect();
        let ids: Vec<_> = envelopes.iter().map(|envelope| envelope.id).collect();

        let batches = pack(envelopes, &limits);
        assert!(batches.len() > 1);

        let repacked: Vec<_> = batches
            .iter()
            .flat_map(|batch| batch.envelopes().iter().map(|envelope| envelope.id))
            .collect();
        assert_eq!(repacked, ids);
    }

    #[test]
    fn oversized_envelope_is_isolated_not_rejected() {
        let limits = BatchLimits { max_batch_bytes: 1_000, item_overhead: 300 };
        let small_before = Envelope::new("t", json!(1));
        let huge = Envelope::new("t", json!("x".repeat(5_000)));
        let small_after = Envelope::new("t", json!(2));
        assert!(estimated_size(&huge, &limits) > limits.max_batch_bytes);

        let batches =
            pack(vec![small_before.clone(), huge.clone(), small_after.clone()], &limits);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].envelopes()[0].id, small_before.id);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].envelopes()[0].id, huge.id);
        assert_eq!(batches[2].envelopes()[0].id, small_after.id);
    }

    #[test]
    fn oversized_first_envelope_never_produces_empty_batch() {
        let limits = BatchLimits { max_batch_bytes: 1_000, item_overhead: 300 };
        let huge = Envelope::new("t", json!("x".repeat(5_000)));
        let small = Envelope::new("t", json!(1));

        let batches = pack(vec![huge, small], &limits);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|batch| !batch.is_empty()));
    }

    #[test]
    fn no_multi_envelope_batch_exceeds_the_ceiling() {
        let limits = BatchLimits { max_batch_bytes: 2_000, item_overhead: 300 };
        let envelopes: Vec<Envelope> = (0..40)
            .map(|n| Envelope::new("t", json!("y".repeat(17 * (n % 13)))))
            .collect();

        for batch in pack(envelopes, &limits) {
            if batch.len() > 1 {
                assert!(batch.estimated_bytes() <= limits.max_batch_bytes);
            }
        }
    }

    #[test]
    fn claims_metadata_grows_the_estimate() {
        let limits = BatchLimits::default();
        let bare = Envelope::new("t", json!({}));
        let mut with_claims = bare.clone();
        with_claims.claims = Some(r#"[{"type":"sub","value":"123"}]"#.to_string());

        assert!(estimated_size(&with_claims, &limits) > estimated_size(&bare, &limits));
    }
}
