use sha2::{Digest, Sha256};

/// Compute the chained digest for an audit entry.
///
/// The digest covers the previous entry's digest (empty for the first entry),
/// the sequence number, and the compact JSON of every other field. Any edit to
/// an earlier entry therefore changes every digest after it.
pub fn chain_digest(
    previous: Option<&str>,
    instance_id: &str,
    sequence: i64,
    action: &str,
    actor_id: &str,
    recorded_at: &str,
    payload: &serde_json::Value,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(instance_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence.to_be_bytes());
    hasher.update(action.as_bytes());
    hasher.update([0u8]);
    hasher.update(actor_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(recorded_at.as_bytes());
    hasher.update([0u8]);
    // serde_json::Map is BTreeMap-backed, so key order is canonical.
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(previous: Option<&str>, comment: &str) -> String {
        chain_digest(
            previous,
            "inst-1",
            1,
            "reject",
            "M1",
            "2025-01-01T00:00:00Z",
            &serde_json::json!({ "comment": comment }),
        )
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest_of(None, "budget"), digest_of(None, "budget"));
        assert_eq!(digest_of(None, "budget").len(), 64);
    }

    #[test]
    fn digest_depends_on_payload() {
        assert_ne!(digest_of(None, "budget"), digest_of(None, "headcount"));
    }

    #[test]
    fn digest_depends_on_previous() {
        let first = digest_of(None, "budget");
        assert_ne!(digest_of(Some(&first), "budget"), first);
    }
}
