//! Spec content hashing, for session-hash-mismatch detection on resume
//! (spec.md §3 invariants, §9 Open Questions).
//!
//! Grounded on the original's `compute_spec_hash`: a hex-encoded SHA-256 of
//! the raw spec text, computed once at session creation and stored in
//! [`crate::session::SessionMetadata::spec_hash`].

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the original spec text.
pub fn compute_spec_hash(spec_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec_text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// What to do when a resume's recomputed spec hash differs from the one
/// recorded at session creation (spec.md §9 Open Questions: source behavior
/// is "warn and continue"; stricter refusal left as a configuration knob).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecHashPolicy {
    #[default]
    Warn,
    Refuse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_hashes_identically() {
        let a = compute_spec_hash("version: 1\nname: demo\n");
        let b = compute_spec_hash("version: 1\nname: demo\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_text_hashes_differently() {
        let a = compute_spec_hash("name: demo\n");
        let b = compute_spec_hash("name: demo2\n");
        assert_ne!(a, b);
    }

    #[test]
    fn default_policy_is_warn() {
        assert_eq!(SpecHashPolicy::default(), SpecHashPolicy::Warn);
    }
}
