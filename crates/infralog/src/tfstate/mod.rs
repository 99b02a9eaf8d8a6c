//! Terraform state model and drift detection.
//!
//! A [`State`] is parsed from the JSON document Terraform writes to its
//! backend. [`compare`] turns two snapshots into a [`StateDiff`] listing the
//! resources and outputs that were added, removed or changed.

mod compare;
mod diff;
mod resource;
mod state;

pub use compare::compare;
pub use diff::{DiffStatus, OutputDiff, ResourceDiff, StateDiff, ValueDiff};
pub use resource::{ResourceAddress, ResourceMode};
pub use state::{Output, Resource, ResourceInstance, State};

/// BLAKE3 fingerprint of a raw state document, as lowercase hex.
///
/// Two fetches with the same fingerprint carry the same state, so the
/// poller can skip parsing and comparison.
#[must_use]
pub fn fingerprint(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stable() {
        let a = fingerprint(br#"{"serial": 1}"#);
        let b = fingerprint(br#"{"serial": 1}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs() {
        assert_ne!(
            fingerprint(br#"{"serial": 1}"#),
            fingerprint(br#"{"serial": 2}"#)
        );
    }
}
