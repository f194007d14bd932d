//! Canonical sparse-vector representation and validity rules.
//!
//! A [`SparseVector`] is the exchange format between ingestion, storage, and
//! query: position-aligned `indices` and `values` sequences. The invariants
//! shared by both paths live here: equal lengths, no repeated index. The
//! model performs no normalization and no clipping; scoring semantics belong
//! to the indexing service.

use serde::{Deserialize, Serialize};

/// Sparse-vector invariant violations.
///
/// Recoverable at the single-record level during ingestion; surfaced to the
/// caller as a request error on the query path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MalformedVector {
    /// `indices` and `values` differ in length.
    #[error("indices length {indices} does not match values length {values}")]
    LengthMismatch {
        /// Number of indices.
        indices: usize,
        /// Number of values.
        values: usize,
    },

    /// An index occurs more than once within the vector.
    #[error("duplicate bin index {index}")]
    DuplicateIndex {
        /// The repeated index.
        index: u32,
    },
}

/// A sparse numeric vector: non-zero positions as aligned (index, value)
/// pairs.
///
/// Indices need not be sorted, but must be unique within one vector
/// (duplicates must have been pre-aggregated by the binner). Negative
/// indices are unrepresentable by construction. The wire shape is
/// `{"indices": [...], "values": [...]}`.
///
/// Equality compares index-sorted (index, value) pairs with exact float
/// equality, so two vectors carrying the same entries in different orders
/// compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    /// Bin indices of the stored entries.
    pub indices: Vec<u32>,
    /// Values aligned by position with `indices`.
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Construct a vector after checking the invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedVector`] on length mismatch or a repeated index.
    pub fn new(indices: Vec<u32>, values: Vec<f64>) -> Result<Self, MalformedVector> {
        let sv = Self { indices, values };
        sv.validate()?;
        Ok(sv)
    }

    /// The empty vector (zero entries), which is valid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if the vector stores no entries.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check the sparse-vector invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedVector::LengthMismatch`] if `indices` and
    /// `values` differ in length, or [`MalformedVector::DuplicateIndex`]
    /// if any index repeats.
    pub fn validate(&self) -> Result<(), MalformedVector> {
        if self.indices.len() != self.values.len() {
            return Err(MalformedVector::LengthMismatch {
                indices: self.indices.len(),
                values: self.values.len(),
            });
        }

        let mut seen = self.indices.clone();
        seen.sort_unstable();
        for pair in seen.windows(2) {
            if pair[0] == pair[1] {
                return Err(MalformedVector::DuplicateIndex { index: pair[0] });
            }
        }

        Ok(())
    }

    fn sorted_entries(&self) -> Vec<(u32, f64)> {
        let mut entries: Vec<(u32, f64)> = self
            .indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect();
        entries.sort_by_key(|&(index, _)| index);
        entries
    }
}

impl PartialEq for SparseVector {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_entries() == other.sorted_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_valid_vector() {
        let sv = SparseVector::new(vec![3, 1, 7], vec![0.5, 1.0, 2.0]).unwrap();
        assert_eq!(sv.len(), 3);
    }

    #[test]
    fn test_empty_vector_is_valid() {
        let sv = SparseVector::empty();
        assert!(sv.is_empty());
        assert!(sv.validate().is_ok());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let err = SparseVector::new(vec![1, 2], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            MalformedVector::LengthMismatch {
                indices: 2,
                values: 1
            }
        ));
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let err = SparseVector::new(vec![5, 9, 5], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, MalformedVector::DuplicateIndex { index: 5 }));
    }

    #[test]
    fn test_equality_ignores_entry_order() {
        let a = SparseVector::new(vec![1, 2], vec![10.0, 20.0]).unwrap();
        let b = SparseVector::new(vec![2, 1], vec![20.0, 10.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_is_exact_on_values() {
        let a = SparseVector::new(vec![1], vec![10.0]).unwrap();
        let b = SparseVector::new(vec![1], vec![10.000001]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wire_shape_round_trip() {
        let sv = SparseVector::new(vec![1000, 1052], vec![3.0, 0.5]).unwrap();
        let json = serde_json::to_value(&sv).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"indices": [1000, 1052], "values": [3.0, 0.5]})
        );

        let back: SparseVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, sv);
    }
}
