//! Cross-list pairing of equal-sum subsets

use serde::{Deserialize, Serialize};

use crate::reconciliation::index::SumIndex;
use crate::reconciliation::subset::Subset;
use crate::types::RoundedSum;

/// A subset of List A and a subset of List B with the same rounded sum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub a: Subset,
    pub b: Subset,
    pub sum: RoundedSum,
}

impl MatchCandidate {
    pub fn new(a: Subset, b: Subset) -> Self {
        debug_assert_eq!(a.sum(), b.sum());
        Self { a, b, sum: a.sum() }
    }

    /// True when the two candidates share an entry on either side
    pub fn conflicts_with(&self, other: &MatchCandidate) -> bool {
        self.a.mask() & other.a.mask() != 0 || self.b.mask() & other.b.mask() != 0
    }
}

/// Joins two sum indexes on exact rounded-sum equality
pub struct CandidateGenerator;

impl CandidateGenerator {
    /// Number of candidates `generate` would produce, without building them.
    ///
    /// Saturates at `u64::MAX`.
    pub fn count(index_a: &SumIndex, index_b: &SumIndex) -> u64 {
        index_a
            .iter()
            .filter_map(|(sum, bucket_a)| {
                index_b
                    .get(sum)
                    .map(|bucket_b| (bucket_a.len() as u64).saturating_mul(bucket_b.len() as u64))
            })
            .fold(0u64, u64::saturating_add)
    }

    /// Every (subset A, subset B) pair with equal sums.
    ///
    /// Overlapping candidates are all kept; resolving overlap is the
    /// optimizer's job. Order follows A's sum order, then A's bucket order,
    /// then B's bucket order.
    pub fn generate(index_a: &SumIndex, index_b: &SumIndex) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();

        for (sum, bucket_a) in index_a.iter() {
            let Some(bucket_b) = index_b.get(sum) else {
                continue;
            };

            for a in bucket_a {
                for b in bucket_b {
                    candidates.push(MatchCandidate::new(*a, *b));
                }
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            sums_a = index_a.distinct_sums(),
            sums_b = index_b.distinct_sums(),
            "generated match candidates"
        );
        candidates
    }
}
