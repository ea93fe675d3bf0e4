//! Grouping of subsets by rounded sum

use indexmap::IndexMap;

use crate::reconciliation::subset::Subset;
use crate::types::RoundedSum;

/// Subsets of one list bucketed by their rounded sum.
///
/// Keys keep first-seen order and each bucket keeps generation order, so
/// iterating the index is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SumIndex {
    buckets: IndexMap<RoundedSum, Vec<Subset>>,
    subset_count: usize,
}

impl SumIndex {
    /// Group subsets by sum in a single pass
    pub fn build<I: IntoIterator<Item = Subset>>(subsets: I) -> Self {
        let mut buckets: IndexMap<RoundedSum, Vec<Subset>> = IndexMap::new();
        let mut subset_count = 0;

        for subset in subsets {
            buckets.entry(subset.sum()).or_default().push(subset);
            subset_count += 1;
        }

        Self {
            buckets,
            subset_count,
        }
    }

    /// Subsets with exactly this sum, in generation order
    pub fn get(&self, sum: &RoundedSum) -> Option<&[Subset]> {
        self.buckets.get(sum).map(Vec::as_slice)
    }

    /// Iterate `(sum, bucket)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&RoundedSum, &[Subset])> {
        self.buckets.iter().map(|(sum, bucket)| (sum, bucket.as_slice()))
    }

    /// Number of distinct sums
    pub fn distinct_sums(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of subsets across all buckets
    pub fn subset_count(&self) -> usize {
        self.subset_count
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::subset::SubsetEnumerator;
    use crate::types::ListSide;

    fn units(values: &[i128]) -> Vec<RoundedSum> {
        values.iter().map(|&v| RoundedSum(v)).collect()
    }

    #[test]
    fn test_groups_equal_sums() {
        let subsets = SubsetEnumerator::enumerate_amounts(ListSide::A, &units(&[3, 7, 10]));
        let index = SumIndex::build(subsets);

        assert_eq!(index.subset_count(), 7);
        // {10} and {3, 7} share a bucket
        assert_eq!(index.distinct_sums(), 6);

        let tens = index.get(&RoundedSum(10)).unwrap();
        assert_eq!(tens.len(), 2);
        assert_eq!(tens[0].mask(), 0b100);
        assert_eq!(tens[1].mask(), 0b011);
        assert!(index.get(&RoundedSum(4)).is_none());
    }

    #[test]
    fn test_keys_keep_first_seen_order() {
        let subsets = SubsetEnumerator::enumerate_amounts(ListSide::B, &units(&[5, 2]));
        let index = SumIndex::build(subsets);
        let keys: Vec<i128> = index.iter().map(|(sum, _)| sum.units()).collect();
        assert_eq!(keys, vec![5, 2, 7]);
    }

    #[test]
    fn test_empty_index() {
        let index = SumIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.subset_count(), 0);
    }
}
