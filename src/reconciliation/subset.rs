//! Subset enumeration for a single deposit list

use serde::{Deserialize, Serialize};

use crate::config::BITMASK_ENTRY_LIMIT;
use crate::types::*;

/// A non-empty combination of entries from one list and its rounded sum.
///
/// Members are stored as a bitmask over entry positions, so the identifier
/// set is always sorted and two subsets can be tested for overlap in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subset {
    side: ListSide,
    mask: u64,
    sum: RoundedSum,
}

impl Subset {
    pub fn new(side: ListSide, mask: u64, sum: RoundedSum) -> Self {
        Self { side, mask, sum }
    }

    pub fn side(&self) -> ListSide {
        self.side
    }

    /// Bitmask of member positions
    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn sum(&self) -> RoundedSum {
        self.sum
    }

    /// Number of member entries
    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Member identifiers in ascending position order
    pub fn members(&self) -> impl Iterator<Item = EntryId> + '_ {
        positions(self.mask).map(move |position| EntryId::new(self.side, position))
    }

    pub fn contains(&self, id: EntryId) -> bool {
        id.side == self.side && id.position < 64 && self.mask & (1u64 << id.position) != 0
    }

    /// True when both subsets come from the same list and share an entry
    pub fn overlaps(&self, other: &Subset) -> bool {
        self.side == other.side && self.mask & other.mask != 0
    }
}

/// Iterate the set bit positions of a mask, lowest first
pub(crate) fn positions(mut mask: u64) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let position = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        Some(position)
    })
}

/// Sum of the amounts selected by a mask
pub(crate) fn masked_sum(amounts: &[RoundedSum], mask: u64) -> RoundedSum {
    positions(mask).fold(RoundedSum::ZERO, |acc, position| {
        acc.saturating_add(amounts[position])
    })
}

/// Generates every non-empty subset of a list together with its sum
pub struct SubsetEnumerator;

impl SubsetEnumerator {
    /// Number of non-empty subsets of `n` entries (2^n - 1), saturating.
    ///
    /// Callers use this to warn or refuse before paying for enumeration.
    pub fn subset_count(n: usize) -> u64 {
        if n >= 64 {
            u64::MAX
        } else {
            (1u64 << n) - 1
        }
    }

    /// Enumerate all subsets of a deposit list
    pub fn enumerate(list: &DepositList) -> ReconcileResult<Vec<Subset>> {
        if list.len() > BITMASK_ENTRY_LIMIT {
            return Err(ReconcileError::InvalidInput {
                entry: list.side().to_string(),
                reason: format!(
                    "{} entries exceed the enumeration limit of {}",
                    list.len(),
                    BITMASK_ENTRY_LIMIT
                ),
            });
        }

        let amounts = list.rounded_amounts()?;
        Ok(Self::enumerate_amounts(list.side(), &amounts))
    }

    /// Enumerate all subsets of already-rounded amounts.
    ///
    /// Order is deterministic: by subset size, then by increasing bitmask
    /// within each size.
    pub fn enumerate_amounts(side: ListSide, amounts: &[RoundedSum]) -> Vec<Subset> {
        let n = amounts.len();
        debug_assert!(n <= BITMASK_ENTRY_LIMIT);
        if n == 0 {
            return Vec::new();
        }

        let mut subsets = Vec::with_capacity(Self::subset_count(n) as usize);
        let limit = 1u64 << n;

        for size in 1..=n {
            let mut mask = (1u64 << size) - 1;
            while mask < limit {
                subsets.push(Subset::new(side, mask, masked_sum(amounts, mask)));
                mask = next_combination(mask);
            }
        }

        tracing::debug!(side = %side, entries = n, subsets = subsets.len(), "enumerated subsets");
        subsets
    }
}

/// Next larger mask with the same number of set bits (Gosper's hack)
fn next_combination(mask: u64) -> u64 {
    let lowest = mask & mask.wrapping_neg();
    let ripple = mask + lowest;
    (((ripple ^ mask) >> 2) / lowest) | ripple
}
