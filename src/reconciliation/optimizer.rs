//! Selection of a maximum-sum set of non-overlapping match candidates
//!
//! This is weighted set packing: every candidate consumes a set of List A
//! entries and a set of List B entries, and no entry may be consumed twice.
//! The exact strategy is a depth-first branch-and-bound over candidates in
//! descending-sum order. A branch is cut as soon as its accumulated sum plus
//! an upper bound on what the remaining candidates can still add cannot
//! beat the incumbent. The bound is the smallest of
//!
//! - the sum of all remaining positive candidate sums,
//! - the positive value of List A entries that are still free and appear in
//!   some remaining candidate,
//! - the same for List B,
//! - the largest candidate sum minus what is already accumulated.
//!
//! Amounts may be zero or negative, so only positive parts count towards the
//! first three. The last one holds because the union of any matching's groups
//! is itself a candidate, so no matching can total more than the largest
//! candidate.
//!
//! Under [`GroupingPreference::Finest`] the objective becomes
//! (total, number of groups), compared lexicographically, and the group
//! count is bounded by the free entries left on the smaller side.
//!
//! Only strict improvements replace the incumbent, so among equal scores
//! the first solution met in traversal order wins and identical input always
//! yields the identical matching.

use serde::{Deserialize, Serialize};

use crate::reconciliation::candidate::MatchCandidate;
use crate::reconciliation::subset::masked_sum;
use crate::types::{GroupingPreference, Optimality, RoundedSum, SearchStrategy};

/// Chosen candidates, in selection order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    candidates: Vec<MatchCandidate>,
    total: RoundedSum,
    optimality: Optimality,
}

impl Matching {
    /// Matching that selects nothing; the valid result when no sums coincide
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            total: RoundedSum::ZERO,
            optimality: Optimality::Exact,
        }
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }

    /// Sum of the chosen candidates' sums
    pub fn total(&self) -> RoundedSum {
        self.total
    }

    pub fn optimality(&self) -> Optimality {
        self.optimality
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Check that no entry is used twice and the total is consistent
    pub fn is_consistent(&self) -> bool {
        let mut used_a = 0u64;
        let mut used_b = 0u64;
        for candidate in &self.candidates {
            if candidate.a.mask() & used_a != 0 || candidate.b.mask() & used_b != 0 {
                return false;
            }
            used_a |= candidate.a.mask();
            used_b |= candidate.b.mask();
        }
        self.candidates.iter().map(|c| c.sum).sum::<RoundedSum>() == self.total
    }
}

/// Counters describing one optimizer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Candidates handed to the optimizer
    pub candidates: u64,
    /// Include/skip decisions examined
    pub nodes_explored: u64,
    /// Branches cut by the bound
    pub pruned_branches: u64,
    /// The node budget ran out before the search finished
    pub budget_exhausted: bool,
}

/// Optimizer result
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOutcome {
    pub matching: Matching,
    pub stats: SearchStats,
}

/// Chooses which candidates to accept
#[derive(Debug, Clone)]
pub struct Optimizer {
    strategy: SearchStrategy,
    grouping: GroupingPreference,
    node_limit: Option<u64>,
}

impl Optimizer {
    pub fn new(strategy: SearchStrategy, grouping: GroupingPreference, node_limit: Option<u64>) -> Self {
        Self {
            strategy,
            grouping,
            node_limit,
        }
    }

    /// Select a non-overlapping set of candidates.
    ///
    /// `amounts_a` / `amounts_b` are the rounded entry amounts of each list,
    /// indexed by position; they feed the bound.
    pub fn optimize(
        &self,
        candidates: &[MatchCandidate],
        amounts_a: &[RoundedSum],
        amounts_b: &[RoundedSum],
    ) -> OptimizerOutcome {
        let mut stats = SearchStats {
            candidates: candidates.len() as u64,
            ..SearchStats::default()
        };

        if candidates.is_empty() {
            return OptimizerOutcome {
                matching: Matching::empty(),
                stats,
            };
        }

        // Stable sort keeps generation order among equal sums
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&x, &y| candidates[y].sum.cmp(&candidates[x].sum));

        let (path, optimality) = match self.strategy {
            SearchStrategy::Greedy => {
                let path = greedy(candidates, &order);
                stats.nodes_explored = candidates.len() as u64;
                (path, Optimality::Heuristic)
            }
            SearchStrategy::Exact => {
                let mut search = BranchAndBound::new(
                    candidates,
                    &order,
                    amounts_a,
                    amounts_b,
                    self.grouping,
                    self.node_limit,
                );
                search.descend(0, 0, 0, RoundedSum::ZERO);

                stats.nodes_explored = search.nodes;
                stats.pruned_branches = search.pruned;
                stats.budget_exhausted = search.exhausted;

                let optimality = if search.exhausted {
                    Optimality::Heuristic
                } else {
                    Optimality::Exact
                };
                (search.best_path, optimality)
            }
        };

        let chosen: Vec<MatchCandidate> = path.iter().map(|&i| candidates[order[i]]).collect();
        let total = chosen.iter().map(|c| c.sum).sum();
        let matching = Matching {
            candidates: chosen,
            total,
            optimality,
        };
        debug_assert!(matching.is_consistent());

        tracing::debug!(
            strategy = ?self.strategy,
            grouping = ?self.grouping,
            groups = matching.len(),
            total = %matching.total(),
            nodes = stats.nodes_explored,
            pruned = stats.pruned_branches,
            exhausted = stats.budget_exhausted,
            "optimizer finished"
        );

        OptimizerOutcome { matching, stats }
    }
}

/// Take the highest-sum candidate that still fits, repeatedly. Candidates
/// that cannot raise the total are never taken.
///
/// Returns positions into `order`.
fn greedy(candidates: &[MatchCandidate], order: &[usize]) -> Vec<usize> {
    let mut used_a = 0u64;
    let mut used_b = 0u64;
    let mut path = Vec::new();

    for (position, &index) in order.iter().enumerate() {
        let candidate = &candidates[index];
        if candidate.sum <= RoundedSum::ZERO {
            break;
        }
        if candidate.a.mask() & used_a == 0 && candidate.b.mask() & used_b == 0 {
            used_a |= candidate.a.mask();
            used_b |= candidate.b.mask();
            path.push(position);
        }
    }

    path
}

#[derive(Debug, Clone, Copy)]
struct Item {
    a: u64,
    b: u64,
    sum: RoundedSum,
}

/// Objective value of a partial or complete matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    total: RoundedSum,
    groups: usize,
}

struct BranchAndBound {
    items: Vec<Item>,
    grouping: GroupingPreference,
    ceiling: RoundedSum,
    /// Entry amounts clamped at zero
    gains_a: Vec<RoundedSum>,
    gains_b: Vec<RoundedSum>,
    suffix_sum: Vec<RoundedSum>,
    suffix_a: Vec<u64>,
    suffix_b: Vec<u64>,
    node_limit: Option<u64>,
    path: Vec<usize>,
    best_path: Vec<usize>,
    best: Score,
    nodes: u64,
    pruned: u64,
    exhausted: bool,
}

impl BranchAndBound {
    fn new(
        candidates: &[MatchCandidate],
        order: &[usize],
        amounts_a: &[RoundedSum],
        amounts_b: &[RoundedSum],
        grouping: GroupingPreference,
        node_limit: Option<u64>,
    ) -> Self {
        let items: Vec<Item> = order
            .iter()
            .map(|&i| Item {
                a: candidates[i].a.mask(),
                b: candidates[i].b.mask(),
                sum: candidates[i].sum,
            })
            .collect();

        let n = items.len();
        let mut suffix_sum = vec![RoundedSum::ZERO; n + 1];
        let mut suffix_a = vec![0u64; n + 1];
        let mut suffix_b = vec![0u64; n + 1];
        for i in (0..n).rev() {
            suffix_sum[i] = suffix_sum[i + 1].saturating_add(items[i].sum.positive_part());
            suffix_a[i] = suffix_a[i + 1] | items[i].a;
            suffix_b[i] = suffix_b[i + 1] | items[i].b;
        }

        let ceiling = items.first().map_or(RoundedSum::ZERO, |item| item.sum);

        Self {
            items,
            grouping,
            ceiling,
            gains_a: amounts_a.iter().map(|amount| amount.positive_part()).collect(),
            gains_b: amounts_b.iter().map(|amount| amount.positive_part()).collect(),
            suffix_sum,
            suffix_a,
            suffix_b,
            node_limit,
            path: Vec::new(),
            best_path: Vec::new(),
            best: Score {
                total: RoundedSum::ZERO,
                groups: 0,
            },
            nodes: 0,
            pruned: 0,
            exhausted: false,
        }
    }

    /// Whether `score` is strictly better than the incumbent
    fn beats_incumbent(&self, score: Score) -> bool {
        match self.grouping {
            GroupingPreference::FirstFound => score.total > self.best.total,
            GroupingPreference::Finest => {
                score.total > self.best.total
                    || (score.total == self.best.total && score.groups > self.best.groups)
            }
        }
    }

    /// Best score any extension using candidates from `start` on could reach
    fn bound(&self, start: usize, used_a: u64, used_b: u64, current: Score) -> Score {
        let free_a = self.suffix_a[start] & !used_a;
        let free_b = self.suffix_b[start] & !used_b;

        let extra_sum = self.suffix_sum[start]
            .min(masked_sum(&self.gains_a, free_a))
            .min(masked_sum(&self.gains_b, free_b))
            .min(self.ceiling - current.total);
        let extra_groups = free_a.count_ones().min(free_b.count_ones()) as usize;

        Score {
            total: current.total.saturating_add(extra_sum),
            groups: current.groups + extra_groups,
        }
    }

    /// Explore every extension of the current path using candidates at or
    /// after `start`. Depth is bounded by the number of entries per list,
    /// since each accepted candidate consumes at least one of them.
    fn descend(&mut self, start: usize, used_a: u64, used_b: u64, accumulated: RoundedSum) {
        let current = Score {
            total: accumulated,
            groups: self.path.len(),
        };
        if self.beats_incumbent(current) {
            self.best = current;
            self.best_path.clone_from(&self.path);
        }

        for next in start..self.items.len() {
            if self.exhausted {
                return;
            }
            self.nodes += 1;
            if self.node_limit.is_some_and(|limit| self.nodes > limit) {
                self.exhausted = true;
                return;
            }

            // Every bound component only shrinks as `next` grows
            if !self.beats_incumbent(self.bound(next, used_a, used_b, current)) {
                self.pruned += 1;
                return;
            }

            let item = self.items[next];
            if item.a & used_a != 0 || item.b & used_b != 0 {
                continue;
            }

            self.path.push(next);
            self.descend(next + 1, used_a | item.a, used_b | item.b, accumulated + item.sum);
            self.path.pop();
        }
    }
}
