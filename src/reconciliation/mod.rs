//! Deposit reconciliation pipeline
//!
//! Subset Enumerator → Sum Index → Candidate Generator → Optimizer →
//! Result Assembler. Each stage consumes the previous stage's output and
//! nothing is shared between runs.

pub mod assembler;
pub mod candidate;
pub mod index;
pub mod optimizer;
pub mod subset;
pub mod worker;

pub use assembler::*;
pub use candidate::*;
pub use index::SumIndex;
pub use optimizer::*;
pub use subset::{Subset, SubsetEnumerator};
pub use worker::*;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MatcherConfig;
use crate::traits::*;
use crate::types::*;

/// Pipeline stage boundaries reported while a run progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Checkpoint {
    SubsetsGenerated { subsets_a: u64, subsets_b: u64 },
    CandidatesFound { candidates: u64 },
    OptimizationComplete {
        total: BigDecimal,
        groups: usize,
        optimality: Optimality,
        nodes_explored: u64,
    },
    AssemblyComplete { related_sets: usize },
}

impl Checkpoint {
    /// Human-readable stage name
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SubsetsGenerated { .. } => "Subsets generated",
            Self::CandidatesFound { .. } => "Candidates found",
            Self::OptimizationComplete { .. } => "Optimization complete",
            Self::AssemblyComplete { .. } => "Assembly complete",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubsetsGenerated {
                subsets_a,
                subsets_b,
            } => write!(f, "{}: {} in A, {} in B", self.label(), subsets_a, subsets_b),
            Self::CandidatesFound { candidates } => {
                write!(f, "{}: {}", self.label(), candidates)
            }
            Self::OptimizationComplete {
                total,
                groups,
                optimality,
                nodes_explored,
            } => write!(
                f,
                "{}: total {} in {} group(s), {:?} after {} nodes",
                self.label(),
                total,
                groups,
                optimality,
                nodes_explored
            ),
            Self::AssemblyComplete { related_sets } => {
                write!(f, "{}: {} related set(s)", self.label(), related_sets)
            }
        }
    }
}

/// Runs reconciliations under one configuration and validator
pub struct ReconciliationEngine {
    config: MatcherConfig,
    validator: Box<dyn EntryValidator>,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    /// Create an engine with the default configuration and validator
    pub fn new() -> Self {
        Self {
            config: MatcherConfig::default(),
            validator: Box::new(DefaultEntryValidator),
        }
    }

    /// Create an engine with a custom configuration
    pub fn with_config(config: MatcherConfig) -> ReconcileResult<Self> {
        Self::with_validator(config, Box::new(DefaultEntryValidator))
    }

    /// Create an engine with a custom configuration and validator
    pub fn with_validator(
        config: MatcherConfig,
        validator: Box<dyn EntryValidator>,
    ) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self { config, validator })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Validate both lists and check the entry limits.
    ///
    /// Returns the list-length warnings that can be known before any
    /// enumeration happens.
    pub fn assess(&self, input: &ReconciliationInput) -> ReconcileResult<Vec<SizeWarning>> {
        self.validator.validate_list(&input.list_a)?;
        self.validator.validate_list(&input.list_b)?;

        let entries_a = input.list_a.len();
        let entries_b = input.list_b.len();
        let limit = self.config.max_entries_per_list;

        if entries_a > limit || entries_b > limit {
            return Err(ReconcileError::InputTooLarge {
                entries_a,
                entries_b,
                candidates: 0,
                reason: format!("at most {} entries per list are allowed", limit),
            });
        }

        let warnings: Vec<SizeWarning> = [&input.list_a, &input.list_b]
            .into_iter()
            .filter(|list| list.len() > self.config.entry_warning_threshold)
            .map(|list| SizeWarning::LongList {
                side: list.side(),
                entries: list.len(),
                subsets: SubsetEnumerator::subset_count(list.len()),
            })
            .collect();

        for warning in &warnings {
            tracing::warn!(%warning, "large reconciliation input");
        }
        Ok(warnings)
    }

    /// Enumerate, index and pair both lists.
    ///
    /// Fails with `InputTooLarge` before materializing candidates when their
    /// count exceeds `max_candidates`.
    pub fn prepare<'a>(
        &'a self,
        input: &'a ReconciliationInput,
        progress: &dyn ProgressSink,
    ) -> ReconcileResult<PreparedRun<'a>> {
        let mut warnings = self.assess(input)?;

        tracing::info!(
            entries_a = input.list_a.len(),
            entries_b = input.list_b.len(),
            strategy = ?self.config.strategy,
            "starting reconciliation"
        );

        let amounts_a = input.list_a.rounded_amounts()?;
        let amounts_b = input.list_b.rounded_amounts()?;

        let index_a = SumIndex::build(SubsetEnumerator::enumerate_amounts(ListSide::A, &amounts_a));
        let index_b = SumIndex::build(SubsetEnumerator::enumerate_amounts(ListSide::B, &amounts_b));
        checkpoint(
            progress,
            Checkpoint::SubsetsGenerated {
                subsets_a: index_a.subset_count() as u64,
                subsets_b: index_b.subset_count() as u64,
            },
        )?;

        let candidate_count = CandidateGenerator::count(&index_a, &index_b);
        if candidate_count > self.config.max_candidates {
            return Err(ReconcileError::InputTooLarge {
                entries_a: input.list_a.len(),
                entries_b: input.list_b.len(),
                candidates: candidate_count,
                reason: format!(
                    "{} match candidates exceed the limit of {}",
                    candidate_count, self.config.max_candidates
                ),
            });
        }
        if candidate_count > self.config.candidate_warning_threshold {
            let warning = SizeWarning::ManyCandidates {
                candidates: candidate_count,
            };
            tracing::warn!(%warning, "large candidate set");
            warnings.push(warning);
        }

        let candidates = CandidateGenerator::generate(&index_a, &index_b);
        checkpoint(
            progress,
            Checkpoint::CandidatesFound {
                candidates: candidates.len() as u64,
            },
        )?;

        Ok(PreparedRun {
            config: &self.config,
            input,
            amounts_a,
            amounts_b,
            candidates,
            warnings,
        })
    }

    /// Run the whole pipeline, reporting checkpoints to `progress`
    pub fn run(
        &self,
        input: &ReconciliationInput,
        progress: &dyn ProgressSink,
    ) -> ReconcileResult<ReconciliationReport> {
        self.prepare(input, progress)?.run(progress)
    }

    /// Run the whole pipeline without progress reporting
    pub fn reconcile(&self, input: &ReconciliationInput) -> ReconcileResult<ReconciliationReport> {
        self.run(input, &NoopProgress)
    }
}

/// Input that has been enumerated and paired, ready for optimization
pub struct PreparedRun<'a> {
    config: &'a MatcherConfig,
    input: &'a ReconciliationInput,
    amounts_a: Vec<RoundedSum>,
    amounts_b: Vec<RoundedSum>,
    candidates: Vec<MatchCandidate>,
    warnings: Vec<SizeWarning>,
}

impl<'a> PreparedRun<'a> {
    /// Size warnings collected so far, including the exact candidate count
    pub fn warnings(&self) -> &[SizeWarning] {
        &self.warnings
    }

    pub fn candidate_count(&self) -> u64 {
        self.candidates.len() as u64
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }

    /// Optimize and assemble the report
    pub fn run(self, progress: &dyn ProgressSink) -> ReconcileResult<ReconciliationReport> {
        let optimizer = Optimizer::new(
            self.config.strategy,
            self.config.grouping,
            self.config.search_node_limit,
        );
        let outcome = optimizer.optimize(&self.candidates, &self.amounts_a, &self.amounts_b);

        if outcome.stats.budget_exhausted && !self.config.allow_heuristic_fallback {
            return Err(ReconcileError::SearchBudgetExhausted {
                entries_a: self.input.list_a.len(),
                entries_b: self.input.list_b.len(),
                candidates: outcome.stats.candidates,
                nodes: outcome.stats.nodes_explored,
            });
        }
        if outcome.stats.budget_exhausted {
            tracing::warn!(
                nodes = outcome.stats.nodes_explored,
                "search budget exhausted, keeping best matching found"
            );
        }

        checkpoint(
            progress,
            Checkpoint::OptimizationComplete {
                total: outcome.matching.total().to_decimal(),
                groups: outcome.matching.len(),
                optimality: outcome.matching.optimality(),
                nodes_explored: outcome.stats.nodes_explored,
            },
        )?;

        let report = ResultAssembler::assemble(self.input, &outcome.matching, outcome.stats)?;
        checkpoint(
            progress,
            Checkpoint::AssemblyComplete {
                related_sets: report.related_sets.len(),
            },
        )?;

        tracing::info!(
            matched_total = %report.matched_total,
            related_sets = report.related_sets.len(),
            optimality = ?report.optimality,
            "reconciliation complete"
        );
        Ok(report)
    }
}

/// Report a stage boundary, then honour a pending cancellation
fn checkpoint(progress: &dyn ProgressSink, checkpoint: Checkpoint) -> ReconcileResult<()> {
    tracing::debug!(%checkpoint, "checkpoint");
    progress.checkpoint(&checkpoint);
    if progress.is_cancelled() {
        tracing::info!(stage = checkpoint.label(), "reconciliation cancelled");
        return Err(ReconcileError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn input(a: &[i64], b: &[i64]) -> ReconciliationInput {
        ReconciliationInput::from_amounts(
            a.iter().map(|&v| BigDecimal::from(v)).collect(),
            b.iter().map(|&v| BigDecimal::from(v)).collect(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<&'static str>>,
        cancel_after: Option<usize>,
        calls: Cell<usize>,
    }

    impl ProgressSink for Recorder {
        fn checkpoint(&self, checkpoint: &Checkpoint) {
            self.seen.borrow_mut().push(checkpoint.label());
            self.calls.set(self.calls.get() + 1);
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_after.is_some_and(|n| self.calls.get() >= n)
        }
    }

    #[test]
    fn test_checkpoints_in_order() {
        let recorder = Recorder::default();
        let report = ReconciliationEngine::new()
            .run(&input(&[3, 7, 10], &[10, 3, 7]), &recorder)
            .unwrap();

        assert_eq!(report.matched_total, BigDecimal::from(20));
        assert_eq!(
            *recorder.seen.borrow(),
            vec![
                "Subsets generated",
                "Candidates found",
                "Optimization complete",
                "Assembly complete"
            ]
        );
    }

    #[test]
    fn test_cancellation_between_stages() {
        let recorder = Recorder {
            cancel_after: Some(2),
            ..Recorder::default()
        };
        let result = ReconciliationEngine::new().run(&input(&[1, 2, 3], &[3, 3]), &recorder);

        assert_eq!(result, Err(ReconcileError::Cancelled));
        assert_eq!(recorder.seen.borrow().len(), 2);
    }

    #[test]
    fn test_entry_limit_is_fatal() {
        let config = MatcherConfig {
            max_entries_per_list: 4,
            entry_warning_threshold: 3,
            ..MatcherConfig::default()
        };
        let engine = ReconciliationEngine::with_config(config).unwrap();
        let err = engine.reconcile(&input(&[1, 2, 3, 4, 5], &[1])).unwrap_err();

        match err {
            ReconcileError::InputTooLarge {
                entries_a,
                entries_b,
                ..
            } => {
                assert_eq!(entries_a, 5);
                assert_eq!(entries_b, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_warnings_do_not_block() {
        let config = MatcherConfig {
            entry_warning_threshold: 2,
            candidate_warning_threshold: 1,
            ..MatcherConfig::default()
        };
        let engine = ReconciliationEngine::with_config(config).unwrap();
        let input = input(&[1, 2, 3], &[3, 3]);

        let assessed = engine.assess(&input).unwrap();
        assert_eq!(
            assessed,
            vec![SizeWarning::LongList {
                side: ListSide::A,
                entries: 3,
                subsets: 7
            }]
        );

        let prepared = engine.prepare(&input, &NoopProgress).unwrap();
        assert!(prepared
            .warnings()
            .iter()
            .any(|w| matches!(w, SizeWarning::ManyCandidates { .. })));
        assert!(prepared.candidate_count() > 1);

        let report = prepared.run(&NoopProgress).unwrap();
        assert_eq!(report.matched_total, BigDecimal::from(6));
    }

    #[test]
    fn test_candidate_limit_is_fatal() {
        let config = MatcherConfig {
            candidate_warning_threshold: 1,
            max_candidates: 2,
            ..MatcherConfig::default()
        };
        let engine = ReconciliationEngine::with_config(config).unwrap();
        let err = engine.reconcile(&input(&[1, 1, 1], &[1, 1, 1])).unwrap_err();
        assert!(matches!(err, ReconcileError::InputTooLarge { candidates, .. } if candidates > 2));
    }

    #[test]
    fn test_budget_exhaustion_without_fallback() {
        let config = MatcherConfig {
            search_node_limit: Some(3),
            allow_heuristic_fallback: false,
            grouping: GroupingPreference::Finest,
            ..MatcherConfig::default()
        };
        let engine = ReconciliationEngine::with_config(config).unwrap();
        let err = engine
            .reconcile(&input(&[1, 1, 1, 1, 1, 1], &[1, 1, 1, 1, 1, 1]))
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::SearchBudgetExhausted {
                entries_a: 6,
                entries_b: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_entry_rejected_before_pipeline() {
        let recorder = Recorder::default();
        let input = input(&[4, 1_000_000_000_000_000], &[4]);
        let result = ReconciliationEngine::new().run(&input, &recorder);

        assert!(matches!(result, Err(ReconcileError::InvalidInput { ref entry, .. }) if entry == "A2"));
        assert!(recorder.seen.borrow().is_empty());
    }
}
