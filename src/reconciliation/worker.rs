//! Background reconciliation thread.
//!
//! Runs the pipeline off the caller's thread, streams checkpoints over a
//! channel and supports cancellation between stages.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::{Checkpoint, ReconciliationEngine, ReconciliationReport};
use crate::traits::ProgressSink;
use crate::types::*;

/// What to do when a run trips a size warning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizePolicy {
    /// Log the warning and keep going
    #[default]
    Proceed,
    /// Stop before the expensive stage and report the warnings
    AbortOnWarning,
}

/// Messages sent from the worker thread.
///
/// Every run ends with exactly one of `Complete`, `Failed`, `Cancelled` or
/// `Aborted`.
#[derive(Debug, Clone)]
pub enum RunUpdate {
    Checkpoint(Checkpoint),
    Complete(RunOutcome),
    Failed(ReconcileError),
    Cancelled,
    Aborted { warnings: Vec<SizeWarning> },
}

impl RunUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunUpdate::Checkpoint(_))
    }
}

/// Successful run result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub report: ReconciliationReport,
    pub warnings: Vec<SizeWarning>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Handle to cancel an in-progress run.
#[derive(Clone)]
pub struct RunHandle {
    run_id: Uuid,
    cancel_flag: Arc<AtomicBool>,
}

impl RunHandle {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation; honoured at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Spawn a background reconciliation thread.
///
/// The thread owns `engine` and `input`. Returns a handle that can be used
/// to cancel the run.
pub fn spawn_reconciliation(
    engine: ReconciliationEngine,
    input: ReconciliationInput,
    policy: SizePolicy,
    sender: Sender<RunUpdate>,
) -> RunHandle {
    let handle = RunHandle::new();
    let worker_handle = handle.clone();

    std::thread::spawn(move || {
        let start = Instant::now();
        let sink = ChannelProgress {
            sender: &sender,
            handle: &worker_handle,
        };

        let update = match execute(&engine, &input, policy, &sink) {
            Ok(Execution::Finished { .. }) if worker_handle.is_cancelled() => RunUpdate::Cancelled,
            Ok(Execution::Finished { report, warnings }) => RunUpdate::Complete(RunOutcome {
                run_id: worker_handle.run_id(),
                report,
                warnings,
                finished_at: Utc::now(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
            Ok(Execution::Aborted { warnings }) => RunUpdate::Aborted { warnings },
            Err(ReconcileError::Cancelled) => RunUpdate::Cancelled,
            Err(error) => {
                tracing::error!(run_id = %worker_handle.run_id(), %error, "reconciliation failed");
                RunUpdate::Failed(error)
            }
        };

        let _ = sender.send(update);
    });

    handle
}

enum Execution {
    Finished {
        report: ReconciliationReport,
        warnings: Vec<SizeWarning>,
    },
    Aborted {
        warnings: Vec<SizeWarning>,
    },
}

fn execute(
    engine: &ReconciliationEngine,
    input: &ReconciliationInput,
    policy: SizePolicy,
    sink: &ChannelProgress<'_>,
) -> ReconcileResult<Execution> {
    // Abort before enumeration when the lists alone are already too long
    if policy == SizePolicy::AbortOnWarning {
        let warnings = engine.assess(input)?;
        if !warnings.is_empty() {
            return Ok(Execution::Aborted { warnings });
        }
    }

    let prepared = engine.prepare(input, sink)?;
    let warnings = prepared.warnings().to_vec();
    if policy == SizePolicy::AbortOnWarning && !warnings.is_empty() {
        return Ok(Execution::Aborted { warnings });
    }

    let report = prepared.run(sink)?;
    Ok(Execution::Finished { report, warnings })
}

struct ChannelProgress<'a> {
    sender: &'a Sender<RunUpdate>,
    handle: &'a RunHandle,
}

impl ProgressSink for ChannelProgress<'_> {
    fn checkpoint(&self, checkpoint: &Checkpoint) {
        self.sender.send(RunUpdate::Checkpoint(checkpoint.clone())).ok();
    }

    fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use crate::traits::EntryValidator;
    use bigdecimal::BigDecimal;
    use crossbeam_channel::{unbounded, Receiver};

    fn input(a: &[i64], b: &[i64]) -> ReconciliationInput {
        ReconciliationInput::from_amounts(
            a.iter().map(|&v| BigDecimal::from(v)).collect(),
            b.iter().map(|&v| BigDecimal::from(v)).collect(),
        )
        .unwrap()
    }

    fn collect(receiver: Receiver<RunUpdate>) -> Vec<RunUpdate> {
        receiver.iter().collect()
    }

    #[test]
    fn test_run_completes_with_checkpoints() {
        let (sender, receiver) = unbounded();
        let handle = spawn_reconciliation(
            ReconciliationEngine::new(),
            input(&[3, 7, 10], &[10, 3, 7]),
            SizePolicy::Proceed,
            sender,
        );

        let updates = collect(receiver);
        assert_eq!(updates.len(), 5);
        assert_eq!(updates.iter().filter(|u| u.is_terminal()).count(), 1);

        match updates.last() {
            Some(RunUpdate::Complete(outcome)) => {
                assert_eq!(outcome.run_id, handle.run_id());
                assert_eq!(outcome.report.matched_total, BigDecimal::from(20));
                assert!(outcome.warnings.is_empty());
            }
            other => panic!("unexpected terminal update: {other:?}"),
        }
    }

    #[test]
    fn test_abort_on_warning() {
        let config = MatcherConfig {
            entry_warning_threshold: 2,
            ..MatcherConfig::default()
        };
        let engine = ReconciliationEngine::with_config(config).unwrap();
        let (sender, receiver) = unbounded();
        spawn_reconciliation(engine, input(&[1, 2, 3], &[6]), SizePolicy::AbortOnWarning, sender);

        let updates = collect(receiver);
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            RunUpdate::Aborted { warnings } => assert_eq!(warnings.len(), 1),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn test_failure_is_reported() {
        let (sender, receiver) = unbounded();
        spawn_reconciliation(
            ReconciliationEngine::new(),
            input(&[5, -1_000_000_000_000_000], &[5]),
            SizePolicy::Proceed,
            sender,
        );

        let updates = collect(receiver);
        assert!(matches!(
            updates.as_slice(),
            [RunUpdate::Failed(ReconcileError::InvalidInput { .. })]
        ));
    }

    /// Holds the worker in validation until the test releases it
    struct Gate(Receiver<()>);

    impl EntryValidator for Gate {
        fn validate_entry(&self, _entry: &Entry) -> ReconcileResult<()> {
            Ok(())
        }

        fn validate_list(&self, _list: &DepositList) -> ReconcileResult<()> {
            // Returns at once after the release sender is dropped
            let _ = self.0.recv();
            Ok(())
        }
    }

    #[test]
    fn test_cancel_is_honoured_at_next_checkpoint() {
        let (release, gate) = unbounded();
        let engine =
            ReconciliationEngine::with_validator(MatcherConfig::default(), Box::new(Gate(gate)))
                .unwrap();
        let (sender, receiver) = unbounded();
        let handle = spawn_reconciliation(engine, input(&[1, 2, 3], &[3, 3]), SizePolicy::Proceed, sender);

        handle.cancel();
        drop(release);

        let updates = collect(receiver);
        assert!(matches!(
            updates.as_slice(),
            [RunUpdate::Checkpoint(Checkpoint::SubsetsGenerated { .. }), RunUpdate::Cancelled]
        ));
    }
}
