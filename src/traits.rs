//! Extension points: entry validation, progress reporting and export

use std::path::Path;

use crate::config::BITMASK_ENTRY_LIMIT;
use crate::reconciliation::{Checkpoint, ReconciliationReport};
use crate::types::*;
use crate::utils::validation::{validate_amount_range, validate_list_length};

/// Trait for implementing custom entry validation rules
///
/// The engine runs the validator on both lists before any enumeration, so a
/// rejected entry never reaches the pipeline.
pub trait EntryValidator: Send + Sync {
    /// Validate a single entry
    fn validate_entry(&self, entry: &Entry) -> ReconcileResult<()>;

    /// Validate a whole list; by default every entry in order
    fn validate_list(&self, list: &DepositList) -> ReconcileResult<()> {
        list.entries().iter().try_for_each(|entry| self.validate_entry(entry))
    }
}

/// Default validator: amounts of any sign with magnitude below
/// `MAX_ABS_AMOUNT`, lists that fit the subset bitmask
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, entry: &Entry) -> ReconcileResult<()> {
        validate_amount_range(entry)
    }

    fn validate_list(&self, list: &DepositList) -> ReconcileResult<()> {
        validate_list_length(list, BITMASK_ENTRY_LIMIT)?;
        list.entries().iter().try_for_each(|entry| self.validate_entry(entry))
    }
}

/// Receives pipeline checkpoints and answers cancellation requests.
///
/// Cancellation is only observed between stages, never inside one.
pub trait ProgressSink {
    fn checkpoint(&self, checkpoint: &Checkpoint);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores checkpoints and never cancels
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn checkpoint(&self, _checkpoint: &Checkpoint) {}
}

/// Writes a report in some external format
pub trait ReportExporter {
    /// Write the report to a file
    fn export(&self, report: &ReconciliationReport, path: &Path) -> ReconcileResult<()>;

    /// Render the report into memory
    fn export_to_buffer(&self, report: &ReconciliationReport) -> ReconcileResult<Vec<u8>>;
}
