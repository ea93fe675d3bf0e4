//! # Deposits Matcher Core
//!
//! A reconciliation library that matches deposit amounts between two lists
//! (List A and List B) by finding subsets with equal sums and choosing the
//! set of non-overlapping matches with the largest total.
//!
//! ## Features
//!
//! - **Exact matching**: branch-and-bound search over every equal-sum pairing, labelled `Exact` when proven optimal
//! - **Decimal amounts**: `BigDecimal` input, compared at 10 decimal places so float noise never splits a match
//! - **Related sets**: every matched entry is assigned to exactly one group with its counterpart entries
//! - **Resource limits**: size warnings and hard caps before enumeration or search can run away
//! - **Background runs**: worker thread with checkpoints and cancellation
//! - **Export**: Excel workbook with matched/unmatched highlighting (`xlsx` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use deposits_matcher_core::{DepositList, ListSide, ReconciliationEngine, ReconciliationInput};
//!
//! let input = ReconciliationInput::new(
//!     DepositList::parse(ListSide::A, &["3", "7", "10"]).unwrap(),
//!     DepositList::parse(ListSide::B, &["10", "3", "7"]).unwrap(),
//! )
//! .unwrap();
//!
//! let report = ReconciliationEngine::new().reconcile(&input).unwrap();
//! assert!(report.is_fully_reconciled());
//! println!("{}", report.summary_text());
//! ```

pub mod config;
pub mod export;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;

#[cfg(feature = "xlsx")]
pub use export::XlsxExporter;
