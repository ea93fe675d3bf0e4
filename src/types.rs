//! Core types and data structures for deposit reconciliation

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Number of decimal places kept when comparing sums.
///
/// Sums that differ only beyond this precision (floating-point noise) are
/// treated as equal; cent-level differences stay distinct.
pub const SUM_SCALE: i64 = 10;

/// Largest amount accepted for a single entry.
///
/// With at most 63 entries per list every sum stays far inside `i128`
/// once amounts are expressed in units of 10^-SUM_SCALE.
pub const MAX_ABS_AMOUNT: i64 = 1_000_000_000_000_000;

/// The two lists being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListSide {
    /// First list (e.g. the bank feed)
    A,
    /// Second list (e.g. the ledger)
    B,
}

impl ListSide {
    /// Prefix used when labelling entries of this list
    pub fn prefix(&self) -> &'static str {
        match self {
            ListSide::A => "A",
            ListSide::B => "B",
        }
    }
}

impl fmt::Display for ListSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Stable positional identifier of an entry, displayed as `A1`, `B3`, ...
///
/// Assigned once when the list is built and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    /// List the entry belongs to
    pub side: ListSide,
    /// Zero-based position in the list
    pub position: usize,
}

impl EntryId {
    pub fn new(side: ListSide, position: usize) -> Self {
        Self { side, position }
    }

    /// Human-readable label (1-based), e.g. `A3`
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side.prefix(), self.position + 1)
    }
}

/// One deposit amount from either list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Stable identifier
    pub id: EntryId,
    /// Deposit amount as entered
    pub amount: BigDecimal,
}

impl Entry {
    pub fn new(id: EntryId, amount: BigDecimal) -> Self {
        Self { id, amount }
    }

    /// The amount rounded to the comparison precision
    pub fn rounded(&self) -> ReconcileResult<RoundedSum> {
        RoundedSum::from_amount(&self.amount).ok_or_else(|| ReconcileError::InvalidInput {
            entry: self.id.label(),
            reason: format!("amount {} cannot be represented", self.amount),
        })
    }
}

/// A sum expressed as an integer count of 10^-SUM_SCALE units.
///
/// Using integer units makes equality exact and the Sum Index hashable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundedSum(pub i128);

impl RoundedSum {
    pub const ZERO: RoundedSum = RoundedSum(0);

    /// Round an amount half-even to `SUM_SCALE` decimal places.
    ///
    /// Returns `None` when the value does not fit the unit representation.
    pub fn from_amount(amount: &BigDecimal) -> Option<Self> {
        let rounded = amount.with_scale_round(SUM_SCALE, RoundingMode::HalfEven);
        let (digits, scale) = rounded.as_bigint_and_exponent();
        debug_assert_eq!(scale, SUM_SCALE);
        digits.to_i128().map(RoundedSum)
    }

    /// Raw unit count
    pub fn units(&self) -> i128 {
        self.0
    }

    /// Convert back to a decimal with trailing zeros removed
    pub fn to_decimal(&self) -> BigDecimal {
        let value = BigDecimal::new(BigInt::from(self.0), SUM_SCALE).normalized();
        // Keep whole numbers in plain notation (20, not 2E+1)
        if value.as_bigint_and_exponent().1 < 0 {
            value.with_scale(0)
        } else {
            value
        }
    }

    pub fn saturating_add(self, other: RoundedSum) -> RoundedSum {
        RoundedSum(self.0.saturating_add(other.0))
    }

    /// The value itself when positive, zero otherwise
    pub fn positive_part(self) -> RoundedSum {
        self.max(RoundedSum::ZERO)
    }
}

impl Add for RoundedSum {
    type Output = RoundedSum;

    fn add(self, other: RoundedSum) -> RoundedSum {
        RoundedSum(self.0 + other.0)
    }
}

impl Sub for RoundedSum {
    type Output = RoundedSum;

    fn sub(self, other: RoundedSum) -> RoundedSum {
        RoundedSum(self.0 - other.0)
    }
}

impl std::iter::Sum for RoundedSum {
    fn sum<I: Iterator<Item = RoundedSum>>(iter: I) -> Self {
        iter.fold(RoundedSum::ZERO, |acc, s| acc + s)
    }
}

impl fmt::Display for RoundedSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// An ordered list of deposits with positional identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositList {
    side: ListSide,
    entries: Vec<Entry>,
}

impl DepositList {
    /// Build a list from already-numeric amounts.
    ///
    /// Identifiers are assigned in input order starting at 1.
    pub fn from_amounts(side: ListSide, amounts: Vec<BigDecimal>) -> ReconcileResult<Self> {
        if amounts.is_empty() {
            return Err(ReconcileError::EmptyList(side));
        }

        let entries = amounts
            .into_iter()
            .enumerate()
            .map(|(position, amount)| Entry::new(EntryId::new(side, position), amount))
            .collect();

        Ok(Self { side, entries })
    }

    /// Parse one text field per entry, as typed into the entry form.
    ///
    /// An empty or non-numeric field is reported with the identifier it
    /// would have received.
    pub fn parse<S: AsRef<str>>(side: ListSide, fields: &[S]) -> ReconcileResult<Self> {
        let amounts = fields
            .iter()
            .enumerate()
            .map(|(position, field)| parse_amount(EntryId::new(side, position), field.as_ref()))
            .collect::<ReconcileResult<Vec<_>>>()?;

        Self::from_amounts(side, amounts)
    }

    /// Parse a pasted block of amounts separated by newlines or tabs.
    ///
    /// Blank lines are skipped; every remaining token must be numeric.
    pub fn parse_pasted(side: ListSide, text: &str) -> ReconcileResult<Self> {
        let fields: Vec<&str> = text
            .split(['\n', '\r', '\t'])
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        Self::parse(side, &fields)
    }

    pub fn side(&self) -> ListSide {
        self.side
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its identifier
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        if id.side != self.side {
            return None;
        }
        self.entries.get(id.position)
    }

    /// Amounts rounded to the comparison precision, in input order
    pub fn rounded_amounts(&self) -> ReconcileResult<Vec<RoundedSum>> {
        self.entries.iter().map(Entry::rounded).collect()
    }
}

fn parse_amount(id: EntryId, field: &str) -> ReconcileResult<BigDecimal> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(ReconcileError::InvalidInput {
            entry: id.label(),
            reason: "value is missing".to_string(),
        });
    }

    BigDecimal::from_str(trimmed).map_err(|_| ReconcileError::InvalidInput {
        entry: id.label(),
        reason: format!("'{}' is not a number", trimmed),
    })
}

/// The two lists handed to one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationInput {
    pub list_a: DepositList,
    pub list_b: DepositList,
}

impl ReconciliationInput {
    /// Pair two lists; they must be labelled A and B respectively
    pub fn new(list_a: DepositList, list_b: DepositList) -> ReconcileResult<Self> {
        if list_a.side() != ListSide::A || list_b.side() != ListSide::B {
            return Err(ReconcileError::InvalidInput {
                entry: format!("{}/{}", list_a.side(), list_b.side()),
                reason: "lists must be supplied as List A then List B".to_string(),
            });
        }
        Ok(Self { list_a, list_b })
    }

    /// Convenience constructor from numeric amounts
    pub fn from_amounts(a: Vec<BigDecimal>, b: Vec<BigDecimal>) -> ReconcileResult<Self> {
        Self::new(
            DepositList::from_amounts(ListSide::A, a)?,
            DepositList::from_amounts(ListSide::B, b)?,
        )
    }

    pub fn list(&self, side: ListSide) -> &DepositList {
        match side {
            ListSide::A => &self.list_a,
            ListSide::B => &self.list_b,
        }
    }
}

/// Label of one selected match group, displayed as `R1`, `R2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatedSetId(pub usize);

impl fmt::Display for RelatedSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Reconciliation status of a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Explained by the related set it belongs to
    Matched { related_set: RelatedSetId },
    /// Left in the unexplained remainder
    Unmatched,
}

impl EntryStatus {
    pub fn is_matched(&self) -> bool {
        matches!(self, EntryStatus::Matched { .. })
    }

    pub fn related_set(&self) -> Option<RelatedSetId> {
        match self {
            EntryStatus::Matched { related_set } => Some(*related_set),
            EntryStatus::Unmatched => None,
        }
    }
}

/// Whether a matching is proven maximal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimality {
    /// Branch-and-bound completed; the total is the maximum achievable
    Exact,
    /// Produced by a heuristic or a truncated search; may be below maximum
    Heuristic,
}

/// How the optimizer searches the candidate set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Branch-and-bound, optimal
    #[default]
    Exact,
    /// Highest-sum-first single pass, not guaranteed optimal
    Greedy,
}

impl FromStr for SearchStrategy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(SearchStrategy::Exact),
            "greedy" => Ok(SearchStrategy::Greedy),
            other => Err(ReconcileError::Config(format!(
                "unknown search strategy '{}'",
                other
            ))),
        }
    }
}

/// Which of several maximum-sum matchings to prefer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPreference {
    /// The first maximum-sum matching met in descending-sum order. Every
    /// matching's union is itself a candidate, so this is usually one group.
    #[default]
    FirstFound,
    /// Among maximum-sum matchings, the one with the most related sets
    Finest,
}

impl FromStr for GroupingPreference {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_found" => Ok(GroupingPreference::FirstFound),
            "finest" => Ok(GroupingPreference::Finest),
            other => Err(ReconcileError::Config(format!(
                "unknown grouping preference '{}'",
                other
            ))),
        }
    }
}

/// Non-fatal notice that a run may be expensive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeWarning {
    /// A list is longer than the comfortable enumeration size
    LongList {
        side: ListSide,
        entries: usize,
        subsets: u64,
    },
    /// The candidate set is large
    ManyCandidates { candidates: u64 },
}

impl fmt::Display for SizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeWarning::LongList {
                side,
                entries,
                subsets,
            } => write!(
                f,
                "List {} has {} entries ({} subsets to enumerate)",
                side, entries, subsets
            ),
            SizeWarning::ManyCandidates { candidates } => {
                write!(f, "{} match candidates to search", candidates)
            }
        }
    }
}

/// Errors that can occur during reconciliation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Invalid input for {entry}: {reason}")]
    InvalidInput { entry: String, reason: String },
    #[error("List {0} has no entries")]
    EmptyList(ListSide),
    #[error(
        "Input too large (List A: {entries_a} entries, List B: {entries_b} entries, {candidates} candidates): {reason}"
    )]
    InputTooLarge {
        entries_a: usize,
        entries_b: usize,
        candidates: u64,
        reason: String,
    },
    #[error(
        "Search budget exhausted after {nodes} nodes (List A: {entries_a} entries, List B: {entries_b} entries, {candidates} candidates)"
    )]
    SearchBudgetExhausted {
        entries_a: usize,
        entries_b: usize,
        candidates: u64,
        nodes: u64,
    },
    #[error("Reconciliation run was cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
