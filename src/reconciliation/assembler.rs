//! Builds the caller-facing report from a matching

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::reconciliation::optimizer::{Matching, SearchStats};
use crate::types::*;

/// One entry of either list with its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: EntryId,
    pub amount: BigDecimal,
    pub status: EntryStatus,
}

/// Totals for one list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSummary {
    pub total: BigDecimal,
    pub matched: BigDecimal,
    pub unmatched: BigDecimal,
}

/// A group of List A entries and List B entries with the same sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSet {
    pub id: RelatedSetId,
    pub members_a: Vec<EntryId>,
    pub members_b: Vec<EntryId>,
    pub values_a: Vec<BigDecimal>,
    pub values_b: Vec<BigDecimal>,
    pub sum: BigDecimal,
}

impl RelatedSet {
    /// Member identifiers of one side
    pub fn members(&self, side: ListSide) -> &[EntryId] {
        match side {
            ListSide::A => &self.members_a,
            ListSide::B => &self.members_b,
        }
    }

    /// Labels joined for display, e.g. `A1 + A4`
    pub fn describe(&self, side: ListSide) -> String {
        self.members(side)
            .iter()
            .map(EntryId::label)
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Final reconciliation result.
///
/// Built fresh for every run; nothing in it is shared with earlier runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub entries_a: Vec<EntryRecord>,
    pub entries_b: Vec<EntryRecord>,
    pub summary_a: ListSummary,
    pub summary_b: ListSummary,
    pub related_sets: Vec<RelatedSet>,
    /// Sum of all related-set sums; equal to the matched total of each list
    pub matched_total: BigDecimal,
    pub optimality: Optimality,
    pub search: SearchStats,
}

impl ReconciliationReport {
    /// Entry records of one list, in input order
    pub fn entries(&self, side: ListSide) -> &[EntryRecord] {
        match side {
            ListSide::A => &self.entries_a,
            ListSide::B => &self.entries_b,
        }
    }

    pub fn summary(&self, side: ListSide) -> &ListSummary {
        match side {
            ListSide::A => &self.summary_a,
            ListSide::B => &self.summary_b,
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&EntryRecord> {
        self.entries(id.side).get(id.position)
    }

    pub fn related_set(&self, id: RelatedSetId) -> Option<&RelatedSet> {
        self.related_sets.iter().find(|set| set.id == id)
    }

    /// Entries of one list left without a counterpart
    pub fn unmatched(&self, side: ListSide) -> impl Iterator<Item = &EntryRecord> {
        self.entries(side).iter().filter(|record| !record.status.is_matched())
    }

    pub fn has_matches(&self) -> bool {
        !self.related_sets.is_empty()
    }

    /// True when every entry of both lists is matched
    pub fn is_fully_reconciled(&self) -> bool {
        self.entries_a
            .iter()
            .chain(&self.entries_b)
            .all(|record| record.status.is_matched())
    }

    /// Plain-text result message
    pub fn summary_text(&self) -> String {
        if !self.has_matches() {
            return "No matching subset sums found.".to_string();
        }

        let mut text = String::new();
        let _ = writeln!(text, "Max matching sum: {}", self.matched_total);
        let _ = writeln!(text, "Remaining sum in List A: {}", self.summary_a.unmatched);
        let _ = write!(text, "Remaining sum in List B: {}", self.summary_b.unmatched);
        text
    }
}

/// Turns a matching into per-entry statuses and related-set summaries
pub struct ResultAssembler;

impl ResultAssembler {
    /// Build the report.
    ///
    /// Related sets are numbered from 1 in the matching's selection order.
    pub fn assemble(
        input: &ReconciliationInput,
        matching: &Matching,
        search: SearchStats,
    ) -> ReconcileResult<ReconciliationReport> {
        let mut owners: HashMap<EntryId, RelatedSetId> = HashMap::new();
        let mut related_sets = Vec::with_capacity(matching.len());

        for (index, candidate) in matching.candidates().iter().enumerate() {
            let id = RelatedSetId(index + 1);
            let members_a: Vec<EntryId> = candidate.a.members().collect();
            let members_b: Vec<EntryId> = candidate.b.members().collect();

            for member in members_a.iter().chain(&members_b) {
                if owners.insert(*member, id).is_some() {
                    return Err(ReconcileError::Internal(format!(
                        "{} assigned to more than one related set",
                        member
                    )));
                }
            }

            related_sets.push(RelatedSet {
                id,
                values_a: amounts_of(&input.list_a, &members_a)?,
                values_b: amounts_of(&input.list_b, &members_b)?,
                members_a,
                members_b,
                sum: candidate.sum.to_decimal(),
            });
        }

        let (entries_a, summary_a) = Self::side(&input.list_a, &owners)?;
        let (entries_b, summary_b) = Self::side(&input.list_b, &owners)?;

        Ok(ReconciliationReport {
            entries_a,
            entries_b,
            summary_a,
            summary_b,
            related_sets,
            matched_total: matching.total().to_decimal(),
            optimality: matching.optimality(),
            search,
        })
    }

    fn side(
        list: &DepositList,
        owners: &HashMap<EntryId, RelatedSetId>,
    ) -> ReconcileResult<(Vec<EntryRecord>, ListSummary)> {
        let mut total = RoundedSum::ZERO;
        let mut matched = RoundedSum::ZERO;
        let mut records = Vec::with_capacity(list.len());

        for entry in list.entries() {
            let rounded = entry.rounded()?;
            total = total + rounded;

            let status = match owners.get(&entry.id) {
                Some(&related_set) => {
                    matched = matched + rounded;
                    EntryStatus::Matched { related_set }
                }
                None => EntryStatus::Unmatched,
            };

            records.push(EntryRecord {
                id: entry.id,
                amount: entry.amount.clone(),
                status,
            });
        }

        let summary = ListSummary {
            total: total.to_decimal(),
            matched: matched.to_decimal(),
            unmatched: (total - matched).to_decimal(),
        };
        Ok((records, summary))
    }
}

fn amounts_of(list: &DepositList, members: &[EntryId]) -> ReconcileResult<Vec<BigDecimal>> {
    members
        .iter()
        .map(|id| {
            list.get(*id)
                .map(|entry| entry.amount.clone())
                .ok_or_else(|| ReconcileError::Internal(format!("{} is not in the input", id)))
        })
        .collect()
}
