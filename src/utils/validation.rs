//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Validate that an entry's amount stays below `MAX_ABS_AMOUNT`
pub fn validate_amount_range(entry: &Entry) -> ReconcileResult<()> {
    if entry.amount.abs() >= BigDecimal::from(MAX_ABS_AMOUNT) {
        return Err(ReconcileError::InvalidInput {
            entry: entry.id.label(),
            reason: format!(
                "amount {} exceeds the maximum of {}",
                entry.amount, MAX_ABS_AMOUNT
            ),
        });
    }

    Ok(())
}

/// Validate that a list has at most `max_entries` entries
pub fn validate_list_length(list: &DepositList, max_entries: usize) -> ReconcileResult<()> {
    if list.is_empty() {
        return Err(ReconcileError::EmptyList(list.side()));
    }

    if list.len() > max_entries {
        return Err(ReconcileError::InvalidInput {
            entry: list.side().to_string(),
            reason: format!(
                "list has {} entries, at most {} are supported",
                list.len(),
                max_entries
            ),
        });
    }

    Ok(())
}
