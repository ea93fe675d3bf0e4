//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::types::{GroupingPreference, ReconcileError, ReconcileResult, SearchStrategy};

/// Hard ceiling imposed by the bitmask subset representation
pub const BITMASK_ENTRY_LIMIT: usize = 63;

/// Limits and search settings for one reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Lists longer than this raise a size warning
    pub entry_warning_threshold: usize,
    /// Lists longer than this are refused outright
    pub max_entries_per_list: usize,
    /// Candidate counts above this raise a size warning
    pub candidate_warning_threshold: u64,
    /// Candidate counts above this are refused outright
    pub max_candidates: u64,
    /// Branch-and-bound node budget; `None` searches to completion
    pub search_node_limit: Option<u64>,
    /// Return the best matching found so far, labelled heuristic, when the
    /// node budget runs out instead of failing the run
    pub allow_heuristic_fallback: bool,
    /// Search algorithm
    pub strategy: SearchStrategy,
    /// Tie-break among maximum-sum matchings
    pub grouping: GroupingPreference,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            entry_warning_threshold: 20,
            max_entries_per_list: 22,
            candidate_warning_threshold: 10_000,
            max_candidates: 2_000_000,
            search_node_limit: Some(20_000_000),
            allow_heuristic_fallback: true,
            strategy: SearchStrategy::Exact,
            grouping: GroupingPreference::FirstFound,
        }
    }
}

impl MatcherConfig {
    /// Load configuration from `DEPOSITS_MATCHER_*` environment variables,
    /// falling back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            entry_warning_threshold: env_parse("DEPOSITS_MATCHER_ENTRY_WARNING_THRESHOLD")
                .unwrap_or(defaults.entry_warning_threshold),
            max_entries_per_list: env_parse("DEPOSITS_MATCHER_MAX_ENTRIES")
                .unwrap_or(defaults.max_entries_per_list),
            candidate_warning_threshold: env_parse("DEPOSITS_MATCHER_CANDIDATE_WARNING_THRESHOLD")
                .unwrap_or(defaults.candidate_warning_threshold),
            max_candidates: env_parse("DEPOSITS_MATCHER_MAX_CANDIDATES")
                .unwrap_or(defaults.max_candidates),
            search_node_limit: match std::env::var("DEPOSITS_MATCHER_SEARCH_NODE_LIMIT") {
                Ok(v) if v.trim().eq_ignore_ascii_case("none") => None,
                Ok(v) => v.trim().parse().ok().or(defaults.search_node_limit),
                Err(_) => defaults.search_node_limit,
            },
            allow_heuristic_fallback: env_parse("DEPOSITS_MATCHER_HEURISTIC_FALLBACK")
                .unwrap_or(defaults.allow_heuristic_fallback),
            strategy: env_parse("DEPOSITS_MATCHER_STRATEGY").unwrap_or(defaults.strategy),
            grouping: env_parse("DEPOSITS_MATCHER_GROUPING").unwrap_or(defaults.grouping),
        }
    }

    /// Check that the limits are consistent with each other
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.max_entries_per_list == 0 {
            return Err(ReconcileError::Config(
                "max_entries_per_list must be at least 1".to_string(),
            ));
        }

        if self.max_entries_per_list > BITMASK_ENTRY_LIMIT {
            return Err(ReconcileError::Config(format!(
                "max_entries_per_list cannot exceed {}",
                BITMASK_ENTRY_LIMIT
            )));
        }

        if self.entry_warning_threshold > self.max_entries_per_list {
            return Err(ReconcileError::Config(format!(
                "entry_warning_threshold ({}) exceeds max_entries_per_list ({})",
                self.entry_warning_threshold, self.max_entries_per_list
            )));
        }

        if self.candidate_warning_threshold > self.max_candidates {
            return Err(ReconcileError::Config(format!(
                "candidate_warning_threshold ({}) exceeds max_candidates ({})",
                self.candidate_warning_threshold, self.max_candidates
            )));
        }

        if self.search_node_limit == Some(0) {
            return Err(ReconcileError::Config(
                "search_node_limit must be positive when set".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, SearchStrategy::Exact);
        assert!(config.allow_heuristic_fallback);
        assert_eq!(config.grouping, GroupingPreference::FirstFound);
    }

    #[test]
    fn test_validate_rejects_inconsistent_limits() {
        let config = MatcherConfig {
            entry_warning_threshold: 30,
            max_entries_per_list: 22,
            ..MatcherConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReconcileError::Config(_))));

        let config = MatcherConfig {
            max_entries_per_list: 64,
            entry_warning_threshold: 20,
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MatcherConfig {
            search_node_limit: Some(0),
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: MatcherConfig =
            serde_json::from_str(r#"{"strategy": "greedy", "max_candidates": 50000}"#).unwrap();
        assert_eq!(config.strategy, SearchStrategy::Greedy);
        assert_eq!(config.max_candidates, 50_000);
        assert_eq!(config.max_entries_per_list, 22);
    }
}
