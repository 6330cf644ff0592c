//! In-memory rule storage built from filter-list text

use std::sync::Arc;

use log::{debug, info};

use fg_core::rule::{RuleStorage, StorageError};
use fg_core::types::StorageIndex;

use crate::error::RuleSyntaxError;
use crate::rule::NetworkRule;

/// Outcome of loading one filter list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListStats {
    /// Network rules added
    pub rules: usize,
    /// Comments, cosmetic rules and blank lines
    pub skipped: usize,
    /// Lines that failed to parse
    pub errors: usize,
}

/// Dense, append-only store of parsed network rules.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Vec<Arc<NetworkRule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(list_id, text)` pairs, in order.
    pub fn from_lists<'a>(lists: impl IntoIterator<Item = (u16, &'a str)>) -> Self {
        let mut store = Self::new();
        for (list_id, text) in lists {
            store.add_list(list_id, text);
        }
        store
    }

    /// Parse every line of `text` and append the network rules.
    pub fn add_list(&mut self, list_id: u16, text: &str) -> ListStats {
        let mut stats = ListStats::default();

        for line in text.lines() {
            let index = self.rules.len() as StorageIndex;
            match NetworkRule::parse(line, index, list_id) {
                Ok(rule) => {
                    self.rules.push(Arc::new(rule));
                    stats.rules += 1;
                }
                Err(RuleSyntaxError::Empty | RuleSyntaxError::NotNetworkRule) => stats.skipped += 1,
                Err(err) => {
                    debug!("list {list_id}: skipping `{}`: {err}", line.trim());
                    stats.errors += 1;
                }
            }
        }

        info!(
            "list {list_id}: {} rules, {} skipped, {} errors",
            stats.rules, stats.skipped, stats.errors
        );
        stats
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleStorage for RuleStore {
    type Rule = NetworkRule;

    fn retrieve_rule(&self, index: StorageIndex) -> Result<Arc<NetworkRule>, StorageError> {
        self.rules
            .get(index as usize)
            .cloned()
            .ok_or(StorageError::IndexOutOfRange(index))
    }

    fn scan(&self) -> impl Iterator<Item = (StorageIndex, Arc<NetworkRule>)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (i as StorageIndex, Arc::clone(rule)))
    }
}
