//! Catch-all table scanned linearly

use std::collections::HashSet;
use std::sync::Arc;

use super::LookupTable;
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Rules no other table accepted, kept as handles in insertion order.
#[derive(Debug)]
pub struct SeqScanLookupTable<R> {
    rules: Vec<Arc<R>>,
    indices: HashSet<StorageIndex>,
}

impl<R> Default for SeqScanLookupTable<R> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            indices: HashSet::new(),
        }
    }
}

impl<R> SeqScanLookupTable<R> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: RuleHandle> LookupTable<R> for SeqScanLookupTable<R> {
    /// Always accepts. An index already present is not stored twice.
    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> bool {
        if self.indices.insert(index) {
            self.rules.push(Arc::clone(rule));
        }
        true
    }

    fn match_all<S: RuleStorage<Rule = R>>(&self, request: &Request, _storage: &S) -> Vec<Arc<R>> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(request))
            .cloned()
            .collect()
    }

    fn rules_count(&self) -> usize {
        self.rules.len()
    }
}
