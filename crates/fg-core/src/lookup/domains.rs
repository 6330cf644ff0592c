//! Rules restricted by `$domain=` to plain domains

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{collect_matching, is_plain_domain, LookupTable};
use crate::hash::hash_hostname;
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Rules bucketed under every permitted domain's hash.
///
/// Only rules whose permitted domains are all plain names qualify; negated,
/// wildcard-TLD and regex entries cannot be looked up by hash.
#[derive(Debug, Default)]
pub struct DomainsLookupTable {
    buckets: HashMap<u32, Vec<StorageIndex>>,
    indices: HashSet<StorageIndex>,
}

impl DomainsLookupTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: RuleHandle> LookupTable<R> for DomainsLookupTable {
    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> bool {
        let domains = rule.permitted_domains();
        if domains.is_empty() || !domains.iter().all(|d| is_plain_domain(d)) {
            return false;
        }

        if !self.indices.insert(index) {
            return true;
        }

        // `domain=a.com|a.com` fills its bucket once
        let hashes: HashSet<u32> = domains.iter().map(|d| hash_hostname(d)).collect();
        for hash in hashes {
            self.buckets.entry(hash).or_default().push(index);
        }
        true
    }

    fn match_all<S: RuleStorage<Rule = R>>(&self, request: &Request, storage: &S) -> Vec<Arc<R>> {
        if self.buckets.is_empty() {
            return Vec::new();
        }

        let candidates = request
            .source_subdomains()
            .iter()
            .chain(request.subdomains())
            .filter_map(|domain| self.buckets.get(&hash_hostname(domain)))
            .flatten()
            .copied();

        collect_matching(candidates, request, storage)
    }

    fn rules_count(&self) -> usize {
        self.indices.len()
    }
}
