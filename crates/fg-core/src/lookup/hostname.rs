//! Hostname-anchored rules (`||example.org^`)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{collect_matching, is_plain_domain, LookupTable};
use crate::hash::hash_hostname;
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Rules whose pattern is `||host^` or `||host/...`, keyed by host hash.
#[derive(Debug, Default)]
pub struct HostnameLookupTable {
    buckets: HashMap<u32, Vec<StorageIndex>>,
    indices: HashSet<StorageIndex>,
}

impl HostnameLookupTable {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Host part of a `||host^` / `||host/...` pattern, if it is plain.
fn anchored_host(pattern: &str) -> Option<&str> {
    let rest = pattern.strip_prefix("||")?;
    let end = rest.find(['^', '/'])?;
    let host = &rest[..end];

    // `||host^` must end right there; `||host/...` may carry a path.
    if rest.as_bytes()[end] == b'^' && end + 1 != rest.len() {
        return None;
    }
    if !is_plain_domain(host) {
        return None;
    }
    Some(host)
}

impl<R: RuleHandle> LookupTable<R> for HostnameLookupTable {
    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> bool {
        let Some(host) = anchored_host(rule.pattern()) else {
            return false;
        };

        if self.indices.insert(index) {
            self.buckets.entry(hash_hostname(host)).or_default().push(index);
        }
        true
    }

    fn match_all<S: RuleStorage<Rule = R>>(&self, request: &Request, storage: &S) -> Vec<Arc<R>> {
        if self.buckets.is_empty() {
            return Vec::new();
        }

        let candidates = request
            .subdomains()
            .iter()
            .filter_map(|host| self.buckets.get(&hash_hostname(host)))
            .flatten()
            .copied();

        collect_matching(candidates, request, storage)
    }

    fn rules_count(&self) -> usize {
        self.indices.len()
    }
}
