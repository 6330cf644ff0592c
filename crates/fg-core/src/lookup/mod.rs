//! Lookup tables
//!
//! Every rule loaded into the network engine lives in exactly one of four
//! tables. The engine offers each rule to the tables in a fixed order and the
//! first one that accepts it keeps it:
//!
//! 1. [`HostnameLookupTable`] - plain `||host^` rules, bucketed by host hash
//! 2. [`TrieLookupTable`] - rules with a usable literal shortcut
//! 3. [`DomainsLookupTable`] - rules restricted to plain `$domain=` entries
//! 4. [`SeqScanLookupTable`] - everything else, scanned linearly
//!
//! Tables return candidates only after re-checking them with
//! [`RuleHandle::matches`], so hash collisions and shortcut false positives
//! never leak out.

mod domains;
mod hostname;
mod seq_scan;
mod trie;

pub use domains::DomainsLookupTable;
pub use hostname::HostnameLookupTable;
pub use seq_scan::SeqScanLookupTable;
pub use trie::TrieLookupTable;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Indexing strategy shared by the four tables.
pub trait LookupTable<R: RuleHandle> {
    /// Try to index a rule. Returns false if the table does not accept it.
    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> bool;

    /// All rules of this table that match the request, in no particular order.
    fn match_all<S: RuleStorage<Rule = R>>(&self, request: &Request, storage: &S) -> Vec<Arc<R>>;

    /// Number of rules indexed.
    fn rules_count(&self) -> usize;
}

/// Names the table a rule was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupTableKind {
    Hostname,
    Trie,
    Domains,
    SeqScan,
}

impl fmt::Display for LookupTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hostname => "hostname",
            Self::Trie => "trie",
            Self::Domains => "domains",
            Self::SeqScan => "seq_scan",
        };
        f.write_str(name)
    }
}

/// Resolve candidate indices through the storage, dropping duplicates,
/// storage misses and rules that do not actually match.
fn collect_matching<R, S, I>(candidates: I, request: &Request, storage: &S) -> Vec<Arc<R>>
where
    R: RuleHandle,
    S: RuleStorage<Rule = R>,
    I: IntoIterator<Item = StorageIndex>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for index in candidates {
        if !seen.insert(index) {
            continue;
        }
        match storage.retrieve_rule(index) {
            Ok(rule) => {
                if rule.matches(request) {
                    result.push(rule);
                }
            }
            Err(e) => {
                log::warn!("Skipping indexed rule: {e}");
            }
        }
    }

    result
}

/// Plain domain name: alphanumerics, `-` and `.`, with at least one dot and
/// no empty label.
fn is_plain_domain(s: &str) -> bool {
    !s.is_empty()
        && s.contains('.')
        && !s.starts_with('.')
        && !s.ends_with('.')
        && !s.contains("..")
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRule, FakeStorage};
    use crate::types::RequestType;

    #[test]
    fn plain_domain_check() {
        assert!(is_plain_domain("example.org"));
        assert!(is_plain_domain("a-b.example.co.uk"));
        assert!(!is_plain_domain("localhost"));
        assert!(!is_plain_domain(".example.org"));
        assert!(!is_plain_domain("example.org."));
        assert!(!is_plain_domain("example..org"));
        assert!(!is_plain_domain("example.*"));
        assert!(!is_plain_domain("~example.org"));
    }

    #[test]
    fn collect_skips_misses_and_duplicates() {
        let storage = FakeStorage::new(vec![FakeRule::new(0, "ads"), FakeRule::new(0, "other")]);
        let request = Request::new("https://example.org/ads.js", None, RequestType::SCRIPT);

        let rules = collect_matching([0, 0, 1, 42], &request, &storage);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].index(), 0);
    }

    #[test]
    fn kind_display() {
        assert_eq!(LookupTableKind::SeqScan.to_string(), "seq_scan");
    }
}
