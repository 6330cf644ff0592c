//! Network engine: routes rules into lookup tables and collects matches

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::lookup::{
    DomainsLookupTable, HostnameLookupTable, LookupTable, LookupTableKind, SeqScanLookupTable, TrieLookupTable,
};
use crate::matching_result::MatchingResult;
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::StorageIndex;

/// Rule counts per lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub hostname: usize,
    pub trie: usize,
    pub domains: usize,
    pub seq_scan: usize,
}

impl TableCounts {
    pub fn total(&self) -> usize {
        self.hostname + self.trie + self.domains + self.seq_scan
    }
}

/// The four tables, in routing order.
struct LookupTables<R> {
    hostname: HostnameLookupTable,
    trie: TrieLookupTable,
    domains: DomainsLookupTable,
    seq_scan: SeqScanLookupTable<R>,
}

impl<R: RuleHandle> LookupTables<R> {
    fn new() -> Self {
        Self {
            hostname: HostnameLookupTable::new(),
            trie: TrieLookupTable::new(),
            domains: DomainsLookupTable::new(),
            seq_scan: SeqScanLookupTable::new(),
        }
    }

    fn add_rule(&mut self, rule: &Arc<R>, index: StorageIndex) -> LookupTableKind {
        if self.hostname.add_rule(rule, index) {
            return LookupTableKind::Hostname;
        }
        if self.trie.add_rule(rule, index) {
            return LookupTableKind::Trie;
        }
        if self.domains.add_rule(rule, index) {
            return LookupTableKind::Domains;
        }
        self.seq_scan.add_rule(rule, index);
        LookupTableKind::SeqScan
    }

    fn counts(&self) -> TableCounts {
        TableCounts {
            hostname: LookupTable::<R>::rules_count(&self.hostname),
            trie: LookupTable::<R>::rules_count(&self.trie),
            domains: LookupTable::<R>::rules_count(&self.domains),
            seq_scan: self.seq_scan.rules_count(),
        }
    }
}

/// Indexed network rules over an external rule storage.
///
/// Read-only once built; share it freely between threads when the storage
/// and rule types allow.
pub struct NetworkEngine<S: RuleStorage> {
    storage: S,
    config: Config,
    tables: LookupTables<S::Rule>,
}

impl<S: RuleStorage> NetworkEngine<S> {
    /// Empty engine; rules are added with [`NetworkEngine::add_rule`].
    pub fn new(storage: S, config: Config) -> Self {
        Self {
            storage,
            config,
            tables: LookupTables::new(),
        }
    }

    /// Index every rule of the storage before returning.
    pub fn create_sync(storage: S, config: Config) -> Self {
        Self::create_chunked(storage, config, |_| {})
    }

    /// Index every rule of the storage, calling `yield_point` with the number
    /// of rules added so far after each `config.chunk_size` rules.
    pub fn create_chunked<F>(storage: S, config: Config, mut yield_point: F) -> Self
    where
        F: FnMut(usize),
    {
        let chunk_size = config.chunk_size.max(1);
        let mut engine = Self::new(storage, config);
        let mut added = 0usize;

        for (index, rule) in engine.storage.scan() {
            engine.tables.add_rule(&rule, index);
            added += 1;
            if added % chunk_size == 0 {
                yield_point(added);
            }
        }

        engine.log_summary();
        engine
    }

    /// Like [`NetworkEngine::create_chunked`], but awaits the future made by
    /// `yield_now` at each chunk boundary so a host scheduler can run other
    /// work. Dropping the returned future abandons the load.
    pub async fn create_async<F, Fut>(storage: S, config: Config, mut yield_now: F) -> Self
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let chunk_size = config.chunk_size.max(1);
        let mut engine = Self::new(storage, config);
        let mut added = 0usize;

        for (index, rule) in engine.storage.scan() {
            engine.tables.add_rule(&rule, index);
            added += 1;
            if added % chunk_size == 0 {
                yield_now().await;
            }
        }

        engine.log_summary();
        engine
    }

    /// Route a rule to the first lookup table that accepts it.
    pub fn add_rule(&mut self, rule: &Arc<S::Rule>, index: StorageIndex) -> LookupTableKind {
        let kind = self.tables.add_rule(rule, index);
        log::trace!("Rule {index} indexed in {kind} table");
        kind
    }

    /// Every rule matching the request, from all tables.
    pub fn match_all(&self, request: &Request) -> Vec<Arc<S::Rule>> {
        let mut rules = self.tables.hostname.match_all(request, &self.storage);
        rules.extend(self.tables.trie.match_all(request, &self.storage));
        rules.extend(self.tables.domains.match_all(request, &self.storage));
        rules.extend(self.tables.seq_scan.match_all(request, &self.storage));
        rules
    }

    /// Basic decision for a request, without frame context.
    pub fn match_request(&self, request: &Request) -> Option<Arc<S::Rule>> {
        MatchingResult::new(self.match_all(request), None, &self.config).get_basic_result()
    }

    pub fn rules_count(&self) -> usize {
        self.tables.counts().total()
    }

    pub fn table_counts(&self) -> TableCounts {
        self.tables.counts()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn log_summary(&self) {
        let counts = self.tables.counts();
        log::info!(
            "Indexed {} network rules (hostname: {}, trie: {}, domains: {}, seq_scan: {})",
            counts.total(),
            counts.hostname,
            counts.trie,
            counts.domains,
            counts.seq_scan
        );
    }
}

impl<S: RuleStorage> fmt::Debug for NetworkEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkEngine")
            .field("config", &self.config)
            .field("tables", &self.tables.counts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRule, FakeStorage};
    use crate::types::RequestType;

    fn storage() -> FakeStorage {
        FakeStorage::new(vec![
            FakeRule::new(0, "example.org").pattern("||example.org^"),
            FakeRule::new(0, "banner"),
            FakeRule::new(0, "ad").domains(&["news.com"]),
            FakeRule::new(0, "x").shortcut(""),
        ])
    }

    #[test]
    fn routing_order() {
        let mut engine = NetworkEngine::new(FakeStorage::default(), Config::default());
        let rules = storage().rules;

        assert_eq!(engine.add_rule(&rules[0], 0), LookupTableKind::Hostname);
        assert_eq!(engine.add_rule(&rules[1], 1), LookupTableKind::Trie);
        assert_eq!(engine.add_rule(&rules[2], 2), LookupTableKind::Domains);
        assert_eq!(engine.add_rule(&rules[3], 3), LookupTableKind::SeqScan);
        assert_eq!(engine.rules_count(), 4);
    }

    #[test]
    fn create_sync_indexes_everything() {
        let engine = NetworkEngine::create_sync(storage(), Config::default());
        let counts = engine.table_counts();
        assert_eq!(counts, TableCounts { hostname: 1, trie: 1, domains: 1, seq_scan: 1 });
        assert_eq!(engine.rules_count(), 4);
    }

    #[test]
    fn create_chunked_yields_every_chunk() {
        let mut yields = Vec::new();
        let config = Config::default().with_chunk_size(2);
        let engine = NetworkEngine::create_chunked(storage(), config, |added| yields.push(added));
        assert_eq!(yields, vec![2, 4]);
        assert_eq!(engine.rules_count(), 4);
    }

    #[tokio::test]
    async fn create_async_yields_to_scheduler() {
        let mut yields = 0;
        let config = Config::default().with_chunk_size(3);
        let engine = NetworkEngine::create_async(storage(), config, || {
            yields += 1;
            tokio::task::yield_now()
        })
        .await;
        assert_eq!(yields, 1);
        assert_eq!(engine.rules_count(), 4);
    }

    #[test]
    fn match_all_spans_tables() {
        let engine = NetworkEngine::create_sync(storage(), Config::default());
        let request = Request::new(
            "https://ads.example.org/banner/x.png",
            Some("https://news.com/"),
            RequestType::IMAGE,
        );
        let mut matched: Vec<_> = engine.match_all(&request).iter().map(|r| r.index).collect();
        matched.sort_unstable();
        assert_eq!(matched, vec![0, 1, 2, 3]);

        assert!(engine.match_request(&request).is_some());
    }

    #[test]
    fn ties_across_tables_follow_declaration_order() {
        let storage = FakeStorage::new(vec![
            FakeRule::new(0, "x").shortcut(""),
            FakeRule::new(0, "example.org").pattern("||example.org^"),
        ]);
        let engine = NetworkEngine::create_sync(storage, Config::default());
        let request = Request::new("https://example.org/x.png", None, RequestType::IMAGE);

        let matched: Vec<_> = engine.match_all(&request).iter().map(|r| r.index).collect();
        assert_eq!(matched, vec![1, 0]);
        assert_eq!(engine.match_request(&request).unwrap().index, 0);
    }

    #[test]
    fn match_request_without_matches() {
        let engine = NetworkEngine::create_sync(storage(), Config::default());
        let request = Request::new("https://clean.net/", None, RequestType::DOCUMENT);
        assert!(engine.match_request(&request).is_none());
    }
}
