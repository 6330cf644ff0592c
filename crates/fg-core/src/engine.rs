//! Engine: network engine plus a result cache

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::LruCache;
use crate::config::Config;
use crate::matching_result::MatchingResult;
use crate::network_engine::NetworkEngine;
use crate::request::Request;
use crate::rule::{RuleHandle, RuleStorage};
use crate::types::{HttpMethod, RequestType, StorageIndex};

/// Request identity the result cache is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultCacheKey {
    url: String,
    source_hostname: String,
    request_type: RequestType,
    method: Option<HttpMethod>,
    frame_rule: Option<StorageIndex>,
}

impl ResultCacheKey {
    fn new<R: RuleHandle>(request: &Request, frame_rule: Option<&Arc<R>>) -> Self {
        Self {
            url: request.url().to_string(),
            source_hostname: request.source_hostname().to_string(),
            request_type: request.request_type(),
            method: request.method(),
            frame_rule: frame_rule.map(|rule| rule.index()),
        }
    }
}

type ResultCache<R> = LruCache<ResultCacheKey, Arc<MatchingResult<R>>>;

/// Entry point for hosts: matches requests and caches the results.
///
/// The network engine is immutable after construction; only the cache is
/// locked, so one engine can serve many threads.
pub struct Engine<S: RuleStorage> {
    network_engine: NetworkEngine<S>,
    result_cache: Mutex<ResultCache<S::Rule>>,
}

impl<S: RuleStorage> Engine<S> {
    /// Index every rule of `storage` and set up the cache.
    pub fn new(storage: S, config: Config) -> Self {
        Self::from_network_engine(NetworkEngine::create_sync(storage, config))
    }

    /// Wrap an engine built with one of the cooperative loaders.
    pub fn from_network_engine(network_engine: NetworkEngine<S>) -> Self {
        let cache_size = network_engine.config().result_cache_size;
        Self {
            network_engine,
            result_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// Resolve a request, consulting the cache first.
    ///
    /// `frame_rule` is the document-level rule of the frame the request was
    /// made from, as returned by [`Engine::match_frame`].
    pub fn match_request(&self, request: &Request, frame_rule: Option<Arc<S::Rule>>) -> Arc<MatchingResult<S::Rule>> {
        let key = ResultCacheKey::new(request, frame_rule.as_ref());
        if let Some(cached) = self.cache().get(&key) {
            return cached;
        }

        let rules = self.network_engine.match_all(request);
        let result = Arc::new(MatchingResult::new(rules, frame_rule, self.network_engine.config()));
        self.cache().insert(key, Arc::clone(&result));
        result
    }

    /// Document-level rule for a frame: a `$document`-style exception when
    /// the frame URL is allowlisted as a whole, else its cosmetic exception.
    pub fn match_frame(&self, frame_url: &str) -> Option<Arc<S::Rule>> {
        let request = Request::new(frame_url, None, RequestType::DOCUMENT);
        let rules = self.network_engine.match_all(&request);
        let result = MatchingResult::new(rules, None, self.network_engine.config());

        match result.basic_rule() {
            Some(rule) if rule.is_document_level_allowlist() => Some(Arc::clone(rule)),
            _ => result.cosmetic_exception_rule().cloned(),
        }
    }

    pub fn rules_count(&self) -> usize {
        self.network_engine.rules_count()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    pub fn network_engine(&self) -> &NetworkEngine<S> {
        &self.network_engine
    }

    fn cache(&self) -> MutexGuard<'_, ResultCache<S::Rule>> {
        // Entries are inserted whole, so a poisoned cache is still consistent
        self.result_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: RuleStorage> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("network_engine", &self.network_engine)
            .field("cached_results", &self.cache().len())
            .finish()
    }
}
