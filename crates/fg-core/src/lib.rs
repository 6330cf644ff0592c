//! FilterGate Core Library
//!
//! This crate provides the request-matching core of the FilterGate content
//! blocker: given the network rules of the loaded filter lists and one
//! request, it decides whether the request is blocked and which modifiers
//! (CSP, cookies, removeparam, redirects, cosmetic exceptions...) apply.
//!
//! # Architecture
//!
//! Rules live in an external [`RuleStorage`] and are seen through the narrow
//! [`RuleHandle`] trait. The [`NetworkEngine`] indexes every rule into exactly
//! one of four lookup tables; a request collects the matching rules from all
//! of them, and [`MatchingResult`] resolves the conflicts between those rules.
//! [`Engine`] adds a result cache and frame-level rule lookup on top.
//!
//! # Modules
//!
//! - `types`: Shared bit sets (request types, methods, rule options, cosmetic options)
//! - `hash`: Murmur3 hash used for lookup buckets
//! - `psl`: Registrable domain and subdomain ladder
//! - `url`: Fast URL parsing without allocations
//! - `request`: Normalized request
//! - `rule`: Rule handle and rule storage contracts
//! - `lookup`: The four lookup tables
//! - `network_engine`: Rule routing and matching
//! - `matching_result`: Conflict resolution
//! - `engine`: Cached orchestrator
//! - `config`: Engine configuration
//! - `cache`: LRU cache behind the engine

pub mod cache;
pub mod config;
pub mod engine;
pub mod hash;
pub mod lookup;
pub mod matching_result;
pub mod network_engine;
pub mod psl;
pub mod request;
pub mod rule;
pub mod types;
pub mod url;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{CompatibilityTypes, Config, ConfigError};
pub use engine::Engine;
pub use lookup::{LookupTable, LookupTableKind};
pub use matching_result::MatchingResult;
pub use network_engine::{NetworkEngine, TableCounts};
pub use psl::{get_etld1, is_third_party};
pub use request::{HttpHeader, Request};
pub use rule::{AdvancedModifier, HeaderMatcher, HeaderValue, ModifierKind, RuleHandle, RuleStorage, StorageError};
pub use types::{CosmeticOption, HttpMethod, NetworkRuleOption, RequestType, StorageIndex};
