//! Fake rule handles for unit tests of the matching core

use std::sync::Arc;

use crate::request::Request;
use crate::rule::{AdvancedModifier, RuleHandle, RuleStorage, StorageError};
use crate::types::{NetworkRuleOption, RequestType, StorageIndex};

/// Rule with every attribute set explicitly.
///
/// Matching is a plain substring test of `needle` against the lowercase
/// URL, optionally limited to third-party requests and permitted types.
#[derive(Debug, Clone)]
pub struct FakeRule {
    pub index: StorageIndex,
    pub text: String,
    pub pattern: String,
    pub shortcut: String,
    pub needle: String,
    pub allowlist: bool,
    pub options: NetworkRuleOption,
    pub weight: u32,
    pub modifier: Option<AdvancedModifier>,
    pub permitted_domains: Vec<String>,
    pub restricted_domains: Vec<String>,
    pub permitted_types: RequestType,
    pub restricted_types: RequestType,
}

impl FakeRule {
    pub fn new(index: StorageIndex, needle: &str) -> Self {
        Self {
            index,
            text: needle.to_string(),
            pattern: needle.to_string(),
            shortcut: needle.to_ascii_lowercase(),
            needle: needle.to_ascii_lowercase(),
            allowlist: false,
            options: NetworkRuleOption::empty(),
            weight: 1,
            modifier: None,
            permitted_domains: Vec::new(),
            restricted_domains: Vec::new(),
            permitted_types: RequestType::empty(),
            restricted_types: RequestType::empty(),
        }
    }

    pub fn allow(mut self) -> Self {
        self.allowlist = true;
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    pub fn shortcut(mut self, shortcut: &str) -> Self {
        self.shortcut = shortcut.to_string();
        self
    }

    pub fn options(mut self, options: NetworkRuleOption) -> Self {
        self.options |= options;
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn modifier(mut self, modifier: AdvancedModifier) -> Self {
        self.options |= modifier.kind().option();
        self.modifier = Some(modifier);
        self
    }

    pub fn domains(mut self, domains: &[&str]) -> Self {
        self.permitted_domains = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn types(mut self, types: RequestType) -> Self {
        self.permitted_types = types;
        self
    }

    pub fn build(self) -> Arc<FakeRule> {
        Arc::new(self)
    }
}

impl RuleHandle for FakeRule {
    fn matches(&self, request: &Request) -> bool {
        if !self.effective_request_types().intersects(request.request_type()) {
            return false;
        }
        if self.options.contains(NetworkRuleOption::THIRD_PARTY) && !request.is_third_party() {
            return false;
        }
        request.url_lowercase().contains(&self.needle)
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn shortcut(&self) -> &str {
        &self.shortcut
    }

    fn is_allowlist(&self) -> bool {
        self.allowlist
    }

    fn options(&self) -> NetworkRuleOption {
        self.options
    }

    fn priority_weight(&self) -> u32 {
        self.weight
    }

    fn advanced_modifier(&self) -> Option<&AdvancedModifier> {
        self.modifier.as_ref()
    }

    fn permitted_domains(&self) -> &[String] {
        &self.permitted_domains
    }

    fn restricted_domains(&self) -> &[String] {
        &self.restricted_domains
    }

    fn permitted_request_types(&self) -> RequestType {
        self.permitted_types
    }

    fn restricted_request_types(&self) -> RequestType {
        self.restricted_types
    }

    fn index(&self) -> StorageIndex {
        self.index
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// Vector-backed storage; the position is the index.
#[derive(Debug, Default)]
pub struct FakeStorage {
    pub rules: Vec<Arc<FakeRule>>,
}

impl FakeStorage {
    pub fn new(rules: Vec<FakeRule>) -> Self {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(i, mut rule)| {
                rule.index = i as StorageIndex;
                Arc::new(rule)
            })
            .collect();
        Self { rules }
    }
}

impl RuleStorage for FakeStorage {
    type Rule = FakeRule;

    fn retrieve_rule(&self, index: StorageIndex) -> Result<Arc<FakeRule>, StorageError> {
        self.rules
            .get(index as usize)
            .cloned()
            .ok_or(StorageError::IndexOutOfRange(index))
    }

    fn scan(&self) -> impl Iterator<Item = (StorageIndex, Arc<FakeRule>)> + '_ {
        self.rules.iter().map(|rule| (rule.index, Arc::clone(rule)))
    }
}
