//! Network rule: parsed filter-list line implementing the core's rule handle

use std::fmt;

use fg_core::request::Request;
use fg_core::rule::{AdvancedModifier, RuleHandle};
use fg_core::types::{HttpMethod, NetworkRuleOption, RequestType, StorageIndex};

use crate::error::RuleSyntaxError;
use crate::parser::{
    hosts_file_domain, is_comment_line, is_cosmetic_rule, parse_options, split_rule_options, DomainEntry,
    ParsedOptions,
};
use crate::pattern::Pattern;

/// Modifiers that make an exception specific to a page.
const SPECIFIC_EXCEPTIONS: NetworkRuleOption = NetworkRuleOption::DOCUMENT_LEVEL.union(NetworkRuleOption::STEALTH);

#[derive(Debug, Clone)]
pub struct NetworkRule {
    text: String,
    index: StorageIndex,
    list_id: u16,
    allowlist: bool,
    pattern_text: String,
    pattern: Pattern,
    shortcut: String,
    options: NetworkRuleOption,
    permitted_types: RequestType,
    restricted_types: RequestType,
    permitted_methods: HttpMethod,
    restricted_methods: HttpMethod,
    permitted_domains: Vec<DomainEntry>,
    restricted_domains: Vec<DomainEntry>,
    permitted_domain_names: Vec<String>,
    restricted_domain_names: Vec<String>,
    advanced: Option<AdvancedModifier>,
    priority_weight: u32,
}

impl NetworkRule {
    /// Parse one filter-list line.
    ///
    /// Hosts-file lines (`0.0.0.0 example.org`) become `||example.org^`.
    pub fn parse(text: &str, index: StorageIndex, list_id: u16) -> Result<Self, RuleSyntaxError> {
        let line = text.trim();
        if line.is_empty() {
            return Err(RuleSyntaxError::Empty);
        }
        if is_comment_line(line) || is_cosmetic_rule(line) {
            return Err(RuleSyntaxError::NotNetworkRule);
        }

        let hosts_pattern = hosts_file_domain(line).map(|domain| format!("||{domain}^"));
        let line = hosts_pattern.as_deref().unwrap_or(line);

        let (allowlist, line) = match line.strip_prefix("@@") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, line),
        };

        let (pattern_part, options_text) = split_rule_options(line);
        let parsed = parse_options(options_text, allowlist)?;
        let pattern_text = pattern_part.trim();
        let match_case = parsed.options.contains(NetworkRuleOption::MATCH_CASE);
        let pattern = Pattern::parse(pattern_text, match_case)?;

        let matches_everything = pattern_text.trim_matches(|c| c == '*' || c == '|').is_empty();
        if matches_everything && !allowlist && parsed.permitted_domains.is_empty() && parsed.advanced.is_none() {
            return Err(RuleSyntaxError::TooWide);
        }

        let priority_weight = priority_weight(&parsed, allowlist);
        let shortcut = pattern.shortcut();

        Ok(Self {
            text: text.trim().to_string(),
            index,
            list_id,
            allowlist,
            pattern_text: pattern_text.to_string(),
            pattern,
            shortcut,
            options: parsed.options,
            permitted_types: parsed.permitted_types,
            restricted_types: parsed.restricted_types,
            permitted_methods: parsed.permitted_methods,
            restricted_methods: parsed.restricted_methods,
            permitted_domains: parsed.permitted_domains,
            restricted_domains: parsed.restricted_domains,
            permitted_domain_names: parsed.permitted_domain_names,
            restricted_domain_names: parsed.restricted_domain_names,
            advanced: parsed.advanced,
            priority_weight,
        })
    }

    pub fn list_id(&self) -> u16 {
        self.list_id
    }

    fn matches_party(&self, request: &Request) -> bool {
        if self.options.contains(NetworkRuleOption::THIRD_PARTY) {
            return request.is_third_party();
        }
        if self.options.contains(NetworkRuleOption::FIRST_PARTY) {
            return !request.is_third_party();
        }
        true
    }

    fn matches_method(&self, request: &Request) -> bool {
        match request.method() {
            Some(method) => {
                (self.permitted_methods.is_empty() || self.permitted_methods.intersects(method))
                    && !self.restricted_methods.intersects(method)
            }
            None => self.permitted_methods.is_empty(),
        }
    }

    fn matches_domains(&self, request: &Request) -> bool {
        let target = request.domain_target();

        if !self.permitted_domains.is_empty()
            && (target.is_empty() || !self.permitted_domains.iter().any(|entry| entry.matches(target)))
        {
            return false;
        }

        target.is_empty() || !self.restricted_domains.iter().any(|entry| entry.matches(target))
    }
}

/// Specificity score used to order rules of equal importance.
fn priority_weight(parsed: &ParsedOptions, allowlist: bool) -> u32 {
    let options = parsed.options;
    let mut weight = 1;

    let basic = [
        options.intersects(NetworkRuleOption::THIRD_PARTY | NetworkRuleOption::FIRST_PARTY),
        options.contains(NetworkRuleOption::MATCH_CASE),
        !parsed.permitted_methods.is_empty() || !parsed.restricted_methods.is_empty(),
        !parsed.restricted_domains.is_empty(),
        !parsed.restricted_types.is_empty(),
        options.contains(NetworkRuleOption::HEADER),
        options.contains(NetworkRuleOption::POPUP),
    ];
    weight += basic.iter().filter(|&&set| set).count() as u32;

    if parsed.explicit_types {
        let count = parsed.permitted_types.bits().count_ones().max(1);
        weight += 50 + 50 / count;
    }

    if !parsed.permitted_domains.is_empty() {
        weight += 100 + 100 / parsed.permitted_domains.len() as u32;
    }

    if options.intersects(NetworkRuleOption::REDIRECT | NetworkRuleOption::REDIRECT_RULE) {
        weight += 1_000;
    }

    if allowlist && options.intersects(SPECIFIC_EXCEPTIONS) {
        weight += 10_000;
    }

    if allowlist {
        weight += 100_000;
    }

    if options.contains(NetworkRuleOption::IMPORTANT) {
        weight += 1_000_000;
    }

    weight
}

impl RuleHandle for NetworkRule {
    fn matches(&self, request: &Request) -> bool {
        self.effective_request_types().intersects(request.request_type())
            && self.matches_party(request)
            && self.matches_method(request)
            && self.matches_domains(request)
            && self.pattern.matches(request.url(), request.url_lowercase())
    }

    fn pattern(&self) -> &str {
        &self.pattern_text
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
        self.priority_weight
    }

    fn advanced_modifier(&self) -> Option<&AdvancedModifier> {
        self.advanced.as_ref()
    }

    fn permitted_domains(&self) -> &[String] {
        &self.permitted_domain_names
    }

    fn restricted_domains(&self) -> &[String] {
        &self.restricted_domain_names
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

impl fmt::Display for NetworkRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
