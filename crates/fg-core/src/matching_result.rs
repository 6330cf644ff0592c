//! Conflict resolution between matching rules
//!
//! A request usually matches several rules at once: block rules, exceptions,
//! rules that only tweak headers or cookies, cosmetic exceptions inherited
//! from the frame. [`MatchingResult`] sorts them into categories once and
//! answers one question per category through its getters.
//!
//! Resolution order:
//!
//! 1. `$badfilter` rules remove the rules they negate, then drop out.
//! 2. Rules are routed: advanced modifiers go to their category list,
//!    cosmetic-only exceptions become cosmetic candidates, `$popup` rules
//!    compete separately, everything else competes for the basic decision.
//! 3. A `$document`/`$urlblock` frame rule replaces the basic decision unless
//!    the latter has strictly higher priority.
//! 4. The most restrictive cosmetic exception is picked.
//!
//! Category lists are resolved lazily in the getters.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::request::HttpHeader;
use crate::rule::{AdvancedModifier, ModifierKind, RuleHandle};
use crate::types::{CosmeticOption, NetworkRuleOption};

/// Outcome of matching one request against the rule set.
#[derive(Debug)]
pub struct MatchingResult<R> {
    basic_rule: Option<Arc<R>>,
    document_rule: Option<Arc<R>>,
    cosmetic_exception_rule: Option<Arc<R>>,
    popup_rule: Option<Arc<R>>,
    /// A `$content` exception applies to this request
    content_allowlisted: bool,

    csp_rules: Vec<Arc<R>>,
    cookie_rules: Vec<Arc<R>>,
    replace_rules: Vec<Arc<R>>,
    remove_param_rules: Vec<Arc<R>>,
    remove_header_rules: Vec<Arc<R>>,
    permissions_rules: Vec<Arc<R>>,
    header_rules: Vec<Arc<R>>,
    redirect_rules: Vec<Arc<R>>,
    stealth_rules: Vec<Arc<R>>,
}

impl<R: RuleHandle> MatchingResult<R> {
    /// Resolve the rules matching a request.
    ///
    /// `document_rule` is the frame-level rule of the page the request
    /// belongs to, if any (see `Engine::match_frame`).
    pub fn new(rules: Vec<Arc<R>>, document_rule: Option<Arc<R>>, config: &Config) -> Self {
        let mut result = Self::empty(document_rule);
        let mut rules = remove_badfiltered(rules);
        // Equal-priority ties go to the rule declared first
        rules.sort_by_key(|rule| rule.index());

        let genericblock = result.document_rule.as_ref().is_some_and(|rule| {
            rule.is_allowlist() && rule.options().contains(NetworkRuleOption::GENERICBLOCK)
        });

        let mut cosmetic_candidates = Vec::new();
        let mut basic: Option<Arc<R>> = None;

        for rule in rules {
            let options = rule.options();

            if options.intersects(NetworkRuleOption::ADVANCED) {
                result.route_advanced(rule, config);
                continue;
            }

            if rule.is_allowlist()
                && options.intersects(NetworkRuleOption::COSMETIC_EXCEPTIONS)
                && !options.intersects(NetworkRuleOption::FILTERING_DISABLED)
            {
                cosmetic_candidates.push(rule);
                continue;
            }

            if options.contains(NetworkRuleOption::POPUP) {
                keep_higher(&mut result.popup_rule, rule);
                continue;
            }

            // $genericblock disables block rules not bound to a domain
            if genericblock && !rule.is_allowlist() && rule.permitted_domains().is_empty() {
                continue;
            }

            keep_higher(&mut basic, rule);
        }

        if let Some(document) = &result.document_rule {
            if document.is_filtering_disabled() {
                let basic_wins = basic.as_ref().is_some_and(|b| b.is_higher_priority(document));
                if !basic_wins {
                    basic = Some(Arc::clone(document));
                }
            }
        }
        result.basic_rule = basic;

        result.content_allowlisted = result
            .document_rule
            .iter()
            .chain(result.basic_rule.iter())
            .chain(cosmetic_candidates.iter())
            .any(|rule| rule.is_allowlist() && rule.options().contains(NetworkRuleOption::CONTENT));

        result.cosmetic_exception_rule = result.pick_cosmetic_exception(&cosmetic_candidates);
        result
    }

    fn empty(document_rule: Option<Arc<R>>) -> Self {
        Self {
            basic_rule: None,
            document_rule,
            cosmetic_exception_rule: None,
            popup_rule: None,
            content_allowlisted: false,
            csp_rules: Vec::new(),
            cookie_rules: Vec::new(),
            replace_rules: Vec::new(),
            remove_param_rules: Vec::new(),
            remove_header_rules: Vec::new(),
            permissions_rules: Vec::new(),
            header_rules: Vec::new(),
            redirect_rules: Vec::new(),
            stealth_rules: Vec::new(),
        }
    }

    fn route_advanced(&mut self, rule: Arc<R>, config: &Config) {
        let Some(kind) = rule.advanced_modifier().map(AdvancedModifier::kind) else {
            log::debug!("Rule without advanced modifier value ignored: {}", rule.text());
            return;
        };
        if !rule.options().contains(kind.option()) {
            log::debug!("Rule modifier {kind:?} not declared in options, ignored: {}", rule.text());
            return;
        }

        let list = match kind {
            ModifierKind::Csp => &mut self.csp_rules,
            ModifierKind::Cookie => &mut self.cookie_rules,
            ModifierKind::Replace => {
                if !config.supports_replace() {
                    log::debug!("$replace unsupported on {:?}: {}", config.compatibility, rule.text());
                    return;
                }
                &mut self.replace_rules
            }
            ModifierKind::RemoveParam => &mut self.remove_param_rules,
            ModifierKind::RemoveHeader => &mut self.remove_header_rules,
            ModifierKind::Permissions => &mut self.permissions_rules,
            ModifierKind::Header => &mut self.header_rules,
            ModifierKind::Redirect | ModifierKind::RedirectRule => &mut self.redirect_rules,
            ModifierKind::Stealth => {
                if !rule.is_allowlist() {
                    log::debug!("$stealth is exception-only, ignored: {}", rule.text());
                    return;
                }
                &mut self.stealth_rules
            }
        };
        list.push(rule);
    }

    /// Most restrictive cosmetic exception among the document rule, the basic
    /// rule and the cosmetic candidates. Importance plays no part.
    fn pick_cosmetic_exception(&self, candidates: &[Arc<R>]) -> Option<Arc<R>> {
        let mut best: Option<(&Arc<R>, u32)> = None;

        let allowlisted = self
            .document_rule
            .iter()
            .chain(self.basic_rule.iter())
            .filter(|rule| rule.is_allowlist());

        for rule in allowlisted.chain(candidates.iter()) {
            let mask = CosmeticOption::ALL.narrowed_by(rule.options());
            if mask == CosmeticOption::ALL {
                continue;
            }
            let remaining = mask.bits().count_ones();
            if best.map_or(true, |(_, fewest)| remaining < fewest) {
                best = Some((rule, remaining));
            }
        }

        best.map(|(rule, _)| Arc::clone(rule))
    }

    fn is_filtering_disabled(&self) -> bool {
        self.basic_rule.as_ref().is_some_and(|rule| rule.is_filtering_disabled())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// The rule deciding whether the request is blocked, with redirects
    /// folded in.
    ///
    /// A block rule is replaced by a redirect when one applies; an
    /// exception only yields to an absolute `$redirect` of strictly higher
    /// priority. `None` means no opinion.
    pub fn get_basic_result(&self) -> Option<Arc<R>> {
        match &self.basic_rule {
            None => self.redirect_rule(false),
            Some(basic) if basic.is_allowlist() => match self.redirect_rule(false) {
                Some(redirect) if redirect.is_higher_priority(basic) => Some(redirect),
                _ => Some(Arc::clone(basic)),
            },
            Some(basic) => self.redirect_rule(true).or_else(|| Some(Arc::clone(basic))),
        }
    }

    /// Highest-priority surviving redirect. `$redirect-rule` only counts when
    /// `allow_conditional` is set, i.e. when something else already blocks.
    fn redirect_rule(&self, allow_conditional: bool) -> Option<Arc<R>> {
        let mut absolute: Option<Arc<R>> = None;
        let mut conditional: Option<Arc<R>> = None;

        for rule in filter_advanced_rules(&self.redirect_rules, str::eq) {
            if rule.is_allowlist() {
                continue;
            }
            match rule.advanced_modifier().map(AdvancedModifier::kind) {
                Some(ModifierKind::Redirect) => keep_higher(&mut absolute, rule),
                Some(ModifierKind::RedirectRule) => keep_higher(&mut conditional, rule),
                _ => {}
            }
        }

        absolute.or(if allow_conditional { conditional } else { None })
    }

    /// The basic result if it blocks the whole document.
    pub fn get_document_blocking_result(&self) -> Option<Arc<R>> {
        let basic = self.basic_rule.as_ref()?;
        let blocks_document = !basic.is_allowlist()
            && (basic.options().contains(NetworkRuleOption::DOCUMENT)
                || basic.permitted_request_types().contains(crate::types::RequestType::DOCUMENT));
        blocks_document.then(|| Arc::clone(basic))
    }

    /// Cosmetic capabilities left to the page.
    pub fn get_cosmetic_option(&self) -> CosmeticOption {
        self.cosmetic_exception_rule
            .as_ref()
            .map_or(CosmeticOption::ALL, |rule| CosmeticOption::ALL.narrowed_by(rule.options()))
    }

    pub fn get_csp_rules(&self) -> Vec<Arc<R>> {
        self.category(&self.csp_rules, str::eq)
    }

    pub fn get_cookie_rules(&self) -> Vec<Arc<R>> {
        self.category(&self.cookie_rules, str::eq)
    }

    /// Empty when a `$content` exception applies.
    pub fn get_replace_rules(&self) -> Vec<Arc<R>> {
        if self.content_allowlisted {
            return Vec::new();
        }
        self.category(&self.replace_rules, str::eq)
    }

    pub fn get_remove_param_rules(&self) -> Vec<Arc<R>> {
        self.category(&self.remove_param_rules, str::eq)
    }

    pub fn get_remove_header_rules(&self) -> Vec<Arc<R>> {
        self.category(&self.remove_header_rules, str::eq_ignore_ascii_case)
    }

    pub fn get_permissions_policy_rules(&self) -> Vec<Arc<R>> {
        self.category(&self.permissions_rules, str::eq_ignore_ascii_case)
    }

    fn category(&self, rules: &[Arc<R>], same_value: fn(&str, &str) -> bool) -> Vec<Arc<R>> {
        if self.is_filtering_disabled() {
            return Vec::new();
        }
        filter_advanced_rules(rules, same_value)
    }

    /// `$stealth` exception covering `option`, or a bare `$stealth` rule.
    ///
    /// With no option name only a bare rule qualifies.
    pub fn get_stealth_rule(&self, option: Option<&str>) -> Option<Arc<R>> {
        if let Some(name) = option {
            let explicit = self
                .stealth_rules
                .iter()
                .find(|rule| stealth_options::<R>(rule).iter().any(|o| o == name));
            if let Some(rule) = explicit {
                return Some(Arc::clone(rule));
            }
        }

        self.stealth_rules
            .iter()
            .find(|rule| stealth_options::<R>(rule).is_empty())
            .cloned()
    }

    /// Winner among `$popup` rules, decided apart from the basic result.
    pub fn get_popup_rule(&self) -> Option<Arc<R>> {
        self.popup_rule.clone()
    }

    /// Highest-priority `$header` rule matching the response headers.
    ///
    /// The returned rule may be an exception; callers block only on a block
    /// rule.
    pub fn get_response_headers_result(&self, headers: &[HttpHeader]) -> Option<Arc<R>> {
        if headers.is_empty() || self.is_filtering_disabled() {
            return None;
        }

        let mut best: Option<Arc<R>> = None;
        for rule in &self.header_rules {
            let matches = match rule.advanced_modifier() {
                Some(AdvancedModifier::Header(matcher)) => matcher.matches(headers),
                _ => false,
            };
            if matches {
                keep_higher(&mut best, Arc::clone(rule));
            }
        }
        best
    }

    pub fn basic_rule(&self) -> Option<&Arc<R>> {
        self.basic_rule.as_ref()
    }

    pub fn document_rule(&self) -> Option<&Arc<R>> {
        self.document_rule.as_ref()
    }

    pub fn cosmetic_exception_rule(&self) -> Option<&Arc<R>> {
        self.cosmetic_exception_rule.as_ref()
    }
}

/// Replace `slot` with `rule` if the slot is empty or `rule` ranks strictly
/// higher, so the earliest of equal rules stays.
fn keep_higher<R: RuleHandle>(slot: &mut Option<Arc<R>>, rule: Arc<R>) {
    let replace = match slot {
        None => true,
        Some(current) => rule.is_higher_priority(current),
    };
    if replace {
        *slot = Some(rule);
    }
}

// =============================================================================
// Badfilter
// =============================================================================

fn remove_badfiltered<R: RuleHandle>(rules: Vec<Arc<R>>) -> Vec<Arc<R>> {
    let (badfilters, rules): (Vec<_>, Vec<_>) = rules.into_iter().partition(|rule| rule.has_badfilter());
    if badfilters.is_empty() {
        return rules;
    }

    rules
        .into_iter()
        .filter(|rule| !badfilters.iter().any(|badfilter| negates::<R>(badfilter, rule)))
        .collect()
}

/// Whether `badfilter` cancels `rule`: identical apart from `$badfilter`,
/// except that `rule` may be permitted on more domains.
fn negates<R: RuleHandle>(badfilter: &R, rule: &R) -> bool {
    badfilter.is_allowlist() == rule.is_allowlist()
        && badfilter.pattern() == rule.pattern()
        && badfilter.options() - NetworkRuleOption::BADFILTER == rule.options()
        && badfilter.permitted_request_types() == rule.permitted_request_types()
        && badfilter.restricted_request_types() == rule.restricted_request_types()
        && badfilter.advanced_modifier() == rule.advanced_modifier()
        && same_set(badfilter.restricted_domains(), rule.restricted_domains())
        && covers_domains(rule.permitted_domains(), badfilter.permitted_domains())
}

fn same_set(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

/// `domains` contains every entry of `required`. An unrestricted badfilter
/// only cancels unrestricted rules.
fn covers_domains(domains: &[String], required: &[String]) -> bool {
    if required.is_empty() {
        return domains.is_empty();
    }
    required.iter().all(|d| domains.contains(d))
}

// =============================================================================
// Advanced categories
// =============================================================================

/// Explicit `$stealth` options of a rule; empty for a bare `$stealth`.
fn stealth_options<R: RuleHandle>(rule: &R) -> &[String] {
    match rule.advanced_modifier() {
        Some(AdvancedModifier::Stealth(options)) => options,
        _ => &[],
    }
}

fn modifier_value<R: RuleHandle>(rule: &R) -> &str {
    rule.advanced_modifier().map_or("", AdvancedModifier::value)
}

/// Whether exception `allow` may cancel block rule `block`.
fn can_cancel<R: RuleHandle>(allow: &R, block: &R) -> bool {
    if block.is_important() && !allow.is_important() {
        return false;
    }
    allow
        .effective_request_types()
        .intersects(block.effective_request_types())
}

/// Resolve one category list.
///
/// Each block rule is either kept or replaced by the exception cancelling it:
/// a value-less exception cancels any block rule, a valued one only block
/// rules with the same value. Exceptions with nothing to cancel are dropped.
fn filter_advanced_rules<R: RuleHandle>(rules: &[Arc<R>], same_value: fn(&str, &str) -> bool) -> Vec<Arc<R>> {
    let (allows, blocks): (Vec<&Arc<R>>, Vec<&Arc<R>>) = rules.iter().partition(|rule| rule.is_allowlist());
    if blocks.is_empty() {
        return Vec::new();
    }
    if allows.is_empty() {
        return blocks.into_iter().cloned().collect();
    }

    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for block in blocks {
        let value = modifier_value::<R>(block);
        let cancelling = allows
            .iter()
            .copied()
            .find(|allow| modifier_value::<R>(allow).is_empty() && can_cancel::<R>(allow, block))
            .or_else(|| {
                allows.iter().copied().find(|allow| {
                    same_value(modifier_value::<R>(allow), value) && can_cancel::<R>(allow, block)
                })
            });

        let chosen = cancelling.unwrap_or(block);
        if seen.insert(chosen.index()) {
            result.push(Arc::clone(chosen));
        }
    }

    result
}
