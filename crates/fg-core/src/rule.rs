//! Rule handle and rule storage contracts
//!
//! The matching core never looks inside a rule beyond the accessors of
//! [`RuleHandle`]. Pattern compilation, option parsing and regex matching
//! belong to the rule implementation.

use std::sync::Arc;

use regex::Regex;

use crate::request::{HttpHeader, Request};
use crate::types::{NetworkRuleOption, RequestType, StorageIndex};

// =============================================================================
// Advanced Modifiers
// =============================================================================

/// Category of an advanced modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Csp,
    Cookie,
    Replace,
    RemoveParam,
    RemoveHeader,
    Permissions,
    Redirect,
    RedirectRule,
    Stealth,
    Header,
}

impl ModifierKind {
    /// Option bit a rule must carry for a modifier of this kind.
    pub fn option(self) -> NetworkRuleOption {
        match self {
            Self::Csp => NetworkRuleOption::CSP,
            Self::Cookie => NetworkRuleOption::COOKIE,
            Self::Replace => NetworkRuleOption::REPLACE,
            Self::RemoveParam => NetworkRuleOption::REMOVEPARAM,
            Self::RemoveHeader => NetworkRuleOption::REMOVEHEADER,
            Self::Permissions => NetworkRuleOption::PERMISSIONS,
            Self::Redirect => NetworkRuleOption::REDIRECT,
            Self::RedirectRule => NetworkRuleOption::REDIRECT_RULE,
            Self::Stealth => NetworkRuleOption::STEALTH,
            Self::Header => NetworkRuleOption::HEADER,
        }
    }
}

/// Value of a `$header` modifier.
#[derive(Debug, Clone)]
pub enum HeaderValue {
    Exact(String),
    Regex(Regex),
}

impl HeaderValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(value) => value,
            Self::Regex(regex) => regex.as_str(),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == value,
            Self::Regex(regex) => regex.is_match(value),
        }
    }
}

impl PartialEq for HeaderValue {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Exact(_), Self::Exact(_)) | (Self::Regex(_), Self::Regex(_))
        ) && self.as_str() == other.as_str()
    }
}

/// `$header=name[:value]` matcher over response headers.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMatcher {
    pub name: String,
    pub value: Option<HeaderValue>,
}

impl HeaderMatcher {
    /// True if any header has this name (case-insensitive) and, when a value
    /// is set, a matching value.
    pub fn matches(&self, headers: &[HttpHeader]) -> bool {
        headers.iter().any(|header| {
            header.name.eq_ignore_ascii_case(&self.name)
                && self.value.as_ref().map_or(true, |value| value.matches(&header.value))
        })
    }
}

/// Advanced modifier of a rule: its kind and value.
///
/// An empty value means "any" (e.g. `@@||example.org^$removeparam`).
#[derive(Debug, Clone, PartialEq)]
pub enum AdvancedModifier {
    Csp(String),
    Cookie(String),
    Replace(String),
    RemoveParam(String),
    RemoveHeader(String),
    Permissions(String),
    Redirect(String),
    RedirectRule(String),
    /// `$stealth` options; empty for a bare `$stealth`
    Stealth(Vec<String>),
    Header(HeaderMatcher),
}

impl AdvancedModifier {
    pub fn kind(&self) -> ModifierKind {
        match self {
            Self::Csp(_) => ModifierKind::Csp,
            Self::Cookie(_) => ModifierKind::Cookie,
            Self::Replace(_) => ModifierKind::Replace,
            Self::RemoveParam(_) => ModifierKind::RemoveParam,
            Self::RemoveHeader(_) => ModifierKind::RemoveHeader,
            Self::Permissions(_) => ModifierKind::Permissions,
            Self::Redirect(_) => ModifierKind::Redirect,
            Self::RedirectRule(_) => ModifierKind::RedirectRule,
            Self::Stealth(_) => ModifierKind::Stealth,
            Self::Header(_) => ModifierKind::Header,
        }
    }

    /// Grouping value used by conflict resolution.
    pub fn value(&self) -> &str {
        match self {
            Self::Csp(value)
            | Self::Cookie(value)
            | Self::Replace(value)
            | Self::RemoveParam(value)
            | Self::RemoveHeader(value)
            | Self::Permissions(value)
            | Self::Redirect(value)
            | Self::RedirectRule(value) => value,
            Self::Stealth(_) => "",
            Self::Header(matcher) => &matcher.name,
        }
    }
}

// =============================================================================
// Rule Handle
// =============================================================================

/// Narrow capability set the matching core consumes from a network rule.
pub trait RuleHandle {
    /// Whether the rule matches the request.
    fn matches(&self, request: &Request) -> bool;

    /// Pattern part of the rule text (between `@@` and `$`).
    fn pattern(&self) -> &str;

    /// Lowercase literal guaranteed to occur in every URL the rule matches.
    /// Empty when none could be extracted.
    fn shortcut(&self) -> &str;

    fn is_allowlist(&self) -> bool;

    fn options(&self) -> NetworkRuleOption;

    fn priority_weight(&self) -> u32;

    fn advanced_modifier(&self) -> Option<&AdvancedModifier>;

    fn permitted_domains(&self) -> &[String];

    fn restricted_domains(&self) -> &[String];

    /// Request types the rule is limited to; empty means all.
    fn permitted_request_types(&self) -> RequestType;

    fn restricted_request_types(&self) -> RequestType;

    /// Storage index the rule was loaded at.
    fn index(&self) -> StorageIndex;

    /// Original rule text, for logs.
    fn text(&self) -> &str;

    fn is_important(&self) -> bool {
        self.options().contains(NetworkRuleOption::IMPORTANT)
    }

    fn has_badfilter(&self) -> bool {
        self.options().contains(NetworkRuleOption::BADFILTER)
    }

    /// Types the rule applies to after negations.
    fn effective_request_types(&self) -> RequestType {
        let permitted = self.permitted_request_types();
        let base = if permitted.is_empty() { RequestType::ALL } else { permitted };
        base - self.restricted_request_types()
    }

    /// `$document`/`$urlblock` allowlist: the frame is not filtered at all.
    fn is_filtering_disabled(&self) -> bool {
        self.is_allowlist() && self.options().intersects(NetworkRuleOption::FILTERING_DISABLED)
    }

    /// Allowlist rule carrying any of the document-level modifiers.
    fn is_document_level_allowlist(&self) -> bool {
        self.is_allowlist() && self.options().intersects(NetworkRuleOption::DOCUMENT_LEVEL)
    }

    /// Priority comparison: importance, then weight, then allowlist over block.
    ///
    /// Strict, so among equals the rule seen first keeps winning.
    fn is_higher_priority(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        priority_key(self) > priority_key(other)
    }
}

fn priority_key<R: RuleHandle>(rule: &R) -> (bool, u32, bool) {
    (rule.is_important(), rule.priority_weight(), rule.is_allowlist())
}

// =============================================================================
// Rule Storage
// =============================================================================

/// Error type for rule storage lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("rule index {0} is out of range")]
    IndexOutOfRange(StorageIndex),
}

/// External store the lookup tables resolve indices through.
pub trait RuleStorage {
    type Rule: RuleHandle;

    /// Fetch the rule stored at `index`.
    fn retrieve_rule(&self, index: StorageIndex) -> Result<Arc<Self::Rule>, StorageError>;

    /// All network rules with their indices, in storage order.
    fn scan(&self) -> impl Iterator<Item = (StorageIndex, Arc<Self::Rule>)> + '_;
}
