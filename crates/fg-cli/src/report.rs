//! JSON view of a matching result

use std::sync::Arc;

use serde::Serialize;

use fg_core::{MatchingResult, NetworkRuleOption, Request, RuleHandle};
use fg_rules::NetworkRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    None,
    Allow,
    Block,
    Redirect,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub url: String,
    pub source_hostname: String,
    pub third_party: bool,
    pub decision: Decision,
    pub basic_rule: Option<String>,
    pub document_rule: Option<String>,
    pub cosmetic_exception_rule: Option<String>,
    pub cosmetic_option: Vec<String>,
    pub popup_rule: Option<String>,
    pub csp: Vec<String>,
    pub cookie: Vec<String>,
    pub replace: Vec<String>,
    pub remove_param: Vec<String>,
    pub remove_header: Vec<String>,
    pub permissions: Vec<String>,
    pub stealth: Option<String>,
}

impl MatchReport {
    pub fn new(request: &Request, result: &MatchingResult<NetworkRule>) -> Self {
        let basic = result.get_basic_result();

        Self {
            url: request.url().to_string(),
            source_hostname: request.source_hostname().to_string(),
            third_party: request.is_third_party(),
            decision: decision(basic.as_deref()),
            basic_rule: basic.map(|rule| rule.text().to_string()),
            document_rule: result.document_rule().map(|rule| rule.text().to_string()),
            cosmetic_exception_rule: result.cosmetic_exception_rule().map(|rule| rule.text().to_string()),
            cosmetic_option: result
                .get_cosmetic_option()
                .iter_names()
                .map(|(name, _)| name.to_ascii_lowercase())
                .collect(),
            popup_rule: result.get_popup_rule().map(|rule| rule.text().to_string()),
            csp: texts(result.get_csp_rules()),
            cookie: texts(result.get_cookie_rules()),
            replace: texts(result.get_replace_rules()),
            remove_param: texts(result.get_remove_param_rules()),
            remove_header: texts(result.get_remove_header_rules()),
            permissions: texts(result.get_permissions_policy_rules()),
            stealth: result.get_stealth_rule(None).map(|rule| rule.text().to_string()),
        }
    }
}

fn texts(rules: Vec<Arc<NetworkRule>>) -> Vec<String> {
    rules.iter().map(|rule| rule.text().to_string()).collect()
}

pub fn decision(basic: Option<&NetworkRule>) -> Decision {
    match basic {
        None => Decision::None,
        Some(rule) if rule.is_allowlist() => Decision::Allow,
        Some(rule) if rule.options().intersects(NetworkRuleOption::REDIRECT | NetworkRuleOption::REDIRECT_RULE) => {
            Decision::Redirect
        }
        Some(_) => Decision::Block,
    }
}
