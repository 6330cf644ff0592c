//! Filter-list line and modifier parsing

use std::net::IpAddr;

use regex::Regex;

use fg_core::rule::{AdvancedModifier, HeaderMatcher, HeaderValue};
use fg_core::types::{HttpMethod, NetworkRuleOption, RequestType};

use crate::error::RuleSyntaxError;

/// One `$domain=` entry.
#[derive(Debug, Clone)]
pub enum DomainEntry {
    /// `example.org`, also matching its subdomains
    Plain(String),
    /// `example.*`, stored as `example.`
    WildcardTld(String),
    /// `/regex/`
    Regex(Regex),
}

impl DomainEntry {
    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            Self::Plain(domain) => {
                hostname == domain
                    || (hostname.len() > domain.len()
                        && hostname.ends_with(domain.as_str())
                        && hostname.as_bytes()[hostname.len() - domain.len() - 1] == b'.')
            }
            Self::WildcardTld(prefix) => {
                let mut current = Some(hostname);
                while let Some(host) = current {
                    if host.starts_with(prefix.as_str()) && fg_core::psl::get_etld1(host) == host {
                        return true;
                    }
                    current = fg_core::psl::get_parent_domain(host);
                }
                false
            }
            Self::Regex(regex) => regex.is_match(hostname),
        }
    }
}

/// Modifiers of a rule, as parsed from its `$` part.
#[derive(Debug, Clone, Default)]
pub struct ParsedOptions {
    pub options: NetworkRuleOption,
    pub permitted_types: RequestType,
    pub restricted_types: RequestType,
    /// Whether any type was named positively
    pub explicit_types: bool,
    pub permitted_methods: HttpMethod,
    pub restricted_methods: HttpMethod,
    pub permitted_domains: Vec<DomainEntry>,
    pub restricted_domains: Vec<DomainEntry>,
    /// Raw `$domain` entries, for comparisons and routing
    pub permitted_domain_names: Vec<String>,
    pub restricted_domain_names: Vec<String>,
    pub advanced: Option<AdvancedModifier>,
}

pub fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || (line.starts_with('#') && !line.starts_with("#@#"))
}

/// Element hiding, scriptlet and HTML filtering rules.
pub fn is_cosmetic_rule(line: &str) -> bool {
    const MARKERS: &[&str] = &["##", "#@#", "#?#", "#@?#", "#$#", "#@$#", "#%#", "#@%#", "$$", "$@$"];
    MARKERS.iter().any(|marker| line.contains(marker))
}

/// Domain of a hosts-file line (`0.0.0.0 example.org`).
pub fn hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_ok() {
        return normalize_domain(second);
    }

    None
}

/// Split a rule into its pattern and options at the modifier `$`.
///
/// For `/regex/` patterns the separator is the first unescaped `$` right
/// after a slash, so `$` inside the expression stays part of it; otherwise
/// the first unescaped `$`.
pub fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let is_escaped = |i: usize| i > 0 && bytes[i - 1] == b'\\';

    if line.starts_with('/') {
        for i in 2..bytes.len() {
            if bytes[i] == b'$' && bytes[i - 1] == b'/' && !is_escaped(i - 1) {
                return (&line[..i], Some(&line[i + 1..]));
            }
        }
        if line.len() > 2 && line.ends_with('/') {
            return (line, None);
        }
    }

    match (0..bytes.len()).find(|&i| bytes[i] == b'$' && !is_escaped(i)) {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Split the options text on unescaped commas, unescaping `\,`.
fn split_options(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    parts.into_iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

pub fn parse_options(text: Option<&str>, allowlist: bool) -> Result<ParsedOptions, RuleSyntaxError> {
    let mut parsed = ParsedOptions::default();
    let Some(text) = text else {
        return Ok(parsed);
    };

    for raw in split_options(text) {
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => (name.trim().to_ascii_lowercase(), Some(value.trim())),
            None => (raw.to_ascii_lowercase(), None),
        };
        let (negated, name) = match name.strip_prefix('~') {
            Some(rest) => (true, rest.to_string()),
            None => (false, name),
        };

        match (name.as_str(), negated) {
            ("important", false) => parsed.options |= NetworkRuleOption::IMPORTANT,
            ("badfilter", false) => parsed.options |= NetworkRuleOption::BADFILTER,
            ("match-case", false) => parsed.options |= NetworkRuleOption::MATCH_CASE,
            ("popup", false) => parsed.options |= NetworkRuleOption::POPUP,
            ("third-party" | "3p", false) | ("first-party" | "1p", true) => {
                parsed.options |= NetworkRuleOption::THIRD_PARTY
            }
            ("third-party" | "3p", true) | ("first-party" | "1p", false) => {
                parsed.options |= NetworkRuleOption::FIRST_PARTY
            }
            ("domain", false) => {
                let value = value.ok_or(RuleSyntaxError::MissingValue("domain"))?;
                parse_domain_option(value, &mut parsed)?;
            }
            ("method", false) => {
                let value = value.ok_or(RuleSyntaxError::MissingValue("method"))?;
                parse_method_option(value, &mut parsed)?;
            }
            ("document" | "doc", false) => {
                parsed.options |= NetworkRuleOption::DOCUMENT;
                parsed.permitted_types |= RequestType::FRAMES;
            }
            ("document" | "doc", true) => parsed.restricted_types |= RequestType::DOCUMENT,
            (other, false) if exception_modifier(other).is_some() => {
                if let Some((option, label)) = exception_modifier(other) {
                    if !allowlist {
                        return Err(RuleSyntaxError::ExceptionOnly(label));
                    }
                    parsed.options |= option;
                }
            }
            (other, _) if request_type_mask(other).is_some() => {
                let mask = request_type_mask(other).unwrap_or(RequestType::empty());
                if negated {
                    parsed.restricted_types |= mask;
                } else {
                    parsed.permitted_types |= mask;
                    parsed.explicit_types = true;
                }
            }
            (other, false) if is_advanced_modifier(other) => {
                let modifier = parse_advanced(other, value.unwrap_or(""), allowlist)?;
                if let Some(existing) = &parsed.advanced {
                    return Err(RuleSyntaxError::ConflictingModifiers(
                        advanced_label_of(existing),
                        advanced_label_of(&modifier),
                    ));
                }
                parsed.options |= modifier.kind().option();
                parsed.advanced = Some(modifier);
            }
            _ => return Err(RuleSyntaxError::UnknownModifier(raw)),
        }
    }

    // Page-level modifiers apply to frames unless types were given
    let frame_level = NetworkRuleOption::DOCUMENT_LEVEL | NetworkRuleOption::COSMETIC_EXCEPTIONS | NetworkRuleOption::CSP;
    if parsed.permitted_types.is_empty() && parsed.options.intersects(frame_level) {
        parsed.permitted_types = RequestType::FRAMES;
    }

    if parsed.options.contains(NetworkRuleOption::THIRD_PARTY | NetworkRuleOption::FIRST_PARTY) {
        return Err(RuleSyntaxError::ConflictingModifiers("third-party", "first-party"));
    }
    if !parsed.permitted_types.is_empty() && (parsed.permitted_types - parsed.restricted_types).is_empty() {
        return Err(RuleSyntaxError::EmptyTypeMask);
    }
    if RequestType::ALL - parsed.restricted_types == RequestType::empty() {
        return Err(RuleSyntaxError::EmptyTypeMask);
    }

    Ok(parsed)
}

/// Exception-only modifiers and their canonical names.
fn exception_modifier(name: &str) -> Option<(NetworkRuleOption, &'static str)> {
    match name {
        "elemhide" | "ehide" => Some((NetworkRuleOption::ELEMHIDE, "elemhide")),
        "generichide" | "ghide" => Some((NetworkRuleOption::GENERICHIDE, "generichide")),
        "specifichide" | "shide" => Some((NetworkRuleOption::SPECIFICHIDE, "specifichide")),
        "genericblock" => Some((NetworkRuleOption::GENERICBLOCK, "genericblock")),
        "jsinject" => Some((NetworkRuleOption::JSINJECT, "jsinject")),
        "urlblock" => Some((NetworkRuleOption::URLBLOCK, "urlblock")),
        "content" => Some((NetworkRuleOption::CONTENT, "content")),
        _ => None,
    }
}

fn request_type_mask(name: &str) -> Option<RequestType> {
    match name {
        "script" => Some(RequestType::SCRIPT),
        "image" => Some(RequestType::IMAGE),
        "stylesheet" | "css" => Some(RequestType::STYLESHEET),
        "object" => Some(RequestType::OBJECT),
        "subdocument" | "frame" => Some(RequestType::SUBDOCUMENT),
        "xmlhttprequest" | "xhr" => Some(RequestType::XMLHTTPREQUEST),
        "media" => Some(RequestType::MEDIA),
        "font" => Some(RequestType::FONT),
        "websocket" => Some(RequestType::WEBSOCKET),
        "ping" => Some(RequestType::PING),
        "other" => Some(RequestType::OTHER),
        _ => None,
    }
}

fn is_advanced_modifier(name: &str) -> bool {
    matches!(
        name,
        "csp" | "cookie" | "replace" | "removeparam" | "removeheader" | "permissions" | "redirect" | "redirect-rule" | "stealth" | "header"
    )
}

fn advanced_label_of(modifier: &AdvancedModifier) -> &'static str {
    match modifier {
        AdvancedModifier::Csp(_) => "csp",
        AdvancedModifier::Cookie(_) => "cookie",
        AdvancedModifier::Replace(_) => "replace",
        AdvancedModifier::RemoveParam(_) => "removeparam",
        AdvancedModifier::RemoveHeader(_) => "removeheader",
        AdvancedModifier::Permissions(_) => "permissions",
        AdvancedModifier::Redirect(_) => "redirect",
        AdvancedModifier::RedirectRule(_) => "redirect-rule",
        AdvancedModifier::Stealth(_) => "stealth",
        AdvancedModifier::Header(_) => "header",
    }
}

/// Build an advanced modifier. Block rules need a value for the modifiers
/// whose action is undefined without one.
fn parse_advanced(name: &str, value: &str, allowlist: bool) -> Result<AdvancedModifier, RuleSyntaxError> {
    let required = |label: &'static str| {
        if value.is_empty() && !allowlist {
            Err(RuleSyntaxError::MissingValue(label))
        } else {
            Ok(value.to_string())
        }
    };

    let modifier = match name {
        "csp" => AdvancedModifier::Csp(required("csp")?),
        "cookie" => AdvancedModifier::Cookie(value.to_string()),
        "replace" => AdvancedModifier::Replace(required("replace")?),
        "removeparam" => AdvancedModifier::RemoveParam(value.to_string()),
        "removeheader" => AdvancedModifier::RemoveHeader(required("removeheader")?.to_ascii_lowercase()),
        "permissions" => AdvancedModifier::Permissions(required("permissions")?),
        "redirect" => AdvancedModifier::Redirect(required("redirect")?),
        "redirect-rule" => AdvancedModifier::RedirectRule(required("redirect-rule")?),
        "stealth" => {
            if !allowlist {
                return Err(RuleSyntaxError::ExceptionOnly("stealth"));
            }
            let options = value
                .split('|')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            AdvancedModifier::Stealth(options)
        }
        "header" => AdvancedModifier::Header(parse_header_option(value)?),
        _ => return Err(RuleSyntaxError::UnknownModifier(name.to_string())),
    };
    Ok(modifier)
}

/// `$header=name[:value]`, where value may be a `/regex/`.
fn parse_header_option(value: &str) -> Result<HeaderMatcher, RuleSyntaxError> {
    let (name, header_value) = match value.split_once(':') {
        Some((name, header_value)) => (name.trim(), Some(header_value.trim())),
        None => (value.trim(), None),
    };
    if name.is_empty() {
        return Err(RuleSyntaxError::MissingValue("header"));
    }

    let header_value = match header_value {
        None | Some("") => None,
        Some(v) if v.len() > 2 && v.starts_with('/') && v.ends_with('/') => {
            Some(HeaderValue::Regex(Regex::new(&v[1..v.len() - 1])?))
        }
        Some(v) => Some(HeaderValue::Exact(v.to_string())),
    };

    Ok(HeaderMatcher {
        name: name.to_ascii_lowercase(),
        value: header_value,
    })
}

fn parse_method_option(value: &str, parsed: &mut ParsedOptions) -> Result<(), RuleSyntaxError> {
    for raw in value.split('|').map(str::trim).filter(|m| !m.is_empty()) {
        let (negated, name) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let method = HttpMethod::parse_name(name).ok_or_else(|| RuleSyntaxError::InvalidValue {
            modifier: "method",
            value: raw.to_string(),
        })?;
        if negated {
            parsed.restricted_methods |= method;
        } else {
            parsed.permitted_methods |= method;
        }
    }

    if !parsed.permitted_methods.is_empty() && !parsed.restricted_methods.is_empty() {
        return Err(RuleSyntaxError::InvalidValue {
            modifier: "method",
            value: value.to_string(),
        });
    }
    Ok(())
}

fn parse_domain_option(value: &str, parsed: &mut ParsedOptions) -> Result<(), RuleSyntaxError> {
    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let entry = parse_domain_entry(domain_raw).ok_or_else(|| RuleSyntaxError::InvalidValue {
            modifier: "domain",
            value: raw.to_string(),
        })??;
        let name = match &entry {
            DomainEntry::Plain(domain) => domain.clone(),
            DomainEntry::WildcardTld(prefix) => format!("{prefix}*"),
            DomainEntry::Regex(_) => domain_raw.to_string(),
        };

        if is_exclude {
            parsed.restricted_domains.push(entry);
            parsed.restricted_domain_names.push(name);
        } else {
            parsed.permitted_domains.push(entry);
            parsed.permitted_domain_names.push(name);
        }
    }

    if parsed.permitted_domains.is_empty() && parsed.restricted_domains.is_empty() {
        return Err(RuleSyntaxError::MissingValue("domain"));
    }
    Ok(())
}

fn parse_domain_entry(raw: &str) -> Option<Result<DomainEntry, RuleSyntaxError>> {
    if raw.len() > 2 && raw.starts_with('/') && raw.ends_with('/') {
        return Some(Regex::new(&raw[1..raw.len() - 1]).map(DomainEntry::Regex).map_err(Into::into));
    }
    if let Some(prefix) = raw.strip_suffix(".*") {
        let prefix = normalize_domain(prefix)?;
        return Some(Ok(DomainEntry::WildcardTld(format!("{prefix}."))));
    }
    normalize_domain(raw).map(|domain| Ok(DomainEntry::Plain(domain)))
}

pub fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rule_options() {
        assert_eq!(split_rule_options("||example.org^$image"), ("||example.org^", Some("image")));
        assert_eq!(split_rule_options("||example.org^"), ("||example.org^", None));
        assert_eq!(split_rule_options(r"/ads\$/$script"), (r"/ads\$/", Some("script")));
        assert_eq!(split_rule_options("/ads$/"), ("/ads$/", None));
        assert_eq!(split_rule_options(r"/a\/$b/$image"), (r"/a\/$b/", Some("image")));
        assert_eq!(split_rule_options(r"/path\$x"), (r"/path\$x", None));
        assert_eq!(split_rule_options("/banner$image"), ("/banner", Some("image")));
    }

    #[test]
    fn test_split_options_unescapes_commas() {
        assert_eq!(split_options(r"csp=a\, b,image"), vec!["csp=a, b", "image"]);
        assert_eq!(split_options(" script , ,important"), vec!["script", "important"]);
    }

    #[test]
    fn test_types_and_party() {
        let parsed = parse_options(Some("script,~image,third-party"), false).unwrap();
        assert_eq!(parsed.permitted_types, RequestType::SCRIPT);
        assert_eq!(parsed.restricted_types, RequestType::IMAGE);
        assert!(parsed.options.contains(NetworkRuleOption::THIRD_PARTY));

        let parsed = parse_options(Some("~third-party"), false).unwrap();
        assert!(parsed.options.contains(NetworkRuleOption::FIRST_PARTY));

        assert_eq!(parse_options(Some("script,~script"), false).unwrap_err(), RuleSyntaxError::EmptyTypeMask);
    }

    #[test]
    fn test_domain_option() {
        let parsed = parse_options(Some("domain=Example.org|~sub.example.org|example.*|/news\\d/"), false).unwrap();
        assert_eq!(parsed.permitted_domain_names, vec!["example.org", "example.*", "/news\\d/"]);
        assert_eq!(parsed.restricted_domain_names, vec!["sub.example.org"]);

        assert!(parsed.permitted_domains[0].matches("www.example.org"));
        assert!(!parsed.permitted_domains[0].matches("notexample.org"));
        assert!(parsed.permitted_domains[1].matches("example.co.uk"));
        assert!(parsed.permitted_domains[1].matches("www.example.de"));
        assert!(!parsed.permitted_domains[1].matches("example.evil.com"));
        assert!(parsed.permitted_domains[2].matches("news1.com"));

        assert!(parse_options(Some("domain="), false).is_err());
        assert!(parse_options(Some("domain=exa mple.org"), false).is_err());
    }

    #[test]
    fn test_method_option() {
        let parsed = parse_options(Some("method=get|POST"), false).unwrap();
        assert_eq!(parsed.permitted_methods, HttpMethod::GET | HttpMethod::POST);
        assert!(parse_options(Some("method=get|~post"), false).is_err());
        assert!(parse_options(Some("method=fetch"), false).is_err());
    }

    #[test]
    fn test_exception_only_modifiers() {
        let parsed = parse_options(Some("elemhide,jsinject"), true).unwrap();
        assert_eq!(parsed.options, NetworkRuleOption::ELEMHIDE | NetworkRuleOption::JSINJECT);
        assert_eq!(
            parse_options(Some("generichide"), false).unwrap_err(),
            RuleSyntaxError::ExceptionOnly("generichide")
        );
    }

    #[test]
    fn test_advanced_modifiers() {
        let parsed = parse_options(Some("removeparam=utm_source"), false).unwrap();
        assert_eq!(parsed.advanced, Some(AdvancedModifier::RemoveParam("utm_source".into())));
        assert!(parsed.options.contains(NetworkRuleOption::REMOVEPARAM));

        let parsed = parse_options(Some("stealth=ip|Referrer"), true).unwrap();
        assert_eq!(
            parsed.advanced,
            Some(AdvancedModifier::Stealth(vec!["ip".into(), "referrer".into()]))
        );

        assert_eq!(parse_options(Some("redirect"), false).unwrap_err(), RuleSyntaxError::MissingValue("redirect"));
        assert!(parse_options(Some("redirect"), true).is_ok());
        assert_eq!(
            parse_options(Some("csp=a,cookie"), false).unwrap_err(),
            RuleSyntaxError::ConflictingModifiers("csp", "cookie")
        );
    }

    #[test]
    fn test_header_option() {
        let parsed = parse_options(Some("header=Server:/^track/"), false).unwrap();
        let Some(AdvancedModifier::Header(matcher)) = parsed.advanced else {
            panic!("expected header modifier");
        };
        assert_eq!(matcher.name, "server");
        assert!(matches!(matcher.value, Some(HeaderValue::Regex(_))));
    }

    #[test]
    fn test_unknown_modifier() {
        assert_eq!(
            parse_options(Some("frobnicate"), false).unwrap_err(),
            RuleSyntaxError::UnknownModifier("frobnicate".into())
        );
    }

    #[test]
    fn test_cosmetic_and_hosts_lines() {
        assert!(is_cosmetic_rule("example.org##.ad"));
        assert!(is_cosmetic_rule("example.org#@#.ad"));
        assert!(!is_cosmetic_rule("||example.org^"));
        assert!(is_comment_line("! comment"));
        assert!(is_comment_line("[Adblock Plus 2.0]"));
        assert_eq!(hosts_file_domain("0.0.0.0 Ads.Example.org"), Some("ads.example.org".into()));
        assert_eq!(hosts_file_domain("||example.org^"), None);
    }
}
