//! Matching with a loaded public suffix list
//!
//! Kept in its own test binary: the list is process-wide.

use fg_core::{psl, Config, Engine, Request, RequestType, RuleHandle};
use fg_rules::RuleStore;

const SUFFIXES: &str = "\
// ===BEGIN ICANN DOMAINS===
com
org
sg
com.sg
io
// ===END ICANN DOMAINS===
// ===BEGIN PRIVATE DOMAINS===
github.io
// ===END PRIVATE DOMAINS===
";

fn engine(rules: &[&str]) -> Engine<RuleStore> {
    psl::load_public_suffix_list(SUFFIXES).unwrap();
    Engine::new(RuleStore::from_lists([(0, rules.join("\n").as_str())]), Config::default())
}

#[test]
fn sites_under_a_multi_label_suffix_are_distinct_parties() {
    let engine = engine(&["||tracker.com.sg^$third-party"]);
    assert!(psl::is_psl_initialized());

    let request = Request::new("https://tracker.com.sg/p.js", Some("https://news.com.sg/"), RequestType::SCRIPT);
    assert!(request.is_third_party());
    assert_eq!(request.subdomains(), ["tracker.com.sg"]);

    let result = engine.match_request(&request, None);
    assert_eq!(result.get_basic_result().unwrap().text(), "||tracker.com.sg^$third-party");
}

#[test]
fn private_suffixes_split_sites() {
    let engine = engine(&["||alice.github.io^$third-party"]);

    let request = Request::new("https://alice.github.io/x.js", Some("https://bob.github.io/"), RequestType::SCRIPT);
    assert!(request.is_third_party());
    assert!(engine.match_request(&request, None).get_basic_result().is_some());

    let same_site = Request::new("https://cdn.alice.github.io/x.js", Some("https://alice.github.io/"), RequestType::SCRIPT);
    assert!(!same_site.is_third_party());
    assert_eq!(same_site.subdomains(), ["cdn.alice.github.io", "alice.github.io"]);
}

#[test]
fn wildcard_tld_domain_matches_multi_label_suffix() {
    let engine = engine(&["/banner$domain=example.*"]);

    let request = Request::new(
        "https://cdn.net/banner.png",
        Some("https://www.example.com.sg/"),
        RequestType::IMAGE,
    );
    let result = engine.match_request(&request, None);
    assert_eq!(result.get_basic_result().unwrap().text(), "/banner$domain=example.*");

    let other = Request::new("https://cdn.net/banner.png", Some("https://example.org.sg/"), RequestType::IMAGE);
    assert!(engine.match_request(&other, None).get_basic_result().is_none());
}
