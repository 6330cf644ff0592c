//! Routing and matching properties over generated filter lists

use std::collections::HashSet;

use fg_core::{Config, NetworkEngine, Request, RequestType, RuleHandle};
use fg_rules::RuleStore;
use proptest::prelude::*;

fn arb_rule() -> impl Strategy<Value = String> {
    let host = "[a-z]{1,8}";
    let word = "[a-z]{2,6}";

    prop_oneof![
        host.prop_map(|h| format!("||{h}.com^")),
        (host, word).prop_map(|(h, p)| format!("||{h}.net/{p}")),
        (word, word, host).prop_map(|(a, b, h)| format!("/{a}/{b}$domain={h}.org")),
        (word, host).prop_map(|(p, h)| format!("{p}$domain={h}.org|~x.{h}.org")),
        (host, host).prop_map(|(a, b)| format!("*$domain={a}.org|{b}.*")),
        host.prop_map(|h| format!(r"/{h}\d+/$image")),
        host.prop_map(|h| format!("@@||{h}.com^$document")),
        word.prop_map(|p| format!("$removeparam={p}")),
        (host, word).prop_map(|(h, p)| format!("|https://{h}.io/{p}|$third-party")),
    ]
}

fn arb_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_rule(), 0..64)
}

fn arb_url() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", prop_oneof![Just("com"), Just("net"), Just("org"), Just("io")], "[a-z0-9/]{0,12}")
        .prop_map(|(h, tld, path)| format!("https://{h}.{tld}/{path}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn every_rule_lands_in_exactly_one_table(rules in arb_list()) {
        let store = RuleStore::from_lists([(0, rules.join("\n").as_str())]);
        let loaded = store.len();
        prop_assert_eq!(loaded, rules.len());

        let engine = NetworkEngine::create_sync(store, Config::default());
        prop_assert_eq!(engine.table_counts().total(), loaded);
        prop_assert_eq!(engine.rules_count(), loaded);
    }

    #[test]
    fn matches_are_unique_and_verified(rules in arb_list(), url in arb_url(), source in arb_url()) {
        let store = RuleStore::from_lists([(0, rules.join("\n").as_str())]);
        let engine = NetworkEngine::create_sync(store, Config::default());
        let request = Request::new(&url, Some(source.as_str()), RequestType::IMAGE);

        let matched = engine.match_all(&request);
        let mut seen = HashSet::new();
        for rule in &matched {
            prop_assert!(seen.insert(rule.index()), "rule {} returned twice", rule.index());
            prop_assert!(rule.matches(&request));
        }

        let again: HashSet<_> = engine.match_all(&request).iter().map(|rule| rule.index()).collect();
        prop_assert_eq!(seen, again);
    }
}
