//! End-to-end matching over parsed filter lists

use std::collections::BTreeSet;
use std::sync::Arc;

use fg_core::lookup::DomainsLookupTable;
use fg_core::{
    Config, CosmeticOption, Engine, HttpHeader, LookupTable, MatchingResult, NetworkEngine, Request, RequestType,
    RuleHandle, RuleStorage,
};
use fg_rules::{NetworkRule, RuleStore};

fn store(rules: &[&str]) -> RuleStore {
    RuleStore::from_lists([(0, rules.join("\n").as_str())])
}

fn engine(rules: &[&str]) -> Engine<RuleStore> {
    Engine::new(store(rules), Config::default())
}

fn indices(rules: &[Arc<NetworkRule>]) -> BTreeSet<u32> {
    rules.iter().map(|rule| rule.index()).collect()
}

#[test]
fn third_party_rule_needs_a_foreign_source() {
    let engine = engine(&["||example.org^$third-party"]);

    let no_source = Request::new("https://example.org", None, RequestType::DOCUMENT);
    assert!(engine.match_request(&no_source, None).basic_rule().is_none());

    let same_site = Request::new("https://example.org", Some("https://example.org"), RequestType::DOCUMENT);
    assert!(engine.match_request(&same_site, None).basic_rule().is_none());

    let foreign = Request::new("https://example.org", Some("https://news.com"), RequestType::DOCUMENT);
    let result = engine.match_request(&foreign, None);
    assert_eq!(result.basic_rule().unwrap().text(), "||example.org^$third-party");
}

#[test]
fn document_exception_covers_subresources() {
    let engine = engine(&["@@||example.org$document"]);

    let frame_rule = engine.match_frame("https://example.org/").expect("frame rule");
    assert_eq!(frame_rule.index(), 0);

    let request = Request::new(
        "https://example.org/static/app.js",
        Some("https://example.org/"),
        RequestType::SCRIPT,
    );
    let result = engine.match_request(&request, Some(frame_rule));

    assert_eq!(result.basic_rule().unwrap().index(), 0);
    assert_eq!(result.cosmetic_exception_rule().unwrap().index(), 0);
    assert_eq!(result.get_cosmetic_option(), CosmeticOption::NONE);
    assert!(result.get_basic_result().unwrap().is_allowlist());
}

#[test]
fn redirect_cancellation_is_scoped_by_request_type() {
    let engine = engine(&[
        "||ya.ru$redirect=1x1-transparent.gif",
        "@@||ya.ru$redirect=1x1-transparent.gif,image",
    ]);

    let image = Request::new("https://ya.ru/pixel.gif", None, RequestType::IMAGE);
    let result = engine.match_request(&image, None);
    assert!(result.basic_rule().is_none());
    assert!(result.get_basic_result().is_none());

    let media = Request::new("https://ya.ru/pixel.gif", None, RequestType::MEDIA);
    let result = engine.match_request(&media, None);
    assert_eq!(result.get_basic_result().unwrap().index(), 0);
}

#[test]
fn badfilter_cancels_its_twin() {
    let store = store(&["path$domain=example.com", "path$domain=example.com,badfilter"]);
    let rules: Vec<_> = store.scan().map(|(_, rule)| rule).collect();

    let result = MatchingResult::new(rules.clone(), None, &Config::default());
    assert!(result.basic_rule().is_none());

    let without_badfilter = MatchingResult::new(rules[..1].to_vec(), None, &Config::default());
    assert_eq!(without_badfilter.basic_rule().unwrap().index(), 0);
}

#[test]
fn badfilter_applies_through_the_engine() {
    let engine = engine(&["||ads.net^$image", "||ads.net^$image,badfilter", "||ads.net/banner"]);

    let request = Request::new("https://ads.net/banner.png", None, RequestType::IMAGE);
    let result = engine.match_request(&request, None);
    assert_eq!(result.get_basic_result().unwrap().text(), "||ads.net/banner");
}

#[test]
fn domain_rule_matches_once() {
    let store = store(&["path$domain=base.com|a.base.com|b.base.com"]);
    let rule = store.retrieve_rule(0).unwrap();

    let mut table = DomainsLookupTable::new();
    assert!(table.add_rule(&rule, 0));

    let request = Request::new("https://cdn.net/path.js", Some("https://a.base.com/"), RequestType::SCRIPT);
    assert_eq!(table.match_all(&request, &store).len(), 1);

    let request = Request::new("https://cdn.net/path.js", Some("https://base.com/"), RequestType::SCRIPT);
    assert_eq!(table.match_all(&request, &store).len(), 1);
}

#[test]
fn elemhide_and_jsinject_leave_only_html() {
    let engine = engine(&["@@||example.org^$elemhide,jsinject"]);

    let document = Request::new("https://example.org/", None, RequestType::DOCUMENT);
    assert_eq!(engine.match_request(&document, None).get_cosmetic_option(), CosmeticOption::HTML);

    let frame_rule = engine.match_frame("https://example.org/");
    let image = Request::new("https://example.org/logo.png", Some("https://example.org/"), RequestType::IMAGE);
    let result = engine.match_request(&image, frame_rule);
    assert_eq!(result.get_cosmetic_option(), CosmeticOption::HTML);
    assert!(result.basic_rule().is_none());
}

#[test]
fn cosmetic_pick_ignores_importance() {
    let lists = [
        ["@@||twitter.com^$generichide", "@@||twitter.com^$elemhide,jsinject,important"],
        ["@@||twitter.com^$generichide,important", "@@||twitter.com^$elemhide,jsinject"],
    ];

    for rules in lists {
        let engine = engine(&rules);
        let request = Request::new("https://twitter.com/", None, RequestType::DOCUMENT);
        let result = engine.match_request(&request, None);

        assert_eq!(result.cosmetic_exception_rule().unwrap().index(), 1, "{rules:?}");
        assert_eq!(result.get_cosmetic_option(), CosmeticOption::HTML);
    }

    let engine = engine(&["@@||twitter.com^$generichide"]);
    let request = Request::new("https://twitter.com/", None, RequestType::DOCUMENT);
    let option = engine.match_request(&request, None).get_cosmetic_option();
    assert_eq!(option, CosmeticOption::ALL - CosmeticOption::GENERIC_CSS);
}

#[test]
fn match_all_is_idempotent() {
    let engine = engine(&[
        "||ads.net^",
        "/banner/*/img^",
        "path$domain=news.org",
        r"/track\d+/",
        "@@||ads.net/allowed",
    ]);
    let network_engine = engine.network_engine();
    let request = Request::new(
        "https://ads.net/banner/x/img?track42=path",
        Some("https://news.org/"),
        RequestType::IMAGE,
    );

    let first = indices(&network_engine.match_all(&request));
    let second = indices(&network_engine.match_all(&request));
    assert_eq!(first, second);
    assert_eq!(first, BTreeSet::from([0, 1, 2, 3]));
}

#[test]
fn allowlist_beats_plain_block() {
    let engine = engine(&["||ads.net^", "@@||ads.net/allowed"]);

    let blocked = Request::new("https://ads.net/banner", None, RequestType::IMAGE);
    assert!(!engine.match_request(&blocked, None).get_basic_result().unwrap().is_allowlist());

    let allowed = Request::new("https://ads.net/allowed/x.png", None, RequestType::IMAGE);
    assert!(engine.match_request(&allowed, None).get_basic_result().unwrap().is_allowlist());
}

#[test]
fn important_block_beats_allowlist() {
    let engine = engine(&["@@||ads.net^", "||ads.net^$important"]);
    let request = Request::new("https://ads.net/x", None, RequestType::SCRIPT);
    let basic = engine.match_request(&request, None).get_basic_result().unwrap();
    assert!(basic.is_important());
    assert!(!basic.is_allowlist());
}

#[test]
fn csp_exception_without_value_disables_all() {
    let engine = engine(&[
        "||example.org^$csp=script-src 'none'",
        "||example.org^$csp=frame-src 'none'",
    ]);
    let document = Request::new("https://example.org/", None, RequestType::DOCUMENT);
    assert_eq!(engine.match_request(&document, None).get_csp_rules().len(), 2);

    let engine = self::engine(&[
        "||example.org^$csp=script-src 'none'",
        "||example.org^$csp=frame-src 'none'",
        "@@||example.org^$csp",
    ]);
    let csp = engine.match_request(&document, None).get_csp_rules();
    assert_eq!(csp.len(), 1);
    assert!(csp[0].is_allowlist());
}

#[test]
fn removeparam_rules_are_collected() {
    let engine = engine(&["$removeparam=utm_source", "||example.org^$removeparam=gclid"]);
    let request = Request::new("https://example.org/?utm_source=x&gclid=y", None, RequestType::DOCUMENT);
    let rules = engine.match_request(&request, None).get_remove_param_rules();
    assert_eq!(indices(&rules), BTreeSet::from([0, 1]));
}

#[test]
fn response_header_rules() {
    let engine = engine(&["||example.org^$header=X-Tracker:/^on/"]);
    let request = Request::new("https://example.org/x.js", None, RequestType::SCRIPT);
    let result = engine.match_request(&request, None);

    let headers = [HttpHeader::new("x-tracker", "online")];
    assert_eq!(result.get_response_headers_result(&headers).unwrap().index(), 0);
    assert!(result.get_response_headers_result(&[HttpHeader::new("x-tracker", "off")]).is_none());
    assert!(result.get_basic_result().is_none());
}

#[test]
fn results_are_cached() {
    let engine = engine(&["||ads.net^"]);
    let request = Request::new("https://ads.net/x", None, RequestType::SCRIPT);

    let first = engine.match_request(&request, None);
    let second = engine.match_request(&request, None);
    assert!(Arc::ptr_eq(&first, &second));

    let other_type = Request::new("https://ads.net/x", None, RequestType::IMAGE);
    assert!(!Arc::ptr_eq(&first, &engine.match_request(&other_type, None)));
}

#[tokio::test]
async fn async_loader_yields_between_chunks() {
    let rules = ["||a.net^", "||b.net^", "||c.net^", "path$domain=d.org", r"/e\d/"];
    let mut yields = 0;

    let network_engine = NetworkEngine::create_async(store(&rules), Config::default().with_chunk_size(2), || {
        yields += 1;
        tokio::task::yield_now()
    })
    .await;

    assert_eq!(yields, 2);
    assert_eq!(network_engine.rules_count(), rules.len());

    let engine = Engine::from_network_engine(network_engine);
    let request = Request::new("https://b.net/", None, RequestType::SCRIPT);
    assert_eq!(engine.match_request(&request, None).get_basic_result().unwrap().index(), 1);
}
