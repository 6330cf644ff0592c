//! Registrable-domain (eTLD+1) utilities
//!
//! The matching core needs two things from the public suffix list: the
//! third-party decision and the subdomain ladder of a hostname. Both come
//! from the list installed with [`load_public_suffix_list`]; until a list is
//! loaded a heuristic over country-code second-level labels is used.
//!
//! # Examples
//!
//! ```
//! use fg_core::psl::{get_etld1, subdomain_ladder};
//!
//! assert_eq!(get_etld1("sub.example.com"), "example.com");
//! assert_eq!(get_etld1("sub.example.co.uk"), "example.co.uk");
//! assert_eq!(subdomain_ladder("a.b.example.org"), ["a.b.example.org", "b.example.org", "example.org"]);
//! ```

use std::net::IpAddr;
use std::sync::{Mutex, PoisonError, RwLock};

use publicsuffix::{List, Psl};

use crate::cache::LruCache;

const ETLD1_CACHE_SIZE: usize = 4096;

/// Second-level labels registries commonly open below a country-code TLD
/// (`co.uk`, `com.sg`, `ac.jp`...).
const GENERIC_SECOND_LEVEL: &[&str] = &[
    "ac", "co", "com", "edu", "go", "gob", "gov", "ltd", "mil", "ne", "net", "nic", "or", "org", "plc", "sch",
];

/// Error type for public suffix list loading.
#[derive(Debug, thiserror::Error)]
pub enum PslError {
    #[error("invalid public suffix list: {0}")]
    Parse(#[from] publicsuffix::Error),
}

// =============================================================================
// Global PSL State
// =============================================================================

static PUBLIC_SUFFIXES: RwLock<Option<List>> = RwLock::new(None);

static ETLD1_CACHE: Mutex<Option<LruCache<String, String>>> = Mutex::new(None);

/// Parse a public suffix list (the `public_suffix_list.dat` format) and make
/// it the list every lookup goes through.
pub fn load_public_suffix_list(text: &str) -> Result<(), PslError> {
    let list: List = text.parse()?;
    init_psl(list);
    Ok(())
}

/// Install an already parsed list.
pub fn init_psl(list: List) {
    *PUBLIC_SUFFIXES.write().unwrap_or_else(PoisonError::into_inner) = Some(list);
    *ETLD1_CACHE.lock().unwrap_or_else(PoisonError::into_inner) = Some(LruCache::new(ETLD1_CACHE_SIZE));
}

/// Check if a public suffix list is loaded.
pub fn is_psl_initialized() -> bool {
    PUBLIC_SUFFIXES.read().unwrap_or_else(PoisonError::into_inner).is_some()
}

// =============================================================================
// eTLD+1 Extraction
// =============================================================================

/// Get the eTLD+1 (registrable domain) for a hostname.
///
/// IP addresses, single-label hosts and hosts that are a public suffix
/// themselves are their own registrable domain.
pub fn get_etld1(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if is_ip_address(&host) {
        return host;
    }

    if let Some(cache) = ETLD1_CACHE.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
        if let Some(cached) = cache.get(&host) {
            return cached;
        }
    }

    let result = {
        let list = PUBLIC_SUFFIXES.read().unwrap_or_else(PoisonError::into_inner);
        compute_etld1(list.as_ref(), &host)
    };

    if let Some(cache) = ETLD1_CACHE.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
        cache.insert(host, result.clone());
    }
    result
}

/// eTLD+1 of a lowercased host against `list`, or the heuristic without one.
fn compute_etld1(list: Option<&List>, host: &str) -> String {
    match list {
        Some(list) => list
            .domain(host.as_bytes())
            .and_then(|domain| std::str::from_utf8(domain.as_bytes()).ok())
            .unwrap_or(host)
            .to_string(),
        None => {
            let labels: Vec<&str> = host.split('.').collect();
            fallback_etld1(&labels)
        }
    }
}

/// Heuristic eTLD+1 over split labels.
fn fallback_etld1(labels: &[&str]) -> String {
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    // `<generic>.<cc>` is a public suffix
    let tld = labels[n - 1];
    if tld.len() == 2 && GENERIC_SECOND_LEVEL.contains(&labels[n - 2]) {
        return labels[n - 3..].join(".");
    }

    // Default: last 2 labels
    labels[n - 2..].join(".")
}

fn is_ip_address(host: &str) -> bool {
    let unbracketed = host.trim_start_matches('[').trim_end_matches(']');
    unbracketed.parse::<IpAddr>().is_ok()
}

/// Check if a request is third-party relative to the page that issued it.
pub fn is_third_party(site_host: &str, req_host: &str) -> bool {
    get_etld1(site_host) != get_etld1(req_host)
}

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator for suffix-walking a host from full to eTLD+1.
pub struct HostSuffixIter<'a> {
    current: &'a str,
    etld1_len: usize,
}

impl<'a> HostSuffixIter<'a> {
    pub fn new(host: &'a str) -> Self {
        let etld1 = get_etld1(host);
        Self {
            current: host,
            etld1_len: etld1.len(),
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_empty() || self.current.len() < self.etld1_len {
            return None;
        }

        let result = self.current;

        // Move to parent
        self.current = match get_parent_domain(self.current) {
            Some(parent) if parent.len() >= self.etld1_len => parent,
            _ => "",
        };

        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter::new(host)
}

/// Owned subdomain ladder, most specific first, ending at the eTLD+1.
pub fn subdomain_ladder(host: &str) -> Vec<String> {
    walk_host_suffixes(host).map(str::to_string).collect()
}
