//! Request normalization
//!
//! A [`Request`] is built once per incoming network request and carries the
//! precomputed attributes every lookup table and rule needs.

use crate::psl::{is_third_party, subdomain_ladder};
use crate::types::{HttpMethod, RequestType};
use crate::url::extract_host;

/// Normalized network request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: String,
    url_lowercase: String,
    hostname: String,
    source_url: Option<String>,
    source_hostname: String,
    subdomains: Vec<String>,
    source_subdomains: Vec<String>,
    request_type: RequestType,
    method: Option<HttpMethod>,
    third_party: bool,
}

impl Request {
    /// Build a request from its URL, the URL of the page (or frame) that
    /// issued it, and its type.
    ///
    /// An empty `source_url` is treated as absent. Without a source the
    /// request is never third-party.
    pub fn new(url: &str, source_url: Option<&str>, request_type: RequestType) -> Self {
        let url_lowercase = url.to_ascii_lowercase();
        let hostname = normalize_hostname(extract_host(&url_lowercase).unwrap_or_default());

        let source_url = source_url.filter(|s| !s.is_empty()).map(str::to_string);
        let source_hostname = source_url
            .as_deref()
            .and_then(extract_host)
            .map(normalize_hostname)
            .unwrap_or_default();

        let third_party = !source_hostname.is_empty()
            && !hostname.is_empty()
            && is_third_party(&source_hostname, &hostname);

        Self {
            subdomains: subdomain_ladder(&hostname),
            source_subdomains: subdomain_ladder(&source_hostname),
            url: url.to_string(),
            url_lowercase,
            hostname,
            source_url,
            source_hostname,
            request_type,
            method: None,
            third_party,
        }
    }

    /// Attach the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_lowercase(&self) -> &str {
        &self.url_lowercase
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Hostname of the issuing page, empty when unknown.
    pub fn source_hostname(&self) -> &str {
        &self.source_hostname
    }

    /// Hostname and its parents down to the registrable domain.
    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }

    /// Subdomain ladder of the source hostname.
    pub fn source_subdomains(&self) -> &[String] {
        &self.source_subdomains
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn is_third_party(&self) -> bool {
        self.third_party
    }

    /// Hostname `$domain` restrictions are checked against: the source
    /// hostname, or the request's own hostname when there is no source.
    pub fn domain_target(&self) -> &str {
        if self.source_hostname.is_empty() {
            &self.hostname
        } else {
            &self.source_hostname
        }
    }
}

fn normalize_hostname(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// A response header, as supplied by the host after the response arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
