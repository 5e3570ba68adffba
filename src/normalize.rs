//! Candidate link validation and domain derivation

use url::Url;

use crate::batch::DOMAIN_NOT_AVAILABLE;
use crate::extract::CandidateLink;

/// A candidate link paired with the domain it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    /// Host without a leading `www.`, or `N/A`
    pub domain: String,
    /// The candidate URL, unchanged
    pub url: String,
}

/// True when the string starts with `http://` or `https://` (any letter case) and has a host
pub fn is_http_url(candidate: &str) -> bool {
    let Some((scheme, _)) = candidate.split_once("://") else {
        return false;
    };
    if !(scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")) {
        return false;
    }
    Url::parse(candidate)
        .ok()
        .and_then(|u| u.host_str().map(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Rewrite the scheme in lowercase, leaving the rest of the URL as written
pub fn lowercase_scheme(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{}://{}", scheme.to_ascii_lowercase(), rest),
        None => url.to_string(),
    }
}

/// Normalize a candidate link into its (domain, url) pair
pub fn normalize(link: &CandidateLink) -> NormalizedLink {
    normalize_url(&link.url)
}

/// Normalize a raw URL string. Never fails: bad input yields the `N/A` domain.
pub fn normalize_url(url: &str) -> NormalizedLink {
    let domain = host_as_written(url)
        .map(|host| strip_www(&host).to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DOMAIN_NOT_AVAILABLE.to_string());

    NormalizedLink {
        domain,
        url: url.to_string(),
    }
}

/// Remove one leading `www.` label (case-insensitive)
pub fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

/// Host of `url` with the letter case used in the original string.
///
/// `Url` lowercases hosts, so the parsed host is only used to validate the
/// slice taken from the authority section of the original text.
fn host_as_written(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed).ok()?;
    let parsed_host = parsed.host_str().filter(|h| !h.is_empty())?;

    let after_scheme = trimmed.split_once("://").map(|(_, rest)| rest)?;
    let authority_end = after_scheme.find(['/', '?', '#']).unwrap_or(after_scheme.len());
    let authority = &after_scheme[..authority_end];
    let host_and_port = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);

    let written_host = if host_and_port.starts_with('[') {
        host_and_port.find(']').map(|end| &host_and_port[..=end]).unwrap_or(host_and_port)
    } else {
        host_and_port.split(':').next().unwrap_or(host_and_port)
    };

    if written_host.eq_ignore_ascii_case(parsed_host) {
        Some(written_host.to_string())
    } else {
        // Internationalized names come back punycoded; use the parsed form
        Some(parsed_host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{build_query, QueryMode, QueryTemplate};
    use crate::batch::SearchItem;

    fn link(url: &str) -> CandidateLink {
        let query = build_query(&SearchItem::new("Exemplo News"), QueryMode::General, &QueryTemplate::default()).unwrap();
        CandidateLink::new(url, query)
    }

    #[test]
    fn test_normalize_strips_www() {
        let normalized = normalize(&link("http://www.exemplonews.com.br/home"));
        assert_eq!(normalized.domain, "exemplonews.com.br");
        assert_eq!(normalized.url, "http://www.exemplonews.com.br/home");
    }

    #[test]
    fn test_normalize_keeps_other_subdomains_and_drops_port() {
        assert_eq!(normalize_url("https://portal.exemplo.com:8443/a?b=c").domain, "portal.exemplo.com");
        assert_eq!(normalize_url("https://user:pw@www.exemplo.org").domain, "exemplo.org");
    }

    #[test]
    fn test_normalize_preserves_case() {
        assert_eq!(normalize_url("https://WWW.ExemploNews.com.br/").domain, "ExemploNews.com.br");
    }

    #[test]
    fn test_only_one_leading_www_is_removed() {
        assert_eq!(strip_www("www.www.example.com"), "www.example.com");
        assert_eq!(strip_www("wwwexample.com"), "wwwexample.com");
        assert_eq!(strip_www("example.www.com"), "example.www.com");
        assert_eq!(strip_www("ww"), "ww");
    }

    #[test]
    fn test_malformed_input_degrades_to_sentinel() {
        for bad in ["", "not a url", "/relative/path", "http://", "mailto:x@example.com"] {
            let normalized = normalize_url(bad);
            assert_eq!(normalized.domain, "N/A", "input {:?}", bad);
            assert_eq!(normalized.url, bad);
        }
    }

    #[test]
    fn test_scheme_check_ignores_case() {
        assert!(is_http_url("HTTPS://Exemplo.com"));
        assert!(is_http_url("Http://exemplo.com/a"));
        assert!(!is_http_url("ftp://exemplo.com"));
        assert!(!is_http_url("http:exemplo.com"));
        assert_eq!(lowercase_scheme("HTTPS://Exemplo.com/A"), "https://Exemplo.com/A");
        assert_eq!(normalize_url("HTTPS://www.Exemplo.com").domain, "Exemplo.com");
    }

    #[test]
    fn test_ip_hosts() {
        assert_eq!(normalize_url("http://192.168.0.10/x").domain, "192.168.0.10");
        assert_eq!(normalize_url("http://[::1]:8080/").domain, "[::1]");
    }

    #[test]
    fn test_internationalized_host_falls_back_to_parsed_form() {
        let normalized = normalize_url("https://www.rádio.com.br/");
        assert!(normalized.domain.starts_with("xn--"), "got {}", normalized.domain);
        assert!(normalized.domain.ends_with(".com.br"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for url in [
            "http://www.exemplonews.com.br/home",
            "https://Exemplo.org",
            "garbage",
        ] {
            let once = normalize_url(url);
            let twice = normalize_url(&once.url);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://example.com"));
        assert!(is_http_url("https://example.com/path"));
        assert!(!is_http_url(" https://example.com"));
        assert!(!is_http_url("/url?q=https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("#top"));
        assert!(!is_http_url("javascript:void(0)"));
        assert!(!is_http_url(""));
    }
}
