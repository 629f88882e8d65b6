//! Canonical URL form used for frontier keys and document ids

use crate::UrlError;
use url::Url;

/// Query parameters that only identify a campaign, never the page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];
const TRACKING_PREFIX: &str = "utm_";

/// Parses and canonicalizes a URL string
///
/// Two spellings of the same page normalize to the same `Url`:
/// scheme and host are lowercased, default ports and fragments dropped,
/// dot segments resolved, repeated and trailing slashes removed (the root
/// keeps its `/`), tracking parameters removed and the rest sorted.
///
/// # Examples
///
/// ```
/// use driftnet::url::normalize_url;
///
/// let url = normalize_url("HTTP://A.Test:80/b/#frag").unwrap();
/// assert_eq!(url.as_str(), "http://a.test/b");
/// ```
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Canonicalizes a URL that is already parsed, e.g. a link resolved against its page
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return Err(UrlError::MissingHost),
    };
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("bad host {}: {}", host, e)))?;

    // Url::parse hides default ports already; URLs built by hand may not
    if let (Some(port), Some(default)) = (url.port(), scheme_default_port(url.scheme())) {
        if port == default {
            url.set_port(None)
                .map_err(|_| UrlError::Malformed("cannot clear port".to_string()))?;
        }
    }

    let path = canonical_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let query = url.query().map(|_| canonical_query(&url));
    match query {
        Some(pairs) if !pairs.is_empty() => {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        Some(_) => url.set_query(None),
        None => {}
    }

    Ok(url)
}

fn scheme_default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Resolves `.` and `..`, drops empty segments and any trailing slash
fn canonical_path(path: &str) -> String {
    let segments = path.split('/').fold(Vec::new(), |mut kept, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                kept.pop();
            }
            s => kept.push(s),
        }
        kept
    });

    format!("/{}", segments.join("/"))
}

/// Non-tracking query pairs in sorted order
fn canonical_query(url: &Url) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    pairs
}

fn is_tracking(key: &str) -> bool {
    key.starts_with(TRACKING_PREFIX) || TRACKING_PARAMS.contains(&key)
}
