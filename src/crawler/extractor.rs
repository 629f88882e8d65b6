//! Content extraction from fetched pages
//!
//! Turns an HTML response into:
//! - A title (title element, first heading, or the URL)
//! - Visible body text with boilerplate stripped and whitespace collapsed
//! - Absolute, normalized outbound links

use crate::config::CrawlerConfig;
use crate::crawler::FetchResult;
use crate::url::{is_crawlable, normalize_parsed};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

const MAX_TITLE_CHARS: usize = 200;

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Containers tried in order when looking for the main content
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    ".main-content",
    ".content",
    ".post-content",
    "#main",
    "#content",
    "#post",
];

/// Elements whose whole subtree is dropped from the text
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "svg",
    "iframe",
];

/// Elements that separate words even without surrounding whitespace
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

/// Thresholds applied to extracted text
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Pages with fewer characters are flagged low-value
    pub min_content_chars: usize,
    /// Content is cut to this many characters
    pub max_content_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for ExtractOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            min_content_chars: config.min_content_chars,
            max_content_chars: config.max_content_chars,
        }
    }
}

/// Information extracted from an HTML page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
    /// Normalized, crawlable, de-duplicated links in document order
    pub links: Vec<Url>,
    /// Content is empty or shorter than the configured minimum
    pub low_value: bool,
}

/// Returns true for HTML-like `Content-Type` values
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    HTML_CONTENT_TYPES.contains(&mime.as_str())
}

/// Extracts a page from a successful fetch
///
/// Returns `None` for failed fetches and non-HTML responses. A page with
/// no visible text still yields a page, flagged `low_value`.
pub fn extract(result: &FetchResult, options: &ExtractOptions) -> Option<ExtractedPage> {
    if !result.is_success() || !is_html_content_type(result.content_type.as_deref()) {
        return None;
    }

    let html = String::from_utf8_lossy(&result.body);
    Some(parse_page(&html, &result.url, &result.final_url, options))
}

/// Parses HTML served at `page_url` (reached via `base_url` after redirects)
pub fn parse_page(
    html: &str,
    page_url: &Url,
    base_url: &Url,
    options: &ExtractOptions,
) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document).unwrap_or_else(|| page_url.to_string());
    let title = truncate_chars(&title, MAX_TITLE_CHARS);

    let text = collect_text(main_content_root(&document));
    let low_value = text.is_empty() || text.chars().count() < options.min_content_chars;
    let content = truncate_chars(&text, options.max_content_chars);

    let links = extract_links(&document, page_url, base_url);

    ExtractedPage {
        title,
        content,
        links,
        low_value,
    }
}

/// Title element text, or the first heading when the title is missing or blank
fn extract_title(document: &Html) -> Option<String> {
    let from_title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    });

    from_title.or_else(|| {
        let selector = Selector::parse("h1, h2, h3, h4, h5, h6").ok()?;
        document
            .select(&selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|s| !s.is_empty())
    })
}

fn main_content_root(document: &Html) -> ElementRef<'_> {
    for css in MAIN_CONTENT_SELECTORS.iter().chain(std::iter::once(&"body")) {
        if let Ok(selector) = Selector::parse(css) {
            if let Some(element) = document.select(&selector).next() {
                return element;
            }
        }
    }
    document.root_element()
}

/// Visible text under `root`, skipping stripped subtrees
fn collect_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();
    let mut stack = vec![(*root, false)];

    while let Some((node, closing)) = stack.pop() {
        if closing {
            text.push(' ');
            continue;
        }

        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(element) => {
                let name = element.name();
                if STRIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if BLOCK_ELEMENTS.contains(&name) {
                    text.push(' ');
                    stack.push((node, true));
                }
                for child in node.children().rev() {
                    stack.push((child, false));
                }
            }
            _ => {}
        }
    }

    collapse_whitespace(&text)
}

fn extract_links(document: &Html, page_url: &Url, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let self_urls: Vec<Url> = [page_url, base_url]
        .into_iter()
        .filter_map(|u| normalize_parsed(u.clone()).ok())
        .collect();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(link) = resolve_link(href, base_url) else {
                continue;
            };

            if self_urls.contains(&link) || !is_crawlable(&link) {
                continue;
            }
            if seen.insert(link.as_str().to_string()) {
                links.push(link);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute, normalized URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_parsed(absolute).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
