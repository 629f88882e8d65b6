//! robots.txt rules for one host
//!
//! Path matching goes through `robotstxt::DefaultMatcher`. That crate has no
//! crawl-delay support, so `Crawl-delay` lines are collected here while the
//! file is loaded.

use robotstxt::DefaultMatcher;

/// One `Crawl-delay` line and the user agents of the group it belongs to
#[derive(Debug, Clone, PartialEq)]
struct DelayRule {
    agents: Vec<String>,
    seconds: f64,
}

/// Rules served by one host
///
/// `body` is `None` when the host publishes nothing usable, in which case
/// every path is allowed.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    body: Option<String>,
    delays: Vec<DelayRule>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            delays: collect_delays(content),
            body: Some(content.to_string()),
        }
    }

    /// Rules for a missing, unreachable or non-200 robots.txt
    pub fn allow_all() -> Self {
        Self {
            body: None,
            delays: Vec::new(),
        }
    }

    /// Whether `url` may be fetched by `user_agent`, matched on its product token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.body {
            Some(body) => DefaultMatcher::default().one_agent_allowed_by_robots(
                body,
                product_token(user_agent),
                url,
            ),
            None => true,
        }
    }

    /// Crawl delay in seconds for `user_agent`
    ///
    /// A group naming our product token wins over the `*` group; within
    /// either, the last matching line wins.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let token = product_token(user_agent).to_ascii_lowercase();
        let last_for = |agent: &str| {
            self.delays
                .iter()
                .rev()
                .find(|rule| rule.agents.iter().any(|a| a == agent))
                .map(|rule| rule.seconds)
        };

        let specific = if token.is_empty() { None } else { last_for(&token) };
        specific.or_else(|| last_for("*"))
    }
}

/// Scans the file for `Crawl-delay` lines, remembering each line's group
fn collect_delays(content: &str) -> Vec<DelayRule> {
    let mut rules = Vec::new();
    let mut agents: Vec<String> = Vec::new();
    let mut last_was_agent = false;

    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        if field == "user-agent" {
            // Consecutive user-agent lines open one shared group
            if !last_was_agent {
                agents.clear();
            }
            agents.push(value.to_ascii_lowercase());
            last_was_agent = true;
            continue;
        }
        last_was_agent = false;

        if field == "crawl-delay" {
            match value.parse::<f64>() {
                Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => rules.push(DelayRule {
                    agents: agents.clone(),
                    seconds,
                }),
                _ => tracing::debug!("Ignoring crawl-delay value {:?}", value),
            }
        }
    }

    rules
}

/// Extracts the product token from a user agent string
///
/// `SearchEngine-Crawler/1.0 (+https://example.com)` becomes `SearchEngine-Crawler`.
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}
