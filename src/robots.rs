// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - robots.txt Support
 * Fetches, parses and caches robots.txt rules per origin for one crawl
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use moka::future::Cache;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::http_client::HttpClient;

/// Upper bound for a Crawl-delay we are willing to honor
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    /// Length of the original pattern, used for longest-match precedence
    len: usize,
    matcher: Regex,
}

/// Rules that apply to our user-agent on one origin
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    /// Crawl-delay from the matching group
    pub crawl_delay: Option<Duration>,
}

impl RobotsRules {
    /// Everything allowed, no delay
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt for `agent` (case-insensitive product token).
    ///
    /// A group naming our agent wins over the `*` group. Within the group the
    /// longest matching rule decides; on a tie `Allow` wins.
    pub fn parse(body: &str, agent: &str) -> Self {
        let agent = agent.to_lowercase();

        let mut specific: Option<RobotsRules> = None;
        let mut wildcard: Option<RobotsRules> = None;

        let mut group_agents: Vec<String> = Vec::new();
        let mut group = RobotsRules::default();
        let mut in_rules = false;

        let mut flush = |agents: &[String], group: RobotsRules| {
            if agents.iter().any(|a| a != "*" && agent.starts_with(a.as_str())) {
                if specific.is_none() {
                    specific = Some(group);
                }
            } else if agents.iter().any(|a| a == "*") && wildcard.is_none() {
                wildcard = Some(group);
            }
        };

        for line in body.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        flush(&group_agents, std::mem::take(&mut group));
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "disallow" | "allow" => {
                    in_rules = true;
                    if value.is_empty() {
                        // "Disallow:" with no path allows everything
                        continue;
                    }
                    match compile_pattern(value) {
                        Some(matcher) => group.rules.push(Rule {
                            allow: key == "allow",
                            len: value.len(),
                            matcher,
                        }),
                        None => debug!("Ignoring unparseable robots.txt rule: {}", value),
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(secs) = value.parse::<f64>() {
                        if secs.is_finite() && secs >= 0.0 {
                            group.crawl_delay =
                                Some(Duration::from_secs_f64(secs).min(MAX_CRAWL_DELAY));
                        }
                    }
                }
                _ => {}
            }
        }
        if !group_agents.is_empty() {
            flush(&group_agents, group);
        }

        specific.or(wildcard).unwrap_or_default()
    }

    /// Whether `path` (path plus optional query) may be fetched
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;

        for rule in &self.rules {
            if rule.matcher.is_match(path) {
                let len = rule.len;
                best = match best {
                    Some((best_len, best_allow)) if best_len > len => Some((best_len, best_allow)),
                    Some((best_len, best_allow)) if best_len == len => {
                        Some((best_len, best_allow || rule.allow))
                    }
                    _ => Some((len, rule.allow)),
                };
            }
        }

        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Translate a robots.txt path pattern (`*` wildcard, `$` end anchor) to a regex
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut source = String::with_capacity(body.len() + 8);
    source.push('^');
    source.push_str(
        &body
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*"),
    );
    if anchored {
        source.push('$');
    }

    Regex::new(&source).ok()
}

#[cfg(test)]
fn pattern_matches(pattern: &str, path: &str) -> bool {
    compile_pattern(pattern).map(|re| re.is_match(path)).unwrap_or(false)
}

/// Outcome of a robots.txt lookup for one URL
#[derive(Debug, Clone, PartialEq)]
pub struct RobotsDecision {
    pub allowed: bool,
    pub crawl_delay: Option<Duration>,
}

/// Per-run robots.txt cache keyed by origin
pub struct RobotsCache {
    http_client: Arc<HttpClient>,
    agent: String,
    cache: Cache<String, Arc<RobotsRules>>,
}

impl RobotsCache {
    /// `user_agent` is reduced to its product token (`ScanwardBot/1.0 (...)` -> `scanwardbot`)
    pub fn new(http_client: Arc<HttpClient>, user_agent: &str) -> Self {
        let agent = user_agent
            .split(|c: char| c == '/' || c.is_whitespace())
            .next()
            .unwrap_or("*")
            .to_lowercase();

        Self {
            http_client,
            agent,
            cache: Cache::builder().max_capacity(256).build(),
        }
    }

    pub async fn check(&self, url: &str) -> RobotsDecision {
        let Ok(parsed) = Url::parse(url) else {
            return RobotsDecision { allowed: true, crawl_delay: None };
        };

        let rules = self.rules_for(&parsed).await;
        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        RobotsDecision {
            allowed: rules.is_allowed(&path),
            crawl_delay: rules.crawl_delay,
        }
    }

    async fn rules_for(&self, url: &Url) -> Arc<RobotsRules> {
        let origin = url.origin().ascii_serialization();
        let robots_url = format!("{}/robots.txt", origin);
        let http_client = Arc::clone(&self.http_client);
        let agent = self.agent.clone();

        self.cache
            .get_with(origin, async move {
                match http_client.get(&robots_url).await {
                    Ok(resp) if resp.is_success() => {
                        let rules = RobotsRules::parse(&resp.body, &agent);
                        if let Some(delay) = rules.crawl_delay {
                            info!("[robots.txt] Found Crawl-delay: {:?}", delay);
                        }
                        Arc::new(rules)
                    }
                    Ok(resp) => {
                        debug!("No robots.txt at {} (HTTP {})", robots_url, resp.status_code);
                        Arc::new(RobotsRules::allow_all())
                    }
                    Err(e) => {
                        debug!("Failed to fetch {}: {}", robots_url, e);
                        Arc::new(RobotsRules::allow_all())
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = r#"
# example
User-agent: *
Disallow: /private
Allow: /private/public
Crawl-delay: 0.5

User-agent: scanwardbot
User-agent: otherbot
Disallow: /admin
Disallow: /*.php$
"#;

    #[test]
    fn test_specific_group_wins() {
        let rules = RobotsRules::parse(ROBOTS, "scanwardbot");
        assert!(!rules.is_allowed("/admin/users"));
        assert!(rules.is_allowed("/private/x"));
        assert!(rules.crawl_delay.is_none());
    }

    #[test]
    fn test_wildcard_group() {
        let rules = RobotsRules::parse(ROBOTS, "somebot");
        assert!(!rules.is_allowed("/private/data"));
        assert!(rules.is_allowed("/private/public/page"));
        assert!(rules.is_allowed("/admin"));
        assert_eq!(rules.crawl_delay, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_wildcard_and_anchor() {
        let rules = RobotsRules::parse(ROBOTS, "scanwardbot");
        assert!(!rules.is_allowed("/index.php"));
        assert!(rules.is_allowed("/index.php?x=1"));
        assert!(rules.is_allowed("/index.html"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", "scanwardbot");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("/a", "/abc"));
        assert!(!pattern_matches("/b", "/abc"));
        assert!(pattern_matches("/*/edit", "/posts/1/edit"));
        assert!(pattern_matches("/end$", "/end"));
        assert!(!pattern_matches("/end$", "/end/more"));
        assert!(pattern_matches("/x*$", "/x/anything"));
        assert!(pattern_matches("/*.php$", "/a.php/b.php"));
    }
}
