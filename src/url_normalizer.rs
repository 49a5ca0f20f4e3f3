// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! URL canonicalization for the crawl frontier.
//!
//! The string produced by [`normalize`] is the identity of a page: the crawler's
//! visited set and the `(scan_id, url)` uniqueness of discovered assets are both
//! keyed on it. It must therefore be idempotent.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use url::Url;

/// Longest URL the crawler will follow
pub const MAX_URL_LENGTH: usize = 2000;

const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "msclkid", "_ga", "_gid", "ref", "referrer"];
const TRACKING_PREFIXES: &[&str] = &["utm_"];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff", "avif",
    // Archives
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz",
    // Executables and packages
    "exe", "msi", "dmg", "pkg", "deb", "rpm", "apk", "bin", "iso",
    // Office documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    // Stylesheets
    "css",
    // Media
    "mp3", "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "wav", "ogg", "m4a",
    // Fonts
    "woff", "woff2", "ttf", "eot", "otf",
];

static DEFAULT_NORMALIZER: Lazy<UrlNormalizer> = Lazy::new(UrlNormalizer::default);

/// Canonicalizes URLs and filters out resources that are not worth crawling
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    tracking_params: HashSet<String>,
    tracking_prefixes: Vec<String>,
    excluded_extensions: HashSet<String>,
    max_length: usize,
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self {
            tracking_params: TRACKING_PARAMS.iter().map(|s| s.to_string()).collect(),
            tracking_prefixes: TRACKING_PREFIXES.iter().map(|s| s.to_string()).collect(),
            excluded_extensions: EXCLUDED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_length: MAX_URL_LENGTH,
        }
    }
}

impl UrlNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extra extensions to skip (without the leading dot)
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    /// Canonical form of `input`. Unparsable input is returned unchanged.
    pub fn normalize(&self, input: &str) -> String {
        let mut url = match Url::parse(input.trim()) {
            Ok(url) => url,
            Err(_) => return input.to_string(),
        };

        // Scheme/host lowercasing and default port removal are done by the parser.
        url.set_fragment(None);

        let query = url.query().map(|q| self.canonical_query(q));
        match query {
            Some(q) if !q.is_empty() => url.set_query(Some(&q)),
            _ => url.set_query(None),
        }

        if !url.cannot_be_a_base() {
            let path = url.path();
            if path.len() > 1 && path.ends_with('/') {
                let trimmed = path.trim_end_matches('/');
                let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
                url.set_path(&trimmed);
            }
        }

        url.to_string()
    }

    /// Drop tracking parameters and sort the rest by key.
    ///
    /// Works on the raw `key=value` pairs so an already-canonical query
    /// serializes to the same bytes again.
    fn canonical_query(&self, query: &str) -> String {
        let mut pairs: Vec<(&str, &str)> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, _)) => (key, pair),
                None => (pair, pair),
            })
            .filter(|(key, _)| !self.is_tracking_param(key))
            .collect();

        pairs.sort_by(|a, b| a.0.cmp(b.0));

        pairs
            .into_iter()
            .map(|(_, pair)| pair)
            .collect::<Vec<_>>()
            .join("&")
    }

    fn is_tracking_param(&self, raw_key: &str) -> bool {
        let key = urlencoding::decode(raw_key)
            .map(|k| k.to_ascii_lowercase())
            .unwrap_or_else(|_| raw_key.to_ascii_lowercase());

        self.tracking_params.contains(&key)
            || self.tracking_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Whether the crawler should fetch this URL at all
    pub fn is_crawlable(&self, input: &str) -> bool {
        if input.len() > self.max_length {
            return false;
        }

        let url = match Url::parse(input.trim()) {
            Ok(url) => url,
            Err(_) => return false,
        };

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return false;
        }

        match extension_of(url.path()) {
            Some(ext) => !self.excluded_extensions.contains(&ext),
            None => true,
        }
    }

    /// Same scheme, host and effective port
    pub fn same_origin(&self, a: &str, b: &str) -> bool {
        match (Url::parse(a), Url::parse(b)) {
            (Ok(a), Ok(b)) => {
                let (oa, ob) = (a.origin(), b.origin());
                oa.is_tuple() && oa == ob
            }
            _ => false,
        }
    }

    /// Normalized, crawlable, unique URLs in first-seen order
    pub fn dedupe<I, S>(&self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for url in urls {
            let normalized = self.normalize(url.as_ref());
            if self.is_crawlable(&normalized) && seen.insert(normalized.clone()) {
                unique.push(normalized);
            }
        }

        unique
    }
}

/// Lowercased extension of the last path segment
fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn normalize(url: &str) -> String {
    DEFAULT_NORMALIZER.normalize(url)
}

pub fn is_crawlable(url: &str) -> bool {
    DEFAULT_NORMALIZER.is_crawlable(url)
}

pub fn same_origin(a: &str, b: &str) -> bool {
    DEFAULT_NORMALIZER.same_origin(a, b)
}

pub fn dedupe<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DEFAULT_NORMALIZER.dedupe(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_tracking_and_fragment() {
        assert_eq!(
            normalize("https://EX.com:443/a/?utm_source=x&b=2#frag"),
            "https://ex.com/a?b=2"
        );
    }

    #[test]
    fn test_normalize_default_ports() {
        assert_eq!(normalize("http://example.com:80/x"), "http://example.com/x");
        assert_eq!(normalize("https://example.com:8443/x"), "https://example.com:8443/x");
    }

    #[test]
    fn test_normalize_root_path_kept() {
        assert_eq!(normalize("https://example.com"), "https://example.com/");
        assert_eq!(normalize("https://example.com/"), "https://example.com/");
        assert_eq!(normalize("https://example.com//"), "https://example.com/");
    }

    #[test]
    fn test_normalize_sorts_query() {
        assert_eq!(
            normalize("https://example.com/s?z=1&a=2&m=3&fbclid=abc&ref=home"),
            "https://example.com/s?a=2&m=3&z=1"
        );
    }

    #[test]
    fn test_normalize_only_tracking_params() {
        assert_eq!(
            normalize("https://example.com/p?utm_campaign=x&gclid=1"),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_normalize_unparsable_returned_unchanged() {
        assert_eq!(normalize("not a url"), "not a url");
        assert_eq!(normalize("/relative/path"), "/relative/path");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "https://EX.com:443/a/?utm_source=x&b=2#frag",
            "http://Example.COM/path/to/?q=hello%20world&a=&b",
            "https://example.com/?x=1&x=0&utm_medium=mail",
            "https://example.com/a//b///",
            "https://example.com/search?q=caf%C3%A9&_ga=1",
            "https://user:pw@example.com:443/",
            "mailto:someone@example.com",
        ];

        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {}", sample);
        }
    }

    #[test]
    fn test_is_crawlable() {
        assert!(is_crawlable("https://example.com/page"));
        assert!(is_crawlable("https://example.com/page.php?id=1"));
        assert!(!is_crawlable("ftp://example.com/file"));
        assert!(!is_crawlable("mailto:someone@example.com"));
        assert!(!is_crawlable("https://example.com/logo.PNG"));
        assert!(!is_crawlable("https://example.com/site.css"));
        assert!(!is_crawlable("https://example.com/report.pdf"));
        assert!(!is_crawlable("https://example.com/setup.exe"));
        assert!(!is_crawlable("https://example.com/font.woff2"));

        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(!is_crawlable(&long));
    }

    #[test]
    fn test_hidden_files_are_crawlable() {
        assert!(is_crawlable("https://example.com/.env"));
    }

    #[test]
    fn test_same_origin() {
        assert!(same_origin("https://example.com/a", "https://EXAMPLE.com:443/b"));
        assert!(!same_origin("https://example.com/", "http://example.com/"));
        assert!(!same_origin("https://example.com/", "https://sub.example.com/"));
        assert!(!same_origin("https://example.com/", "https://example.com:8443/"));
        assert!(!same_origin("garbage", "garbage"));
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let urls = vec![
            "https://example.com/b/",
            "https://example.com/a",
            "https://EXAMPLE.com/b#top",
            "https://example.com/image.jpg",
            "https://example.com/a?utm_source=news",
        ];

        assert_eq!(
            dedupe(urls),
            vec!["https://example.com/b", "https://example.com/a"]
        );
    }

    #[test]
    fn test_dedupe_with_normalized_copy() {
        let u = "https://Example.com:443/x/?b=1&a=2#f";
        assert_eq!(dedupe([u.to_string(), normalize(u)]).len(), 1);
    }

    #[test]
    fn test_custom_exclusions() {
        let normalizer = UrlNormalizer::new().with_excluded_extensions([".json"]);
        assert!(!normalizer.is_crawlable("https://example.com/data.json"));
        assert!(is_crawlable("https://example.com/data.json"));
    }
}
