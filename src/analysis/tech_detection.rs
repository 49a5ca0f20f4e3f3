// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Technology Fingerprinting Module
 * Signature-based technology detection and security header scoring
 * for a single fetched page
 * © 2026 Bountyy Oy
 */

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Recognized security headers. The score is the share of these present on a response.
pub const SECURITY_HEADERS: [&str; 10] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "x-xss-protection",
    "referrer-policy",
    "permissions-policy",
    "feature-policy",
    "expect-ct",
    "public-key-pins",
];

const HEADER_MATCH_CONFIDENCE: f32 = 1.0;
const HTML_MATCH_CONFIDENCE: f32 = 0.8;

/// Technology category types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TechCategory {
    Framework,
    CMS,
    WebServer,
    Language,
    CDN,
    Analytics,
    JavaScript,
    CSS,
    Ecommerce,
    Security,
    Cloud,
}

impl TechCategory {
    pub fn as_str(&self) -> &str {
        match self {
            TechCategory::Framework => "framework",
            TechCategory::CMS => "cms",
            TechCategory::WebServer => "web-server",
            TechCategory::Language => "language",
            TechCategory::CDN => "cdn",
            TechCategory::Analytics => "analytics",
            TechCategory::JavaScript => "javascript",
            TechCategory::CSS => "css",
            TechCategory::Ecommerce => "ecommerce",
            TechCategory::Security => "security",
            TechCategory::Cloud => "cloud",
        }
    }
}

/// Detected technology with confidence and evidence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedTechnology {
    pub name: String,
    pub category: TechCategory,
    pub version: Option<String>,
    pub confidence: f32,
    pub evidence: String,
}

/// Result of fingerprinting one page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResult {
    pub technologies: Vec<DetectedTechnology>,
    /// Every checklist header, with its value when present
    pub security_headers: BTreeMap<String, Option<String>>,
    pub security_score: u8,
}

impl FingerprintResult {
    pub fn missing_security_headers(&self) -> Vec<&str> {
        self.security_headers
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Static description of one technology signature.
///
/// Header patterns are `(header name, regex on value)`. A first capture group,
/// when present, is taken as the version.
struct Signature {
    name: &'static str,
    category: TechCategory,
    headers: &'static [(&'static str, &'static str)],
    html: &'static [&'static str],
}

const SIGNATURES: &[Signature] = &[
    // Web servers
    Signature {
        name: "Nginx",
        category: TechCategory::WebServer,
        headers: &[("server", r"nginx(?:/([\d.]+))?")],
        html: &[],
    },
    Signature {
        name: "Apache",
        category: TechCategory::WebServer,
        headers: &[("server", r"apache(?:/([\d.]+))?")],
        html: &[],
    },
    Signature {
        name: "Microsoft-IIS",
        category: TechCategory::WebServer,
        headers: &[("server", r"microsoft-iis(?:/([\d.]+))?")],
        html: &[],
    },
    Signature {
        name: "LiteSpeed",
        category: TechCategory::WebServer,
        headers: &[("server", r"litespeed")],
        html: &[],
    },
    Signature {
        name: "Caddy",
        category: TechCategory::WebServer,
        headers: &[("server", r"^caddy")],
        html: &[],
    },
    // CDN / edge
    Signature {
        name: "Cloudflare",
        category: TechCategory::CDN,
        headers: &[("server", r"cloudflare"), ("cf-ray", r".+")],
        html: &[],
    },
    Signature {
        name: "Fastly",
        category: TechCategory::CDN,
        headers: &[("x-served-by", r"cache-"), ("fastly-io-info", r".+")],
        html: &[],
    },
    Signature {
        name: "Amazon CloudFront",
        category: TechCategory::CDN,
        headers: &[("x-amz-cf-id", r".+"), ("via", r"cloudfront")],
        html: &[],
    },
    Signature {
        name: "Varnish",
        category: TechCategory::CDN,
        headers: &[("x-varnish", r".+"), ("via", r"varnish")],
        html: &[],
    },
    Signature {
        name: "Amazon S3",
        category: TechCategory::Cloud,
        headers: &[("server", r"amazons3"), ("x-amz-bucket-region", r".+")],
        html: &[],
    },
    // Languages / runtimes
    Signature {
        name: "PHP",
        category: TechCategory::Language,
        headers: &[("x-powered-by", r"php(?:/([\d.]+))?"), ("set-cookie", r"phpsessid")],
        html: &[],
    },
    Signature {
        name: "ASP.NET",
        category: TechCategory::Framework,
        headers: &[("x-aspnet-version", r"([\d.]+)"), ("x-powered-by", r"asp\.net")],
        html: &[r"__VIEWSTATE"],
    },
    Signature {
        name: "Java",
        category: TechCategory::Language,
        headers: &[("set-cookie", r"jsessionid")],
        html: &[],
    },
    Signature {
        name: "Express",
        category: TechCategory::Framework,
        headers: &[("x-powered-by", r"^express")],
        html: &[],
    },
    // Frameworks
    Signature {
        name: "Next.js",
        category: TechCategory::Framework,
        headers: &[("x-powered-by", r"next\.js(?: ([\d.]+))?")],
        html: &[r"__NEXT_DATA__", r"/_next/static/"],
    },
    Signature {
        name: "Django",
        category: TechCategory::Framework,
        headers: &[("set-cookie", r"csrftoken=")],
        html: &[r"csrfmiddlewaretoken"],
    },
    Signature {
        name: "Laravel",
        category: TechCategory::Framework,
        headers: &[("set-cookie", r"laravel_session")],
        html: &[],
    },
    Signature {
        name: "Ruby on Rails",
        category: TechCategory::Framework,
        headers: &[("x-runtime", r"^[\d.]+$")],
        html: &[r#"<meta name="csrf-param" content="authenticity_token""#],
    },
    // CMS / e-commerce
    Signature {
        name: "WordPress",
        category: TechCategory::CMS,
        headers: &[("link", r"/wp-json/")],
        html: &[
            r#"<meta name="generator" content="WordPress ?([\d.]+)?""#,
            r"/wp-content/",
            r"/wp-includes/",
        ],
    },
    Signature {
        name: "Drupal",
        category: TechCategory::CMS,
        headers: &[("x-generator", r"drupal ?([\d.]+)?"), ("x-drupal-cache", r".+")],
        html: &[r"Drupal\.settings", r"sites/(?:default|all)/(?:themes|modules)"],
    },
    Signature {
        name: "Joomla",
        category: TechCategory::CMS,
        headers: &[],
        html: &[r#"<meta name="generator" content="Joomla!? ?([\d.]+)?"#, r"/media/system/js/"],
    },
    Signature {
        name: "Shopify",
        category: TechCategory::Ecommerce,
        headers: &[("x-shopid", r".+"), ("x-shopify-stage", r".+")],
        html: &[r"cdn\.shopify\.com"],
    },
    // Client side
    Signature {
        name: "React",
        category: TechCategory::JavaScript,
        headers: &[],
        html: &[r"data-reactroot", r"react(?:-dom)?(?:\.production)?(?:\.min)?\.js"],
    },
    Signature {
        name: "Vue.js",
        category: TechCategory::JavaScript,
        headers: &[],
        html: &[r"data-v-[0-9a-f]{8}", r"vue(?:\.runtime)?(?:\.min)?\.js"],
    },
    Signature {
        name: "Angular",
        category: TechCategory::JavaScript,
        headers: &[],
        html: &[r#"ng-version="([\d.]+)""#, r"ng-app"],
    },
    Signature {
        name: "jQuery",
        category: TechCategory::JavaScript,
        headers: &[],
        html: &[r"jquery[.-]([\d.]+)(?:\.min)?\.js", r"jquery(?:\.min)?\.js"],
    },
    Signature {
        name: "Bootstrap",
        category: TechCategory::CSS,
        headers: &[],
        html: &[r"bootstrap(?:\.min)?\.css"],
    },
    // Analytics / security widgets
    Signature {
        name: "Google Analytics",
        category: TechCategory::Analytics,
        headers: &[],
        html: &[r"google-analytics\.com/(?:ga|analytics)\.js", r"googletagmanager\.com/gtag/js"],
    },
    Signature {
        name: "Google Tag Manager",
        category: TechCategory::Analytics,
        headers: &[],
        html: &[r"googletagmanager\.com/gtm\.js"],
    },
    Signature {
        name: "reCAPTCHA",
        category: TechCategory::Security,
        headers: &[],
        html: &[r"google\.com/recaptcha", r"g-recaptcha"],
    },
];

struct CompiledSignature {
    name: &'static str,
    category: TechCategory,
    headers: Vec<(&'static str, Regex)>,
    html: Vec<Regex>,
}

/// Detects technologies and scores security-header hygiene of a page.
///
/// Pure with respect to its inputs: all regexes are compiled once in `new`,
/// so one instance can be shared across crawl tasks.
pub struct TechnologyFingerprinter {
    signatures: Vec<CompiledSignature>,
}

impl TechnologyFingerprinter {
    pub fn new() -> Self {
        let signatures = SIGNATURES
            .iter()
            .map(|sig| CompiledSignature {
                name: sig.name,
                category: sig.category,
                headers: sig
                    .headers
                    .iter()
                    .filter_map(|(header, pattern)| {
                        compile(sig.name, pattern).map(|re| (*header, re))
                    })
                    .collect(),
                html: sig
                    .html
                    .iter()
                    .filter_map(|pattern| compile(sig.name, pattern))
                    .collect(),
            })
            .collect();

        Self { signatures }
    }

    /// Fingerprint one page. Header names are matched case-insensitively.
    pub fn analyze(&self, headers: &HashMap<String, String>, html: &str) -> FingerprintResult {
        let headers: HashMap<String, &str> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();

        let mut technologies = Vec::new();
        let mut recorded: HashSet<&'static str> = HashSet::new();

        // Header signatures first, then HTML. A technology is recorded at most once.
        for sig in &self.signatures {
            for (header, regex) in &sig.headers {
                let Some(value) = headers.get(*header) else {
                    continue;
                };
                if let Some(caps) = regex.captures(value) {
                    if recorded.insert(sig.name) {
                        technologies.push(DetectedTechnology {
                            name: sig.name.to_string(),
                            category: sig.category,
                            version: caps.get(1).map(|m| m.as_str().to_string()),
                            confidence: HEADER_MATCH_CONFIDENCE,
                            evidence: format!("{}: {}", header, value),
                        });
                    }
                    break;
                }
            }
        }

        if !html.is_empty() {
            for sig in &self.signatures {
                if recorded.contains(sig.name) {
                    continue;
                }
                for regex in &sig.html {
                    if let Some(caps) = regex.captures(html) {
                        recorded.insert(sig.name);
                        technologies.push(DetectedTechnology {
                            name: sig.name.to_string(),
                            category: sig.category,
                            version: caps.get(1).map(|m| m.as_str().to_string()),
                            confidence: HTML_MATCH_CONFIDENCE,
                            evidence: format!("HTML pattern: {}", regex.as_str()),
                        });
                        break;
                    }
                }
            }
        }

        let security_headers: BTreeMap<String, Option<String>> = SECURITY_HEADERS
            .iter()
            .map(|name| (name.to_string(), headers.get(*name).map(|v| v.to_string())))
            .collect();

        let present = security_headers.values().filter(|v| v.is_some()).count();

        FingerprintResult {
            technologies,
            security_headers,
            security_score: security_score(present),
        }
    }
}

impl Default for TechnologyFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// `round(100 * present / checklist size)`
pub fn security_score(present: usize) -> u8 {
    let present = present.min(SECURITY_HEADERS.len());
    ((100.0 * present as f64) / SECURITY_HEADERS.len() as f64).round() as u8
}

fn compile(name: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("(?i){}", pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("[Fingerprint] Invalid pattern for {}: {}", name, e);
            None
        }
    }
}
