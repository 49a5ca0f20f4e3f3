// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authentication Context for Authenticated Scanning
//!
//! Performs a form login before a crawl. The session cookies end up in the
//! per-scan HTTP client's cookie jar, so every page fetched afterwards is
//! authenticated.

use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{ScannerError, ScannerResult};
use crate::http_client::HttpClient;
use crate::types::ScanConfig;

const USERNAME_HINTS: &[&str] = &["username", "email", "user", "login", "userid", "account"];
const CSRF_HINTS: &[&str] = &["csrf", "xsrf", "authenticity_token", "_token", "nonce"];

/// Result of a successful login
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    /// Cookies set by the login response (name -> value)
    pub cookies: HashMap<String, String>,
    /// CSRF token submitted with the login form, if any
    pub csrf_token: Option<String>,
    /// Where the login form was posted
    pub authenticated_url: String,
    pub is_authenticated: bool,
}

impl AuthSession {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cookie names only, for logging without leaking values
    pub fn cookie_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cookies.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Login credentials for automatic authentication
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    /// Specific login URL (otherwise `<target>/login`)
    pub login_url: Option<String>,
}

impl LoginCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            login_url: None,
        }
    }

    pub fn with_login_url(mut self, url: &str) -> Self {
        self.login_url = Some(url.to_string());
        self
    }

    /// Credentials from a scan config, `None` when auth is disabled
    pub fn from_scan_config(config: &ScanConfig) -> Option<Self> {
        if !config.auth_enabled {
            return None;
        }
        let mut credentials = Self::new(
            config.auth_username.as_deref().unwrap_or_default(),
            config.auth_password.as_deref().unwrap_or_default(),
        );
        credentials.login_url = config.auth_login_url.clone();
        Some(credentials)
    }
}

/// Fields scraped from a login page
#[derive(Debug, Default, PartialEq)]
struct LoginForm {
    action: String,
    username_field: String,
    password_field: String,
    hidden: Vec<(String, String)>,
}

/// Form-based authenticator
pub struct Authenticator;

impl Authenticator {
    /// Fetch the login page, submit the form and verify the result.
    ///
    /// Any failure is fatal for the scan: crawling unauthenticated when the
    /// operator asked for an authenticated scan would produce misleading results.
    pub async fn login(
        http_client: &HttpClient,
        base_url: &str,
        credentials: &LoginCredentials,
    ) -> ScannerResult<AuthSession> {
        info!("[Auth] Starting authentication for: {}", base_url);

        let login_url = credentials
            .login_url
            .clone()
            .unwrap_or_else(|| format!("{}/login", base_url.trim_end_matches('/')));

        let page = http_client.get(&login_url).await.map_err(|e| {
            ScannerError::FatalCrawler(format!("login page {} unreachable: {}", login_url, e))
        })?;
        if page.status_code >= 400 {
            return Err(ScannerError::FatalCrawler(format!(
                "login page {} returned HTTP {}",
                login_url, page.status_code
            )));
        }

        let form = parse_login_form(&page.body, &page.final_url).ok_or_else(|| {
            ScannerError::FatalCrawler(format!("no login form found at {}", login_url))
        })?;
        debug!(
            "[Auth] Login form: action={} user_field={} pass_field={} hidden={}",
            form.action,
            form.username_field,
            form.password_field,
            form.hidden.len()
        );

        let mut fields = form.hidden.clone();
        fields.push((form.username_field.clone(), credentials.username.clone()));
        fields.push((form.password_field.clone(), credentials.password.clone()));

        let response = http_client.post_form(&form.action, &fields).await.map_err(|e| {
            ScannerError::FatalCrawler(format!("login submit to {} failed: {}", form.action, e))
        })?;

        if response.status_code >= 400 {
            return Err(ScannerError::FatalCrawler(format!(
                "login rejected with HTTP {}",
                response.status_code
            )));
        }
        if has_password_field(&response.body) {
            warn!("[Auth] Login form still present after submit");
            return Err(ScannerError::FatalCrawler(
                "login failed: login form still present after submit".to_string(),
            ));
        }

        let mut session = AuthSession::empty();
        session.authenticated_url = form.action.clone();
        session.is_authenticated = true;
        session.csrf_token = form
            .hidden
            .iter()
            .find(|(name, _)| {
                let lower = name.to_lowercase();
                CSRF_HINTS.iter().any(|hint| lower.contains(hint))
            })
            .map(|(_, value)| value.clone());

        if let Some(set_cookie) = response.header("set-cookie") {
            for line in set_cookie.lines() {
                let pair = line.split(';').next().unwrap_or_default();
                if let Some((name, value)) = pair.split_once('=') {
                    session
                        .cookies
                        .insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }

        info!(
            "[Auth] Login successful! Session cookies: {:?}",
            session.cookie_names()
        );
        Ok(session)
    }
}

fn has_password_field(html: &str) -> bool {
    let document = Html::parse_document(html);
    match Selector::parse("input[type='password']") {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

/// Locate the form holding a password input and collect what we must submit
fn parse_login_form(html: &str, page_url: &str) -> Option<LoginForm> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    for form in document.select(&form_selector) {
        let mut login = LoginForm::default();
        let mut text_fields: Vec<String> = Vec::new();

        for input in form.select(&input_selector) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            let input_type = input
                .value()
                .attr("type")
                .unwrap_or("text")
                .to_lowercase();

            match input_type.as_str() {
                "password" if login.password_field.is_empty() => {
                    login.password_field = name.to_string();
                }
                "hidden" => {
                    let value = input.value().attr("value").unwrap_or_default();
                    login.hidden.push((name.to_string(), value.to_string()));
                }
                "text" | "email" => text_fields.push(name.to_string()),
                _ => {}
            }
        }

        if login.password_field.is_empty() {
            continue;
        }

        login.username_field = text_fields
            .iter()
            .find(|name| {
                let lower = name.to_lowercase();
                USERNAME_HINTS.iter().any(|hint| lower.contains(hint))
            })
            .or_else(|| text_fields.first())
            .cloned()
            .unwrap_or_else(|| "username".to_string());

        let action = form.value().attr("action").unwrap_or_default();
        login.action = if action.is_empty() {
            page_url.to_string()
        } else {
            Url::parse(page_url)
                .and_then(|base| base.join(action))
                .map(|u| u.to_string())
                .unwrap_or_else(|_| action.to_string())
        };

        return Some(login);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><body>
          <form action="/search"><input name="q"></form>
          <form action="/session" method="post">
            <input type="hidden" name="csrf_token" value="abc123">
            <input type="text" name="nickname">
            <input type="email" name="user_email">
            <input type="password" name="pw">
            <input type="submit" value="Sign in">
          </form>
        </body></html>
    "#;

    #[test]
    fn test_parse_login_form() {
        let form = parse_login_form(LOGIN_PAGE, "https://example.com/login").unwrap();
        assert_eq!(form.action, "https://example.com/session");
        assert_eq!(form.username_field, "user_email");
        assert_eq!(form.password_field, "pw");
        assert_eq!(form.hidden, vec![("csrf_token".to_string(), "abc123".to_string())]);
    }

    #[test]
    fn test_form_without_action_posts_to_page() {
        let html = r#"<form><input name="login"><input type="password" name="password"></form>"#;
        let form = parse_login_form(html, "https://example.com/signin").unwrap();
        assert_eq!(form.action, "https://example.com/signin");
        assert_eq!(form.username_field, "login");
    }

    #[test]
    fn test_no_password_form() {
        assert!(parse_login_form("<form><input name='q'></form>", "https://example.com/").is_none());
    }

    #[test]
    fn test_credentials_from_config() {
        let mut config = ScanConfig::default();
        assert!(LoginCredentials::from_scan_config(&config).is_none());

        config.auth_enabled = true;
        config.auth_username = Some("admin".to_string());
        config.auth_password = Some("secret".to_string());
        config.auth_login_url = Some("https://example.com/auth".to_string());

        let creds = LoginCredentials::from_scan_config(&config).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.login_url.as_deref(), Some("https://example.com/auth"));
    }
}
