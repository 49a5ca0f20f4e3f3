// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Scan type determines how intrusive the vulnerability analysis is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Passive checks only, no probe requests
    Quick,
    Standard,
    /// Everything, including out-of-band style probes
    Deep,
}

impl Default for ScanType {
    fn default() -> Self {
        ScanType::Standard
    }
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Quick => "quick",
            ScanType::Standard => "standard",
            ScanType::Deep => "deep",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(ScanType::Quick),
            "standard" => Ok(ScanType::Standard),
            "deep" => Ok(ScanType::Deep),
            other => Err(format!("unknown scan type: {}", other)),
        }
    }
}

/// Scan lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Queued,
    Scanning,
    Processing,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Queued => "queued",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Processing => "processing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanStatus::Queued | ScanStatus::Scanning | ScanStatus::Processing
        )
    }

    /// Position along the success path. `Failed` has no rank.
    pub(crate) fn rank(&self) -> Option<u8> {
        match self {
            ScanStatus::Pending => Some(0),
            ScanStatus::Queued => Some(1),
            ScanStatus::Scanning => Some(2),
            ScanStatus::Processing => Some(3),
            ScanStatus::Completed => Some(4),
            ScanStatus::Failed => None,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "queued" => Ok(ScanStatus::Queued),
            "scanning" => Ok(ScanStatus::Scanning),
            "processing" => Ok(ScanStatus::Processing),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(format!("unknown scan status: {}", other)),
        }
    }
}

/// Finding severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Triage status of a finding. The engine only ever creates `Open` findings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Fixed,
    FalsePositive,
}

impl Default for FindingStatus {
    fn default() -> Self {
        FindingStatus::Open
    }
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Fixed => "fixed",
            FindingStatus::FalsePositive => "false_positive",
        }
    }
}

impl FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(FindingStatus::Open),
            "fixed" => Ok(FindingStatus::Fixed),
            "false_positive" => Ok(FindingStatus::FalsePositive),
            other => Err(format!("unknown finding status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Per-scan configuration, validated before a run starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    #[serde(default)]
    pub scan_type: ScanType,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_true")]
    pub check_headers: bool,

    #[serde(default = "default_true")]
    pub check_mixed_content: bool,

    #[serde(default = "default_true")]
    pub check_robots: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub is_scheduled: bool,

    #[serde(default)]
    pub schedule_cron: Option<String>,

    #[serde(default)]
    pub auth_enabled: bool,

    #[serde(default)]
    pub auth_login_url: Option<String>,

    #[serde(default)]
    pub auth_username: Option<String>,

    #[serde(default)]
    pub auth_password: Option<String>,

    #[serde(default = "default_true", rename = "vectorSQLi")]
    pub vector_sqli: bool,

    #[serde(default = "default_true", rename = "vectorXSS")]
    pub vector_xss: bool,

    #[serde(default = "default_true", rename = "vectorSSRF")]
    pub vector_ssrf: bool,

    #[serde(default = "default_true")]
    pub vector_misconfig: bool,

    /// Requests allowed per `rate_limit_interval_ms`
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    #[serde(default = "default_rate_limit_interval")]
    pub rate_limit_interval_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> u32 {
    100
}

fn default_user_agent() -> String {
    format!("ScanwardBot/{} (+security scanner)", env!("CARGO_PKG_VERSION"))
}

fn default_rate_limit() -> u32 {
    10
}

fn default_rate_limit_interval() -> u64 {
    1000
}

fn default_concurrency() -> u32 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_scan_timeout() -> u64 {
    3600
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Standard,
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            check_headers: true,
            check_mixed_content: true,
            check_robots: true,
            user_agent: default_user_agent(),
            is_scheduled: false,
            schedule_cron: None,
            auth_enabled: false,
            auth_login_url: None,
            auth_username: None,
            auth_password: None,
            vector_sqli: true,
            vector_xss: true,
            vector_ssrf: true,
            vector_misconfig: true,
            rate_limit: default_rate_limit(),
            rate_limit_interval_ms: default_rate_limit_interval(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            scan_timeout_secs: default_scan_timeout(),
        }
    }
}

impl ScanConfig {
    /// Whether analyzers may send their own probe requests
    pub fn allows_active_probes(&self) -> bool {
        self.scan_type != ScanType::Quick
    }

    pub fn enabled_vectors(&self) -> Vec<&'static str> {
        let mut vectors = Vec::new();
        if self.vector_sqli {
            vectors.push("sqli");
        }
        if self.vector_xss {
            vectors.push("xss");
        }
        if self.vector_ssrf {
            vectors.push("ssrf");
        }
        if self.vector_misconfig {
            vectors.push("misconfig");
        }
        vectors
    }

    /// Copy used for a generated child run: same crawl settings, no recurrence
    pub fn as_child_config(&self) -> Self {
        Self {
            is_scheduled: false,
            schedule_cron: None,
            ..self.clone()
        }
    }
}

/// One traversal run, or a recurring template when `config.is_scheduled` is set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: Uuid,
    pub project_id: Uuid,
    pub target_url: String,
    pub status: ScanStatus,
    pub progress: u8,
    pub current_action: String,
    pub node: Option<String>,
    pub config: ScanConfig,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_scan_id: Option<Uuid>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn is_template(&self) -> bool {
        self.config.is_scheduled
    }
}

/// Input for `ScanStore::create_scan`
#[derive(Debug, Clone)]
pub struct NewScan {
    pub project_id: Uuid,
    pub target_url: String,
    pub config: ScanConfig,
    pub parent_scan_id: Option<Uuid>,
    /// Only meaningful for templates
    pub next_run_at: Option<DateTime<Utc>>,
}

impl NewScan {
    pub fn new(project_id: Uuid, target_url: impl Into<String>, config: ScanConfig) -> Self {
        Self {
            project_id,
            target_url: target_url.into(),
            config,
            parent_scan_id: None,
            next_run_at: None,
        }
    }

    /// Child run generated from a recurring template
    pub fn child_of(template: &Scan) -> Self {
        Self {
            project_id: template.project_id,
            target_url: template.target_url.clone(),
            config: template.config.as_child_config(),
            parent_scan_id: Some(template.id),
            next_run_at: None,
        }
    }
}

/// Partial update of a scan's live state. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStatusUpdate {
    pub status: Option<ScanStatus>,
    pub progress: Option<u8>,
    pub current_action: Option<String>,
    pub node: Option<String>,
}

/// Normalized URL reached during a scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAsset {
    pub scan_id: Uuid,
    pub url: String,
    /// `None` when the request failed before any HTTP status was received
    pub status_code: Option<u16>,
    pub depth: u32,
    pub discovered_at: DateTime<Utc>,
}

/// One vulnerability observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub analyzer: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: FindingStatus,
    pub cve: Option<String>,
    pub cwe: Option<String>,
    pub cvss: f32,
    pub url: String,
    /// Parameter or header the finding is located at
    pub parameter: Option<String>,
    pub evidence: Option<String>,
    pub remediation: String,
    pub discovered_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        scan_id: Uuid,
        analyzer: &str,
        title: &str,
        severity: Severity,
        url: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_id,
            analyzer: analyzer.to_string(),
            title: title.to_string(),
            description: String::new(),
            severity,
            status: FindingStatus::Open,
            cve: None,
            cwe: None,
            cvss: 0.0,
            url: url.to_string(),
            parameter: None,
            evidence: None,
            remediation: String::new(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    pub fn with_cwe(mut self, cwe: &str) -> Self {
        self.cwe = Some(cwe.to_string());
        self
    }

    pub fn with_cvss(mut self, cvss: f32) -> Self {
        self.cvss = cvss;
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }
}

/// Append-only scan narration entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanLog {
    pub scan_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
