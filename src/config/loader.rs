// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::core::AppConfig;
use super::validation::ConfigValidator;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    pub fn with_format<P: AsRef<Path>>(config_path: P, format: ConfigFormat) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let mut config = self.parse(&content)?;

        apply_env_overrides(&mut config)?;

        ConfigValidator::validate_app_config(&config)?;

        debug!("Loaded configuration from {:?}", self.config_path);
        Ok(config)
    }

    /// Parse without env overrides or validation
    pub fn parse(&self, content: &str) -> Result<AppConfig> {
        let config = match self.format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .context("Failed to parse YAML config")?,
            ConfigFormat::Toml => toml::from_str(content)
                .context("Failed to parse TOML config")?,
            ConfigFormat::Json => serde_json::from_str(content)
                .context("Failed to parse JSON config")?,
        };
        Ok(config)
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        ConfigValidator::validate_app_config(config)?;

        let content = match self.format {
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config)?,
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        };

        std::fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;

        Ok(())
    }
}

pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides from any key lookup
pub(crate) fn apply_overrides_from<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_url) = lookup("DATABASE_URL") {
        config.database.url = db_url;
        config.database.enabled = true;
    }

    if let Some(log_level) = lookup("LOG_LEVEL") {
        config.observability.log_level = log_level;
    }

    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = format
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid LOG_FORMAT")?;
    }

    if let Some(node_id) = lookup("SCANWARD_NODE_ID") {
        config.scanner.node_id = node_id;
    }

    if let Some(tick) = lookup("SCHEDULER_TICK_SECS") {
        config.scheduler.tick_interval_secs = tick.parse()
            .context("Invalid SCHEDULER_TICK_SECS")?;
    }

    if let Some(scans) = lookup("SCANNER_MAX_CONCURRENT_SCANS") {
        config.scanner.max_concurrent_scans = scans.parse()
            .context("Invalid SCANNER_MAX_CONCURRENT_SCANS")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_detect_format() {
        assert_eq!(ConfigLoader::detect_format(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigLoader::detect_format(Path::new("a.yaml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigLoader::detect_format(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigLoader::detect_format(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigLoader::detect_format(Path::new("a.ini")).is_err());
        assert!(ConfigLoader::detect_format(Path::new("config")).is_err());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let loader = ConfigLoader::with_format("scanward.yaml", ConfigFormat::Yaml);
        let config = loader
            .parse("scanner:\n  allow_private_targets: true\nscheduler:\n  tick_interval_secs: 15\n")
            .unwrap();
        assert!(config.scanner.allow_private_targets);
        assert_eq!(config.scheduler.tick_interval_secs, 15);
        assert_eq!(config.database.pool_size, 20);
        assert!(!config.database.enabled);
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::with_format("scanward.toml", ConfigFormat::Toml);
        let config = loader
            .parse("[observability]\nlog_level = \"debug\"\nlog_format = \"json\"\n")
            .unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, super::super::core::LogFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://db/scans"),
            ("SCANWARD_NODE_ID", "node-7"),
            ("SCHEDULER_TICK_SECS", "5"),
            ("SCANNER_MAX_CONCURRENT_SCANS", "12"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_overrides_from(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert!(config.database.enabled);
        assert_eq!(config.database.url, "postgres://db/scans");
        assert_eq!(config.scanner.node_id, "node-7");
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.scanner.max_concurrent_scans, 12);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = AppConfig::default();
        let result = apply_overrides_from(&mut config, |k| {
            (k == "SCHEDULER_TICK_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
