// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Configuration: process-level `AppConfig` loaded from YAML/TOML/JSON with
//! environment overrides, and validation of per-scan settings.

pub mod core;
pub mod loader;
pub mod validation;

pub use self::core::{
    AppConfig, DatabaseConfig, LogFormat, ObservabilityConfig, ScannerConfig, SchedulerConfig,
};
pub use loader::{apply_env_overrides, ConfigFormat, ConfigLoader};
pub use validation::{validate_scan_config, ConfigValidator};

use anyhow::Result;
use std::path::Path;

/// Load from `path` when given, otherwise defaults plus environment overrides
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => ConfigLoader::new(path)?.load_config(),
        None => AppConfig::from_env(),
    }
}

/// Write the default config to `path`, format picked by extension
pub fn create_default_config(path: &Path) -> Result<()> {
    let loader = ConfigLoader::new(path)?;
    loader.save_config(&AppConfig::default())
}
