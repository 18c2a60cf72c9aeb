// SPDX-License-Identifier: Apache-2.0

//! Engine configuration
//!
//! Loaded from a JSON file; a missing file means defaults. The grade to class
//! table lives here instead of being repeated at every call site.

use std::path::{Path, PathBuf};

use access_core::GradeClassMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AccessError, AccessResult};

const CONFIG_PATH_ENV: &str = "ACCESS_ENGINE_CONFIG";
const SOURCE_TIMEOUT_ENV: &str = "ACCESS_ENGINE_SOURCE_TIMEOUT_MS";
const DEFAULT_CONFIG_FILE: &str = "access-engine.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessConfig {
    pub grade_class_map: GradeClassMap,
    /// Applied to subjects without a price, in minor currency units
    pub default_subject_price: i64,
    /// Budget for each grant-source fetch
    pub source_timeout_ms: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            grade_class_map: GradeClassMap::default(),
            default_subject_price: 29900,
            source_timeout_ms: 5000,
        }
    }
}

impl AccessConfig {
    /// Reads a JSON config file. Missing file yields the defaults.
    pub fn load(path: &Path) -> AccessResult<Self> {
        if !path.exists() {
            debug!("No access config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| {
                AccessError::config(format!("Failed to read {}: {}", path.display(), e))
            })?;
        let config: AccessConfig = serde_json::from_str(&content).map_err(|e| {
            AccessError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!(
            grades = config.grade_class_map.len(),
            "Loaded access configuration from {:?}", path
        );
        Ok(config)
    }

    /// Path from `ACCESS_ENGINE_CONFIG` (default `access-engine.json`), with
    /// `ACCESS_ENGINE_SOURCE_TIMEOUT_MS` overriding the fetch timeout.
    pub fn from_env() -> AccessResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load(&path)?;

        if let Ok(raw) = std::env::var(SOURCE_TIMEOUT_ENV) {
            config.source_timeout_ms = raw.trim().parse().map_err(|_| {
                AccessError::config(format!(
                    "{SOURCE_TIMEOUT_ENV} must be milliseconds, got {raw:?}"
                ))
            })?;
        }

        Ok(config)
    }
}
