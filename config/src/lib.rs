//! Gridseal Configuration
//!
//! Shared configuration crate for the client library and the CLI.
//!
//! Handles loading configuration from:
//! 1. GS_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.gridseal/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".gridseal";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BLOCK_TIME_MS: u64 = 400;
const DEFAULT_RECORD_LABEL: &str = "Energy Audit Data";

const DEFAULT_SUCCESS_CLEAR_MS: u64 = 2000;
const DEFAULT_ERROR_CLEAR_MS: u64 = 3000;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const DEFAULT_RECENT_WINDOW_SECS: u64 = 60 * 60 * 24 * 7;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridsealConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub client: ClientTomlConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

/// Ledger connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    /// Upper bound on a transaction confirmation wait
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Block time of the local devnet
    #[serde(default = "default_block_time")]
    pub block_time_ms: u64,
    /// Label stored with every new record
    #[serde(default = "default_record_label")]
    pub record_label: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.into(),
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            record_label: DEFAULT_RECORD_LABEL.into(),
        }
    }
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.into()
}
fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}
fn default_block_time() -> u64 {
    DEFAULT_BLOCK_TIME_MS
}
fn default_record_label() -> String {
    DEFAULT_RECORD_LABEL.into()
}

/// Status notification timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_success_clear")]
    pub success_clear_ms: u64,
    #[serde(default = "default_error_clear")]
    pub error_clear_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            success_clear_ms: DEFAULT_SUCCESS_CLEAR_MS,
            error_clear_ms: DEFAULT_ERROR_CLEAR_MS,
        }
    }
}

fn default_success_clear() -> u64 {
    DEFAULT_SUCCESS_CLEAR_MS
}
fn default_error_clear() -> u64 {
    DEFAULT_ERROR_CLEAR_MS
}

/// Client-side bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTomlConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Window for the "recent records" dashboard counter
    #[serde(default = "default_recent_window")]
    pub recent_window_secs: u64,
}

impl Default for ClientTomlConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
        }
    }
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_recent_window() -> u64 {
    DEFAULT_RECENT_WINDOW_SECS
}

/// Feature flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub dev_mode: bool,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable {}={}", key, v);
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl GridsealConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check GS_CONFIG env var
        if let Ok(path) = env::var("GS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.gridseal/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Ledger
        env_string("GS_CONTRACT_ADDRESS", &mut self.ledger.contract_address);
        env_parse(
            "GS_CONFIRMATION_TIMEOUT_SECS",
            &mut self.ledger.confirmation_timeout_secs,
        );
        env_parse("GS_BLOCK_TIME_MS", &mut self.ledger.block_time_ms);

        // Status
        env_parse("GS_SUCCESS_CLEAR_MS", &mut self.status.success_clear_ms);
        env_parse("GS_ERROR_CLEAR_MS", &mut self.status.error_clear_ms);

        // Features
        if let Some(v) = env_bool("GS_DEV_MODE") {
            self.features.dev_mode = v;
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.features.dev_mode = true;
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GridsealConfig::default();
        assert_eq!(config.ledger.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.ledger.confirmation_timeout_secs, 120);
        assert_eq!(config.ledger.record_label, "Energy Audit Data");
        assert_eq!(config.status.success_clear_ms, 2000);
        assert_eq!(config.status.error_clear_ms, 3000);
        assert!(!config.features.dev_mode);
    }

    #[test]
    fn test_generate_sample() {
        let sample = GridsealConfig::generate_sample();
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[status]"));
        assert!(sample.contains("[client]"));
        assert!(sample.contains("[features]"));
    }

    #[test]
    fn test_sample_ledger_section() {
        let sample = GridsealConfig::generate_sample();
        let ledger = sample
            .split("[ledger]")
            .nth(1)
            .and_then(|rest| rest.split("\n[").next())
            .unwrap();
        let keys: Vec<&str> = ledger
            .lines()
            .filter_map(|line| line.split_once(" = ").map(|(key, _)| key.trim()))
            .collect();
        assert_eq!(
            keys,
            vec![
                "contract_address",
                "confirmation_timeout_secs",
                "block_time_ms",
                "record_label"
            ]
        );
    }

    #[test]
    fn test_parse_sample() {
        let sample = GridsealConfig::generate_sample();
        let parsed: GridsealConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.ledger.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert!(parsed.features.dev_mode);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[status]\nsuccess_clear_ms = 500").unwrap();

        let config = GridsealConfig::read_file(file.path()).unwrap();
        assert_eq!(config.status.success_clear_ms, 500);
        assert_eq!(config.status.error_clear_ms, DEFAULT_ERROR_CLEAR_MS);
        assert_eq!(config.ledger.block_time_ms, DEFAULT_BLOCK_TIME_MS);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger\ncontract_address = ").unwrap();

        let err = GridsealConfig::read_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
