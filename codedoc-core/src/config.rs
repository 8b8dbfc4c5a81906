//! Configuration management

use crate::config_error;
use crate::error::CodedocResult;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const COMPONENT: &str = "config";

/// Top-level configuration, stored as TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodedocConfig {
    pub cache: CacheConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

/// Repository cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `repos/`, `locks/` and `staging/`
    pub root: PathBuf,
    /// Replace corrupted entries with a fresh clone instead of failing
    pub recreate_corrupted: bool,
    /// How long `ensure` waits for another process holding the same entry
    pub lock_timeout_secs: u64,
    /// Poll interval while waiting for an entry lock
    pub lock_retry_ms: u64,
}

impl CacheConfig {
    /// Cache policy rooted at an explicit directory
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_home().join("cache"),
            recreate_corrupted: true,
            lock_timeout_secs: 30,
            lock_retry_ms: 100,
        }
    }
}

/// File-tree and history analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory names never descended into
    pub excluded_dirs: Vec<String>,
    /// Glob patterns for files skipped during the walk
    pub excluded_files: Vec<String>,
    /// Honor `.gitignore` files while walking
    pub use_gitignore: bool,
    /// Number of recent commits scanned for hotspots
    pub hotspot_scan_limit: usize,
    /// Files larger than this are counted but not line-counted
    pub max_file_size_mb: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
                ".venv".to_string(),
                "venv".to_string(),
                ".idea".to_string(),
                ".vscode".to_string(),
            ],
            excluded_files: vec![
                "*.log".to_string(),
                "*.tmp".to_string(),
                "*.cache".to_string(),
                "*.pyc".to_string(),
                ".DS_Store".to_string(),
            ],
            use_gitignore: true,
            hotspot_scan_limit: 200,
            max_file_size_mb: 10,
        }
    }
}

/// `~/.codedoc`, or a directory under the system temp dir when there is no home
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".codedoc")
}

/// `~/.codedoc/config.toml`
pub fn default_config_path() -> PathBuf {
    default_home().join("config.toml")
}

impl CodedocConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CodedocResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error!(
                format!("Failed to read config file: {}", e),
                COMPONENT,
                "read_file",
                "Check if the config file exists and is readable",
                e
            )
        })?;

        let config: CodedocConfig = toml::from_str(&content).map_err(|e| {
            config_error!(
                format!("Failed to parse config: {}", e),
                COMPONENT,
                "parse_toml",
                "Check TOML syntax in config file",
                e
            )
        })?;

        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> CodedocResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CodedocResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            config_error!(
                format!("Failed to serialize config: {}", e),
                COMPONENT,
                "serialize_toml",
                "Check the configuration values",
                e
            )
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| {
            config_error!(
                format!("Failed to write config file: {}", e),
                COMPONENT,
                "write_file",
                "Check if the directory exists and is writable",
                e
            )
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> CodedocResult<()> {
        if self.cache.root.as_os_str().is_empty() {
            return Err(config_error!(
                "Cache root must not be empty",
                COMPONENT,
                "validate",
                "Set cache.root to a writable directory"
            ));
        }

        if self.cache.lock_timeout_secs == 0 {
            return Err(config_error!(
                "Cache lock_timeout_secs must be greater than 0",
                COMPONENT,
                "validate",
                "Set cache.lock_timeout_secs to a positive value"
            ));
        }

        if self.cache.lock_retry_ms == 0 {
            return Err(config_error!(
                "Cache lock_retry_ms must be greater than 0",
                COMPONENT,
                "validate",
                "Set cache.lock_retry_ms to a positive value"
            ));
        }

        if self.analysis.hotspot_scan_limit == 0 {
            return Err(config_error!(
                "Analysis hotspot_scan_limit must be greater than 0",
                COMPONENT,
                "validate",
                "Set analysis.hotspot_scan_limit to a positive value"
            ));
        }

        Ok(())
    }
}
