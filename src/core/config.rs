//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SentinelError};

/// Full Scene Sentinel configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub matcher: MatcherConfig,
    pub backup: BackupConfig,
    pub scan: ScanConfig,
    pub logging: LoggingConfig,
}

/// Matcher and sanitizer knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatcherConfig {
    /// A sanitized file whose trimmed remainder is shorter than this is
    /// deleted outright instead of rewritten.
    pub empty_threshold_bytes: usize,
}

/// Backup policy for pre-fix originals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackupConfig {
    /// Explicit backup root. When set, the original directory structure is
    /// mirrored underneath it. When unset, backups land in a sibling folder.
    pub root: Option<PathBuf>,
    /// Sibling folder name used when no explicit root is configured.
    pub folder_name: String,
    /// Skip backups entirely.
    pub ignore: bool,
}

/// Batch scan behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Suppress interactive host prompts when opening scene files.
    pub suppress_prompts: bool,
    /// Extra environment applied to the process before pattern scans.
    pub extra_env: HashMap<String, String>,
}

/// Activity log destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory holding the activity log. Defaults to the OS temp dir.
    pub root: Option<PathBuf>,
    /// Log file stem, `<name>.jsonl`.
    pub name: String,
    /// Optional fallback path on a different filesystem.
    pub fallback_path: Option<PathBuf>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            empty_threshold_bytes: 50,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: None,
            folder_name: "_virus".to_string(),
            ignore: false,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            suppress_prompts: true,
            extra_env: HashMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            root: None,
            name: "scene_sentinel".to_string(),
            fallback_path: None,
        }
    }
}

impl LoggingConfig {
    /// Resolved path of the activity log file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        let root = self
            .root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        root.join(format!("{}.jsonl", self.name))
    }
}

impl Config {
    /// Default configuration path: `~/.config/scene-sentinel/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home_dir
            .join(".config")
            .join("scene-sentinel")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SentinelError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SentinelError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides given as `SSN_*` key/value pairs, e.g. the
    /// `[scan].extra_env` table at batch-scan start. Unknown keys are
    /// ignored.
    pub fn apply_overrides(
        &mut self,
        vars: &HashMap<String, String>,
    ) -> Result<()> {
        for (key, raw) in vars {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match key.as_str() {
                "SSN_EMPTY_THRESHOLD" => {
                    self.matcher.empty_threshold_bytes =
                        raw.parse::<usize>()
                            .map_err(|error| SentinelError::ConfigParse {
                                context: "scan.extra_env",
                                details: format!("{key}={raw:?}: {error}"),
                            })?;
                }
                "SSN_BACKUP_ROOT" => self.backup.root = Some(PathBuf::from(raw)),
                "SSN_BACKUP_FOLDER_NAME" => self.backup.folder_name = raw.to_string(),
                "SSN_IGNORE_BACKUP" => {
                    self.backup.ignore = match raw.to_ascii_lowercase().as_str() {
                        "1" | "true" | "yes" | "on" => true,
                        "0" | "false" | "no" | "off" => false,
                        _ => {
                            return Err(SentinelError::ConfigParse {
                                context: "scan.extra_env",
                                details: format!("{key}={raw:?}: expected a boolean"),
                            });
                        }
                    };
                }
                "SSN_LOG_ROOT" => self.logging.root = Some(PathBuf::from(raw)),
                "SSN_LOG_NAME" => self.logging.name = raw.to_string(),
                _ => {}
            }
        }
        self.validate()
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_usize(
            "SSN_EMPTY_THRESHOLD",
            &mut self.matcher.empty_threshold_bytes,
        )?;
        set_env_opt_path("SSN_BACKUP_ROOT", &mut self.backup.root);
        set_env_string("SSN_BACKUP_FOLDER_NAME", &mut self.backup.folder_name);
        set_env_bool("SSN_IGNORE_BACKUP", &mut self.backup.ignore)?;
        set_env_opt_path("SSN_LOG_ROOT", &mut self.logging.root);
        set_env_string("SSN_LOG_NAME", &mut self.logging.name);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.backup.folder_name.is_empty() {
            return Err(SentinelError::InvalidConfig {
                details: "backup.folder_name must not be empty".to_string(),
            });
        }
        if self.backup.folder_name.contains(std::path::MAIN_SEPARATOR) {
            return Err(SentinelError::InvalidConfig {
                details: format!(
                    "backup.folder_name must be a bare directory name, got {:?}",
                    self.backup.folder_name
                ),
            });
        }
        if self.logging.name.is_empty() {
            return Err(SentinelError::InvalidConfig {
                details: "logging.name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| SentinelError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(SentinelError::ConfigParse {
                    context: "env",
                    details: format!("{name}={raw:?}: expected a boolean"),
                });
            }
        };
    }
    Ok(())
}

fn set_env_string(name: &str, slot: &mut String) {
    if let Some(raw) = env_var(name) {
        *slot = raw;
    }
}

fn set_env_opt_path(name: &str, slot: &mut Option<PathBuf>) {
    if let Some(raw) = env_var(name) {
        *slot = Some(PathBuf::from(raw));
    }
}
