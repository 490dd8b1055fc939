//! SSN-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Top-level error type for Scene Sentinel.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("[SSN-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SSN-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SSN-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SSN-2001] detection failure for {path}: {details}")]
    Detection { path: PathBuf, details: String },

    #[error("[SSN-2002] signature compile failure for family {family}: {details}")]
    SignatureCompile { family: String, details: String },

    #[error("[SSN-2101] remediation failure for {target}: {details}")]
    Remediation { target: String, details: String },

    #[error("[SSN-2201] vaccine load failure for family {family}: {details}")]
    PluginLoad { family: String, details: String },

    #[error("[SSN-3001] scan target failed to open: {path}: {details}")]
    ScanOpen { path: PathBuf, details: String },

    #[error("[SSN-3002] invalid scan input: {details}")]
    ScanInput { details: String },

    #[error("[SSN-3101] callback failure on event {event}: {details}")]
    Callback { event: String, details: String },

    #[error("[SSN-4001] scene operation failed in {context}: {details}")]
    Scene {
        context: &'static str,
        details: String,
    },

    #[error("[SSN-5001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SSN-5101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SSN-5901] runtime failure: {details}")]
    Runtime { details: String },
}

impl SentinelError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SSN-1001",
            Self::MissingConfig { .. } => "SSN-1002",
            Self::ConfigParse { .. } => "SSN-1003",
            Self::Detection { .. } => "SSN-2001",
            Self::SignatureCompile { .. } => "SSN-2002",
            Self::Remediation { .. } => "SSN-2101",
            Self::PluginLoad { .. } => "SSN-2201",
            Self::ScanOpen { .. } => "SSN-3001",
            Self::ScanInput { .. } => "SSN-3002",
            Self::Callback { .. } => "SSN-3101",
            Self::Scene { .. } => "SSN-4001",
            Self::Io { .. } => "SSN-5001",
            Self::Serialization { .. } => "SSN-5101",
            Self::Runtime { .. } => "SSN-5901",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Scene { .. } | Self::ScanOpen { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SentinelError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
