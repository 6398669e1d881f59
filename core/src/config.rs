//! Engine configuration.
//!
//! Layered as defaults, then an optional YAML (or JSON) file, then the
//! environment. The CLI applies its own flags last.

use crate::error::{ImageError, Result};
use crate::limits::{ProcessLimits, MAX_LIMIT_VALUE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable carrying the owner identity used to label progress.
pub const OWNER_UID_ENV: &str = "OWNER_UID";

/// Image tool binary used when none is configured.
pub const DEFAULT_QEMU_IMG: &str = "qemu-img";

/// Environment variable overriding the image tool binary.
pub const QEMU_IMG_ENV: &str = "DISKIMG_QEMU_IMG";

/// Default network timeout for streaming conversions, in seconds.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 3600;

/// Largest network timeout the tool's curl driver accepts.
pub const MAX_NETWORK_TIMEOUT_SECS: u64 = 10000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Image tool binary, resolved through `PATH` when relative
    pub qemu_img: PathBuf,

    /// Limits applied to `qemu-img info`
    pub info_limits: ProcessLimits,

    /// Timeout handed to the tool for network-backed sources
    pub network_timeout_secs: u64,

    /// Logical job identity labelling the progress metric; empty disables reporting
    pub owner_uid: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            qemu_img: PathBuf::from(DEFAULT_QEMU_IMG),
            info_limits: ProcessLimits::info(),
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            owner_uid: String::new(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImageError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(owner) = lookup(OWNER_UID_ENV) {
            self.owner_uid = owner;
        }
        if let Some(binary) = lookup(QEMU_IMG_ENV).filter(|b| !b.is_empty()) {
            self.qemu_img = PathBuf::from(binary);
        }
        self
    }

    /// Check values the tool would otherwise reject at run time.
    pub fn validate(&self) -> Result<()> {
        if self.qemu_img.as_os_str().is_empty() {
            return Err(ImageError::Config("qemu_img must not be empty".to_string()));
        }
        if self.network_timeout_secs == 0 || self.network_timeout_secs > MAX_NETWORK_TIMEOUT_SECS {
            return Err(ImageError::Config(format!(
                "network_timeout_secs must be between 1 and {}, got {}",
                MAX_NETWORK_TIMEOUT_SECS, self.network_timeout_secs
            )));
        }
        if !self.info_limits.is_representable() {
            return Err(ImageError::Config(format!(
                "info_limits values must not exceed {}, got {:?}",
                MAX_LIMIT_VALUE, self.info_limits
            )));
        }
        Ok(())
    }
}
