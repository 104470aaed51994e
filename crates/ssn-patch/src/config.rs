//! Patch configuration

use crate::error::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Host serving patch files
pub const DEFAULT_PATCH_HOST: &str = "cdn-patch.swtor.com";

/// Host serving `.patchmanifest` files
pub const DEFAULT_MANIFEST_HOST: &str = "manifest.swtor.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// CDN host for `.solidpkg`, `.zip` and disk files
    pub patch_host: String,

    /// Host for product `.patchmanifest` files
    pub manifest_host: String,

    /// URL scheme used against the CDN
    pub scheme: String,

    /// Where downloaded disk files are kept
    pub cache_dir: PathBuf,

    /// Disk files downloaded at the same time
    pub fetch_concurrency: usize,

    /// Files installed at the same time
    pub install_concurrency: usize,

    /// External installer helper; the in-process installer is used when unset
    pub installer: Option<PathBuf>,

    /// Remove downloaded disk files after a hop installed cleanly
    pub cleanup_disks: bool,

    /// Largest response held in memory
    pub max_memory_size: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Timeout between received chunks in seconds
    pub read_timeout_secs: u64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            patch_host: DEFAULT_PATCH_HOST.to_string(),
            manifest_host: DEFAULT_MANIFEST_HOST.to_string(),
            scheme: "http".to_string(),
            cache_dir: std::env::temp_dir().join("ssn-patch"),
            fetch_concurrency: 2,
            install_concurrency: 3,
            installer: None,
            cleanup_disks: false,
            max_memory_size: 100 * 1024 * 1024,
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl PatchConfig {
    /// Configuration from `SSN_PATCH_*` environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            patch_host: std::env::var("SSN_PATCH_HOST").unwrap_or(defaults.patch_host),
            manifest_host: std::env::var("SSN_PATCH_MANIFEST_HOST")
                .unwrap_or(defaults.manifest_host),
            scheme: std::env::var("SSN_PATCH_SCHEME").unwrap_or(defaults.scheme),
            cache_dir: std::env::var("SSN_PATCH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            fetch_concurrency: env_parse("SSN_PATCH_FETCH_CONCURRENCY")
                .unwrap_or(defaults.fetch_concurrency),
            install_concurrency: env_parse("SSN_PATCH_INSTALL_CONCURRENCY")
                .unwrap_or(defaults.install_concurrency),
            installer: std::env::var("SSN_PATCH_INSTALLER")
                .map(PathBuf::from)
                .ok()
                .or(defaults.installer),
            cleanup_disks: env_parse("SSN_PATCH_CLEANUP").unwrap_or(defaults.cleanup_disks),
            max_memory_size: env_parse("SSN_PATCH_MAX_MEMORY_SIZE")
                .unwrap_or(defaults.max_memory_size),
            connect_timeout_secs: env_parse("SSN_PATCH_CONNECT_TIMEOUT")
                .unwrap_or(defaults.connect_timeout_secs),
            read_timeout_secs: env_parse("SSN_PATCH_READ_TIMEOUT")
                .unwrap_or(defaults.read_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            return Err(PatchError::Config(
                "fetch concurrency must be at least 1".to_string(),
            ));
        }
        if self.install_concurrency == 0 {
            return Err(PatchError::Config(
                "install concurrency must be at least 1".to_string(),
            ));
        }
        if self.patch_host.is_empty() {
            return Err(PatchError::Config("patch host is empty".to_string()));
        }
        if self.manifest_host.is_empty() {
            return Err(PatchError::Config("manifest host is empty".to_string()));
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(PatchError::Config(format!(
                "unsupported scheme \"{}\"",
                self.scheme
            )));
        }
        Ok(())
    }
}
