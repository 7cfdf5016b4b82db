use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact;
use crate::deploy;
use crate::device::arch::DeviceArchitecture;
use crate::error::{Result, SetupError};

pub const DEFAULT_FRIDA_VERSION: &str = "15.2.2";
pub const DEFAULT_TOOLS_VERSION: &str = "10.4.1";

/// Optional config file with defaults for repeated runs. A missing file is
/// not an error; everything has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_frida_version")]
    pub frida_version: String,
    #[serde(default = "default_tools_version")]
    pub tools_version: String,
    /// Pinned target architecture; auto-detect when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<DeviceArchitecture>,
    #[serde(default = "default_base_url")]
    pub download_base_url: String,
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
}

fn default_frida_version() -> String {
    DEFAULT_FRIDA_VERSION.to_string()
}

fn default_tools_version() -> String {
    DEFAULT_TOOLS_VERSION.to_string()
}

fn default_base_url() -> String {
    artifact::DEFAULT_BASE_URL.to_string()
}

fn default_remote_path() -> String {
    deploy::DEFAULT_REMOTE_PATH.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frida_version: default_frida_version(),
            tools_version: default_tools_version(),
            arch: None,
            download_base_url: default_base_url(),
            remote_path: default_remote_path(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.config/frida-setup").to_string())
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| SetupError::Config(format!("invalid {}: {e}", path.display())))
    }
}

/// What this run was asked to provision. Built once from CLI flags layered
/// over the config file; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub frida_version: String,
    pub tools_version: String,
    pub arch: Option<DeviceArchitecture>,
    pub base_url: String,
    pub remote_path: String,
}

impl TargetSpec {
    pub fn new(
        config: AppConfig,
        frida_version: Option<String>,
        tools_version: Option<String>,
        arch: Option<DeviceArchitecture>,
    ) -> Self {
        Self {
            frida_version: frida_version.unwrap_or(config.frida_version),
            tools_version: tools_version.unwrap_or(config.tools_version),
            arch: arch.or(config.arch),
            base_url: config.download_base_url,
            remote_path: config.remote_path,
        }
    }
}
