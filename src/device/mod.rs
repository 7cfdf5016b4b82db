//! Android device bridge.
//!
//! `DeviceBridge` is the seam the resolver and deployer talk through;
//! `AdbBridge` is the real implementation shelling out to adb.

pub mod arch;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, SetupError};
use crate::runner;

#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Serials of connected devices in the `device` state.
    async fn list_devices(&self) -> Result<Vec<String>>;

    /// Value of a device property such as `ro.product.cpu.abi`.
    async fn getprop(&self, key: &str) -> Result<String>;

    async fn push(&self, local: &Path, remote: &str) -> Result<()>;

    /// Run a shell command on the device; nonzero exit is not an error.
    async fn shell(&self, command: &str) -> Result<runner::CmdOutput>;
}

pub struct AdbBridge {
    adb: PathBuf,
}

impl AdbBridge {
    pub fn new() -> Self {
        Self { adb: adb_path() }
    }

    async fn adb(&self, args: &[&str]) -> Result<runner::CmdOutput> {
        let program = self.adb.display().to_string();
        let out = runner::run(&program, args).await;
        if out.status.is_none() {
            return Err(SetupError::Bridge(format!(
                "adb not found or not runnable ({}): {}",
                self.adb.display(),
                out.stderr.trim()
            )));
        }
        Ok(out)
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// PATH first, then the SDK platform-tools directory.
pub(crate) fn adb_path() -> PathBuf {
    if let Ok(path) = which::which("adb") {
        return path;
    }
    if let Ok(sdk_root) =
        std::env::var("ANDROID_SDK_ROOT").or_else(|_| std::env::var("ANDROID_HOME"))
    {
        let candidate = PathBuf::from(&sdk_root).join("platform-tools").join("adb");
        if candidate.exists() {
            return candidate;
        }
        let candidate = PathBuf::from(&sdk_root)
            .join("platform-tools")
            .join("adb.exe");
        if candidate.exists() {
            return candidate;
        }
    }
    PathBuf::from("adb")
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn list_devices(&self) -> Result<Vec<String>> {
        let out = self.adb(&["devices"]).await?;
        Ok(parse_devices(&out.stdout))
    }

    async fn getprop(&self, key: &str) -> Result<String> {
        let out = self.adb(&["shell", "getprop", key]).await?;
        if !out.success() {
            return Err(SetupError::Bridge(format!(
                "getprop {key} failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(out.stdout.trim().to_string())
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.display().to_string();
        let out = self.adb(&["push", &local, remote]).await?;
        if !out.success() {
            return Err(SetupError::Bridge(format!(
                "adb push failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn shell(&self, command: &str) -> Result<runner::CmdOutput> {
        self.adb(&["shell", command]).await
    }
}

/// Keep only serials in the `device` state; `unauthorized` and `offline`
/// entries cannot be provisioned.
fn parse_devices(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adb_devices_output() {
        let out = "List of devices attached\nemulator-5554\tdevice\nABC123\tunauthorized\n\n";
        assert_eq!(parse_devices(out), vec!["emulator-5554"]);
    }

    #[test]
    fn empty_device_list() {
        let out = "List of devices attached\n\n";
        assert!(parse_devices(out).is_empty());
    }
}
