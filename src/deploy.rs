//! Pushing frida-server to the device and optionally starting it.

use std::time::Duration;

use crate::artifact::ArtifactLocation;
use crate::device::DeviceBridge;
use crate::error::Result;

pub const DEFAULT_REMOTE_PATH: &str = "/data/local/tmp/frida-server";

/// Grace period after launching the server. adb gives no reliable "process
/// started" signal, so waiting this long is a best-effort confirmation.
const START_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentResult {
    /// Pushed (and possibly started) at the given remote path.
    Deployed { remote_path: String, started: bool },
    /// No device connected; nothing was pushed.
    NoDevice,
}

/// Yes/no seam for the "start the server now?" question. Non-interactive
/// runs answer no, the less invasive choice.
pub trait StartPrompt {
    fn confirm_start(&self) -> bool;
}

pub struct ConfirmPrompt {
    pub assume_default: bool,
}

impl StartPrompt for ConfirmPrompt {
    fn confirm_start(&self) -> bool {
        if self.assume_default || !console::user_attended() {
            return false;
        }
        dialoguer::Confirm::new()
            .with_prompt("Start frida-server on the device now?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Push the artifact, make it executable, and optionally (re)start it.
///
/// No connected device is not an error: the caller gets `NoDevice` and
/// prints manual instructions.
pub async fn deploy(
    bridge: &dyn DeviceBridge,
    artifact: &ArtifactLocation,
    remote_path: &str,
    prompt: &dyn StartPrompt,
) -> Result<DeploymentResult> {
    let devices = match bridge.list_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("could not enumerate devices: {e}");
            Vec::new()
        }
    };
    if devices.is_empty() {
        return Ok(DeploymentResult::NoDevice);
    }

    tracing::info!(remote = %remote_path, "pushing artifact to device");
    bridge.push(&artifact.path, remote_path).await?;
    bridge.shell(&format!("chmod 755 {remote_path}")).await?;

    let mut started = false;
    if prompt.confirm_start() {
        let process = remote_path.rsplit('/').next().unwrap_or(remote_path);
        // any prior instance holds the port; nonzero exit just means none ran
        let _ = bridge.shell(&format!("killall {process}")).await?;
        bridge
            .shell(&format!("nohup {remote_path} >/dev/null 2>&1 &"))
            .await?;
        tokio::time::sleep(START_GRACE).await;
        started = true;
    }

    Ok(DeploymentResult::Deployed {
        remote_path: remote_path.to_string(),
        started,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::runner::CmdOutput;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBridge {
        devices: Vec<String>,
        pushes: Mutex<Vec<(PathBuf, String)>>,
        shells: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeviceBridge for RecordingBridge {
        async fn list_devices(&self) -> Result<Vec<String>> {
            Ok(self.devices.clone())
        }

        async fn getprop(&self, _key: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn push(&self, local: &Path, remote: &str) -> Result<()> {
            self.pushes
                .lock()
                .unwrap()
                .push((local.to_path_buf(), remote.to_string()));
            Ok(())
        }

        async fn shell(&self, command: &str) -> Result<CmdOutput> {
            self.shells.lock().unwrap().push(command.to_string());
            Ok(CmdOutput {
                status: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    struct FixedStart(bool);

    impl StartPrompt for FixedStart {
        fn confirm_start(&self) -> bool {
            self.0
        }
    }

    fn artifact() -> ArtifactLocation {
        ArtifactLocation {
            path: PathBuf::from("/tmp/frida-server-15.2.2-android-arm64"),
            already_present: false,
        }
    }

    #[tokio::test]
    async fn no_device_performs_no_push() {
        let bridge = RecordingBridge::default();
        let result = deploy(&bridge, &artifact(), DEFAULT_REMOTE_PATH, &FixedStart(true))
            .await
            .unwrap();
        assert_eq!(result, DeploymentResult::NoDevice);
        assert!(bridge.pushes.lock().unwrap().is_empty());
        assert!(bridge.shells.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_and_chmod_without_start() {
        let bridge = RecordingBridge {
            devices: vec!["emulator-5554".to_string()],
            ..Default::default()
        };
        let result = deploy(&bridge, &artifact(), DEFAULT_REMOTE_PATH, &FixedStart(false))
            .await
            .unwrap();
        assert_eq!(
            result,
            DeploymentResult::Deployed {
                remote_path: DEFAULT_REMOTE_PATH.to_string(),
                started: false,
            }
        );
        assert_eq!(bridge.pushes.lock().unwrap().len(), 1);
        let shells = bridge.shells.lock().unwrap();
        assert_eq!(shells.len(), 1);
        assert!(shells[0].starts_with("chmod 755"));
    }

    #[tokio::test]
    async fn confirmed_start_kills_prior_instance_first() {
        let bridge = RecordingBridge {
            devices: vec!["ABC123".to_string()],
            ..Default::default()
        };
        let result = deploy(&bridge, &artifact(), DEFAULT_REMOTE_PATH, &FixedStart(true))
            .await
            .unwrap();
        assert!(matches!(
            result,
            DeploymentResult::Deployed { started: true, .. }
        ));
        let shells = bridge.shells.lock().unwrap();
        assert_eq!(shells.len(), 3);
        assert!(shells[1].starts_with("killall frida-server"));
        assert!(shells[2].contains("nohup /data/local/tmp/frida-server"));
    }
}
