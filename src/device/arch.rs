//! Device CPU architecture detection.

use std::fmt;

use clap::ValueEnum;

use crate::device::DeviceBridge;
use crate::error::Result;

/// Target architectures frida-server releases exist for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceArchitecture {
    Arm,
    Arm64,
    X86,
    #[value(name = "x86_64")]
    X86_64,
}

impl fmt::Display for DeviceArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceArchitecture::Arm => "arm",
            DeviceArchitecture::Arm64 => "arm64",
            DeviceArchitecture::X86 => "x86",
            DeviceArchitecture::X86_64 => "x86_64",
        };
        f.write_str(s)
    }
}

/// Classify a raw ABI string by prefix. Returns the architecture and whether
/// the ABI was recognized; unknown ABIs map to arm64 so callers can warn.
///
/// Prefix order matters: `x86_64` must be tested before `x86`, and
/// `armeabi-v7a` before bare `armeabi`.
pub fn classify_abi(raw: &str) -> (DeviceArchitecture, bool) {
    let abi = raw.trim();
    if abi.starts_with("arm64-v8a") {
        (DeviceArchitecture::Arm64, true)
    } else if abi.starts_with("armeabi-v7a") || abi.starts_with("armeabi") {
        (DeviceArchitecture::Arm, true)
    } else if abi.starts_with("x86_64") {
        (DeviceArchitecture::X86_64, true)
    } else if abi.starts_with("x86") {
        (DeviceArchitecture::X86, true)
    } else {
        (DeviceArchitecture::Arm64, false)
    }
}

/// Fallback chooser when no device is connected. The interactive
/// implementation shows a numbered menu; non-interactive runs return the
/// arm64 default.
pub trait ArchPrompt {
    fn choose(&self) -> DeviceArchitecture;
}

pub struct MenuPrompt {
    pub assume_default: bool,
}

impl ArchPrompt for MenuPrompt {
    fn choose(&self) -> DeviceArchitecture {
        use DeviceArchitecture::*;
        const CHOICES: [DeviceArchitecture; 4] = [Arm64, Arm, X86_64, X86];

        if self.assume_default || !console::user_attended() {
            return Arm64;
        }

        let items: Vec<String> = CHOICES.iter().map(|a| a.to_string()).collect();
        let picked = dialoguer::Select::new()
            .with_prompt("No device connected. Select a target architecture")
            .items(&items)
            .default(0)
            .interact_opt();

        match picked {
            Ok(Some(idx)) => CHOICES[idx],
            // empty/aborted input falls back to the default
            _ => Arm64,
        }
    }
}

/// Resolve the target architecture.
///
/// An explicit override wins verbatim, without consulting the device. With
/// no override: no connected device falls back to the prompt; otherwise the
/// first device's ABI is classified.
pub async fn resolve(
    explicit: Option<DeviceArchitecture>,
    bridge: &dyn DeviceBridge,
    prompt: &dyn ArchPrompt,
) -> Result<DeviceArchitecture> {
    if let Some(arch) = explicit {
        tracing::info!(%arch, "using explicit architecture override");
        return Ok(arch);
    }

    let devices = match bridge.list_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("could not enumerate devices: {e}");
            Vec::new()
        }
    };

    if devices.is_empty() {
        return Ok(prompt.choose());
    }

    let abi = bridge.getprop("ro.product.cpu.abi").await?;
    let (arch, recognized) = classify_abi(&abi);
    if recognized {
        tracing::info!(abi = %abi.trim(), %arch, "detected device architecture");
    } else {
        tracing::warn!(abi = %abi.trim(), "unrecognized device ABI, defaulting to arm64");
    }
    Ok(arch)
}
