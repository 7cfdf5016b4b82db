pub mod commands;

use clap::Parser;

use crate::config::{AppConfig, TargetSpec};
use crate::device::arch::DeviceArchitecture;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "frida-setup")]
#[command(version)]
#[command(about = "Install the Frida tooling and deploy frida-server to an Android device")]
#[command(
    long_about = "Installs Python and the Frida pip packages on this machine, detects the \
CPU architecture of the connected Android device, downloads the matching \
frida-server release, and pushes it to the device over adb."
)]
pub struct Cli {
    /// frida-server release to deploy [default: 15.2.2]
    #[arg(long, value_name = "VERSION")]
    pub frida_version: Option<String>,

    /// frida-tools release to install on this machine [default: 10.4.1]
    #[arg(long, value_name = "VERSION")]
    pub tools_version: Option<String>,

    /// Target architecture (skips device detection)
    #[arg(long, value_enum)]
    pub arch: Option<DeviceArchitecture>,

    /// Answer every prompt with its default (non-interactive)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = AppConfig::load()?;
        let spec = TargetSpec::new(config, self.frida_version, self.tools_version, self.arch);
        commands::setup::execute(spec, self.yes).await
    }
}
