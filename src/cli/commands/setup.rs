//! The end-to-end provisioning run.
//!
//! Strictly sequential: probe the host, make sure python and the frida pip
//! packages are installed, resolve the device architecture, fetch the
//! matching frida-server release, push it to the device. Fatal failures stop
//! the run; everything else warns and proceeds.

use console::style;

use crate::artifact::Fetcher;
use crate::config::{AppConfig, TargetSpec};
use crate::deploy::{self, ConfirmPrompt, DeploymentResult};
use crate::device::arch::{self, MenuPrompt};
use crate::device::AdbBridge;
use crate::error::Result;
use crate::install::{self, ProcessExec, StrategyScope};
use crate::platform;
use crate::probe;
use crate::runner;
use crate::shellrc;

/// Console scripts the frida-tools package provides; the venv fallback
/// strategy links these into the user bin dir.
const ENTRY_POINTS: &[&str] = &["frida", "frida-ps", "frida-trace", "frida-kill", "frida-ls-devices"];

pub async fn execute(spec: TargetSpec, assume_defaults: bool) -> Result<()> {
    println!("{}", style("frida-setup").bold().cyan());
    println!(
        "frida-server {} / frida-tools {}\n",
        spec.frida_version, spec.tools_version
    );

    let platform = platform::current();

    step(1, "Probing host");
    let mut caps = probe::probe().await;
    if caps.adb.is_none() {
        tracing::warn!("adb not found; device detection and deployment will fall back");
    }

    step(2, "Installing Python");
    if caps.python.is_some() {
        println!("  already installed");
    } else {
        match platform.package_install_argv(caps.package_manager, platform.python_package()) {
            Some(argv) => {
                let out = runner::run_argv(&argv).await;
                if out.success() {
                    caps = probe::probe().await;
                } else {
                    tracing::warn!(
                        "python install failed, relying on pip fallbacks: {}",
                        out.stderr.trim()
                    );
                }
            }
            None => {
                tracing::warn!("no package manager detected; install python manually if needed");
            }
        }
    }

    step(3, "Installing Frida packages");
    let packages = vec![
        format!("frida=={}", spec.frida_version),
        format!("frida-tools=={}", spec.tools_version),
    ];
    let venv_dir = AppConfig::config_dir().join("venv");
    // the venv fallback links entry points here, so it must exist up front
    std::fs::create_dir_all(platform.user_bin_dir())?;
    let strategies = install::pip_strategies(
        &caps,
        platform.as_ref(),
        &packages,
        &venv_dir,
        ENTRY_POINTS,
    );
    let won = install::run_chain(&packages, &strategies, &ProcessExec).await?;
    println!("  installed via {}", strategies[won].label);
    if strategies[won].scope == StrategyScope::IsolatedEnvironment {
        // entry points were linked into the user bin dir; make sure new
        // shells can find them
        shellrc::ensure_path_entry(&platform.shell_rc_candidates(), &platform.user_bin_dir())?;
    }

    step(4, "Resolving device architecture");
    let bridge = AdbBridge::new();
    let menu = MenuPrompt {
        assume_default: assume_defaults,
    };
    let target_arch = arch::resolve(spec.arch, &bridge, &menu).await?;
    println!("  target: {target_arch}");

    step(5, "Fetching frida-server");
    let dest_dir = std::env::current_dir()?;
    let fetcher = Fetcher::new(reqwest::Client::new(), spec.base_url.clone());
    let location = fetcher
        .fetch_auto(
            &spec.frida_version,
            target_arch,
            &dest_dir,
            &caps,
            platform.as_ref(),
        )
        .await?;
    if location.already_present {
        println!("  using cached {}", location.path.display());
    } else {
        println!("  saved to {}", location.path.display());
    }

    step(6, "Deploying to device");
    let confirm = ConfirmPrompt {
        assume_default: assume_defaults,
    };
    let result = deploy::deploy(&bridge, &location, &spec.remote_path, &confirm).await?;

    println!();
    match result {
        DeploymentResult::Deployed {
            remote_path,
            started,
        } => {
            println!("{}", style("✓ Setup complete").green().bold());
            println!("  frida-server at {remote_path}");
            if started {
                println!("  server is running; try: frida-ps -U");
            } else {
                println!("  start it with: adb shell \"{remote_path} &\"");
            }
        }
        DeploymentResult::NoDevice => {
            println!("{}", style("✓ Host setup complete").green().bold());
            println!(
                "{}",
                style("! No device connected, frida-server was not deployed").yellow()
            );
            println!("  when a device is attached, run:");
            println!("    adb push {} {}", location.path.display(), spec.remote_path);
            println!("    adb shell chmod 755 {}", spec.remote_path);
            println!("    adb shell \"{} &\"", spec.remote_path);
        }
    }

    Ok(())
}

fn step(n: usize, label: &str) {
    println!("{} {label}", style(format!("[{n}/6]")).bold().dim());
}
