//! Host capability probing.
//!
//! Everything here is side-effect-free: candidates are tested in a fixed
//! priority order and the first one that both exists on PATH and answers a
//! version invocation wins. Absence is never an error; downstream steps get
//! an explicit `Unknown`/`None` to handle.

use crate::runner;

/// Package managers we know how to drive, in probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
    Winget,
    Choco,
    Unknown,
}

impl PackageManager {
    pub fn command(&self) -> Option<&'static str> {
        match self {
            PackageManager::Apt => Some("apt-get"),
            PackageManager::Dnf => Some("dnf"),
            PackageManager::Yum => Some("yum"),
            PackageManager::Pacman => Some("pacman"),
            PackageManager::Zypper => Some("zypper"),
            PackageManager::Apk => Some("apk"),
            PackageManager::Winget => Some("winget"),
            PackageManager::Choco => Some("choco"),
            PackageManager::Unknown => None,
        }
    }
}

/// Archive tools usable for .xz extraction, in probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveTool {
    Xz,
    SevenZip,
}

impl ArchiveTool {
    pub fn command(&self) -> &'static str {
        match self {
            ArchiveTool::Xz => "xz",
            ArchiveTool::SevenZip => "7z",
        }
    }
}

/// What the host offers us. Built once at startup; re-probe explicitly after
/// an install step changes the host.
#[derive(Debug, Clone)]
pub struct HostCapabilities {
    pub package_manager: PackageManager,
    /// Working python interpreter invocation, e.g. "python3".
    pub python: Option<String>,
    /// Working pip invocation, e.g. ["pip3"] or ["python3", "-m", "pip"].
    pub pip: Option<Vec<String>>,
    pub archive_tool: Option<ArchiveTool>,
    /// Path to a working adb, from PATH or the SDK platform-tools dir.
    pub adb: Option<std::path::PathBuf>,
}

/// One unified priority list; probing a manager the OS does not have just
/// fails the PATH check and moves on.
const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager::Apt,
    PackageManager::Dnf,
    PackageManager::Yum,
    PackageManager::Pacman,
    PackageManager::Zypper,
    PackageManager::Apk,
    PackageManager::Winget,
    PackageManager::Choco,
];

const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];
const ARCHIVE_CANDIDATES: &[ArchiveTool] = &[ArchiveTool::Xz, ArchiveTool::SevenZip];

fn on_path(program: &str) -> bool {
    which::which(program).is_ok()
}

async fn answers_version(program: &str) -> bool {
    runner::run(program, &["--version"]).await.success()
}

async fn probe_package_manager() -> PackageManager {
    for candidate in PACKAGE_MANAGERS {
        // apt-get and friends all answer --version cheaply.
        let cmd = candidate.command().unwrap_or_default();
        if on_path(cmd) && answers_version(cmd).await {
            return *candidate;
        }
    }
    PackageManager::Unknown
}

async fn probe_python() -> Option<String> {
    for candidate in PYTHON_CANDIDATES {
        if on_path(candidate) && answers_version(candidate).await {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn probe_pip(python: Option<&str>) -> Option<Vec<String>> {
    for candidate in ["pip3", "pip"] {
        if on_path(candidate) && answers_version(candidate).await {
            return Some(vec![candidate.to_string()]);
        }
    }
    // pip may only be reachable as a module of the probed interpreter
    if let Some(python) = python {
        let out = runner::run(python, &["-m", "pip", "--version"]).await;
        if out.success() {
            return Some(vec![
                python.to_string(),
                "-m".to_string(),
                "pip".to_string(),
            ]);
        }
    }
    None
}

async fn probe_archive_tool() -> Option<ArchiveTool> {
    for candidate in ARCHIVE_CANDIDATES {
        let cmd = candidate.command();
        // 7z exits nonzero on --version but is present if `which` finds it
        if on_path(cmd) && (answers_version(cmd).await || *candidate == ArchiveTool::SevenZip) {
            return Some(*candidate);
        }
    }
    None
}

async fn probe_adb() -> Option<std::path::PathBuf> {
    let path = crate::device::adb_path();
    let program = path.display().to_string();
    if runner::run(&program, &["version"]).await.success() {
        Some(path)
    } else {
        None
    }
}

/// Probe the host for a package manager, python, pip, adb, and an archive
/// tool.
pub async fn probe() -> HostCapabilities {
    let package_manager = probe_package_manager().await;
    let python = probe_python().await;
    let pip = probe_pip(python.as_deref()).await;
    let archive_tool = probe_archive_tool().await;
    let adb = probe_adb().await;

    tracing::debug!(
        ?package_manager,
        python = python.as_deref(),
        pip = ?pip,
        ?archive_tool,
        adb = ?adb,
        "host probe complete"
    );

    HostCapabilities {
        package_manager,
        python,
        pip,
        archive_tool,
        adb,
    }
}
