//! Per-OS conventions behind one trait.
//!
//! The provisioning flow is identical on every OS; what differs is how to
//! drive the package manager, where user binaries live, which shell startup
//! files exist, and how to acquire an .xz extractor when none is present.
//! Keeping those behind `Platform` keeps the orchestrator free of `cfg`
//! branches.

use std::path::PathBuf;

use crate::probe::PackageManager;

/// How to get an .xz extractor onto a host that has none.
#[derive(Debug, Clone)]
pub enum ExtractorAcquisition {
    /// Install a package through the detected package manager.
    PackageManager { package: String },
    /// Fetch a portable binary from a pinned URL into the user bin dir.
    PortableDownload { url: String, file_name: String },
}

pub trait Platform: Send + Sync {
    /// Directory for user-scoped binaries and symlinked entry points.
    fn user_bin_dir(&self) -> PathBuf;

    /// Shell startup files to consider for PATH edits, in preference order.
    fn shell_rc_candidates(&self) -> Vec<PathBuf>;

    /// Argv installing `package` through `manager`, or `None` when the
    /// manager is unknown.
    fn package_install_argv(&self, manager: PackageManager, package: &str) -> Option<Vec<String>>;

    /// Route for acquiring an .xz extractor when probing found none.
    fn extractor_acquisition(&self) -> ExtractorAcquisition;

    /// Interpreter path inside a virtual environment at `venv_dir`.
    fn venv_python(&self, venv_dir: &std::path::Path) -> PathBuf;

    /// Name of the python package the OS package manager knows.
    fn python_package(&self) -> &'static str;
}

fn home_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~").to_string())
}

pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn user_bin_dir(&self) -> PathBuf {
        home_dir().join(".local").join("bin")
    }

    fn shell_rc_candidates(&self) -> Vec<PathBuf> {
        let home = home_dir();
        vec![
            home.join(".zshrc"),
            home.join(".bashrc"),
            home.join(".profile"),
        ]
    }

    fn package_install_argv(&self, manager: PackageManager, package: &str) -> Option<Vec<String>> {
        let argv: Vec<&str> = match manager {
            PackageManager::Apt => vec!["sudo", "apt-get", "install", "-y", package],
            PackageManager::Dnf => vec!["sudo", "dnf", "install", "-y", package],
            PackageManager::Yum => vec!["sudo", "yum", "install", "-y", package],
            PackageManager::Pacman => vec!["sudo", "pacman", "-S", "--noconfirm", package],
            PackageManager::Zypper => vec!["sudo", "zypper", "install", "-y", package],
            PackageManager::Apk => vec!["sudo", "apk", "add", package],
            _ => return None,
        };
        Some(argv.into_iter().map(String::from).collect())
    }

    fn extractor_acquisition(&self) -> ExtractorAcquisition {
        ExtractorAcquisition::PackageManager {
            package: "xz-utils".to_string(),
        }
    }

    fn venv_python(&self, venv_dir: &std::path::Path) -> PathBuf {
        venv_dir.join("bin").join("python")
    }

    fn python_package(&self) -> &'static str {
        "python3"
    }
}

pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn user_bin_dir(&self) -> PathBuf {
        home_dir().join("bin")
    }

    fn shell_rc_candidates(&self) -> Vec<PathBuf> {
        // PATH edits on windows go through the environment, not rc files
        Vec::new()
    }

    fn package_install_argv(&self, manager: PackageManager, package: &str) -> Option<Vec<String>> {
        let argv: Vec<&str> = match manager {
            PackageManager::Winget => vec![
                "winget",
                "install",
                "--accept-package-agreements",
                "--accept-source-agreements",
                package,
            ],
            PackageManager::Choco => vec!["choco", "install", "-y", package],
            _ => return None,
        };
        Some(argv.into_iter().map(String::from).collect())
    }

    fn extractor_acquisition(&self) -> ExtractorAcquisition {
        // standalone console 7-Zip, pinned so re-runs are reproducible
        ExtractorAcquisition::PortableDownload {
            url: "https://www.7-zip.org/a/7zr.exe".to_string(),
            file_name: "7zr.exe".to_string(),
        }
    }

    fn venv_python(&self, venv_dir: &std::path::Path) -> PathBuf {
        venv_dir.join("Scripts").join("python.exe")
    }

    fn python_package(&self) -> &'static str {
        "Python.Python.3.12"
    }
}

/// The platform this binary was built for.
pub fn current() -> Box<dyn Platform> {
    if cfg!(windows) {
        Box::new(WindowsPlatform)
    } else {
        Box::new(UnixPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_knows_every_unix_manager() {
        let p = UnixPlatform;
        for manager in [
            PackageManager::Apt,
            PackageManager::Dnf,
            PackageManager::Yum,
            PackageManager::Pacman,
            PackageManager::Zypper,
            PackageManager::Apk,
        ] {
            assert!(p.package_install_argv(manager, "xz-utils").is_some());
        }
        assert!(p
            .package_install_argv(PackageManager::Unknown, "xz-utils")
            .is_none());
    }

    #[test]
    fn windows_rejects_unix_managers() {
        let p = WindowsPlatform;
        assert!(p.package_install_argv(PackageManager::Apt, "xz").is_none());
        assert!(p
            .package_install_argv(PackageManager::Winget, "7zip")
            .is_some());
    }

    #[test]
    fn venv_layouts_differ() {
        let dir = std::path::Path::new("/tmp/venv");
        assert!(UnixPlatform.venv_python(dir).ends_with("bin/python"));
        assert!(WindowsPlatform
            .venv_python(dir)
            .ends_with("Scripts/python.exe"));
    }
}
