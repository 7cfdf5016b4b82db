//! Fetching and extracting the architecture-matched frida-server release.
//!
//! The decompressed file's presence at the canonical destination is the
//! "already done" signal for future runs, so a failed extraction must never
//! leave anything there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use crate::device::arch::DeviceArchitecture;
use crate::error::{Result, SetupError};
use crate::platform::{ExtractorAcquisition, Platform};
use crate::probe::{ArchiveTool, HostCapabilities};
use crate::runner;

pub const ARTIFACT_NAME: &str = "frida-server";
pub const DEFAULT_BASE_URL: &str = "https://github.com/frida/frida/releases/download";

/// Where the artifact ended up, and whether an earlier run already put it
/// there.
#[derive(Debug, Clone)]
pub struct ArtifactLocation {
    pub path: PathBuf,
    pub already_present: bool,
}

pub fn artifact_file_name(version: &str, arch: DeviceArchitecture) -> String {
    format!("{ARTIFACT_NAME}-{version}-android-{arch}")
}

pub fn download_url(base_url: &str, version: &str, arch: DeviceArchitecture) -> String {
    let file = artifact_file_name(version, arch);
    format!("{base_url}/{version}/{file}.xz")
}

/// Decompression seam. The real implementation shells out to the probed
/// archive tool; tests substitute their own.
#[async_trait]
pub trait Extract: Send + Sync {
    /// Decompress `compressed` (a `.xz` file) so that the same path without
    /// the suffix exists afterwards.
    async fn extract(&self, compressed: &Path) -> Result<()>;
}

pub struct ToolExtract {
    command: String,
    tool: ArchiveTool,
}

impl ToolExtract {
    pub fn new(tool: ArchiveTool) -> Self {
        Self {
            command: tool.command().to_string(),
            tool,
        }
    }

    /// An extractor acquired as a portable binary outside PATH.
    pub fn portable(path: &Path) -> Self {
        Self {
            command: path.display().to_string(),
            tool: ArchiveTool::SevenZip,
        }
    }
}

#[async_trait]
impl Extract for ToolExtract {
    async fn extract(&self, compressed: &Path) -> Result<()> {
        let file = compressed.display().to_string();
        let out = match self.tool {
            ArchiveTool::Xz => runner::run(&self.command, &["-d", "-f", &file]).await,
            ArchiveTool::SevenZip => {
                let out_dir = compressed
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .display()
                    .to_string();
                let out_flag = format!("-o{out_dir}");
                runner::run(&self.command, &["e", &file, &out_flag, "-y"]).await
            }
        };
        if !out.success() {
            return Err(SetupError::Extract(format!(
                "{} failed on {file}: {}",
                self.command,
                out.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Make sure an .xz extractor exists, acquiring one through the platform's
/// route when probing found none. Failure here is fatal for the run.
pub async fn ensure_extractor(
    caps: &HostCapabilities,
    platform: &dyn Platform,
    client: &reqwest::Client,
) -> Result<ToolExtract> {
    if let Some(tool) = caps.archive_tool {
        return Ok(ToolExtract::new(tool));
    }

    match platform.extractor_acquisition() {
        ExtractorAcquisition::PackageManager { package } => {
            let argv = platform
                .package_install_argv(caps.package_manager, &package)
                .ok_or_else(|| {
                    SetupError::NoExtractor(
                        "no package manager detected to install one with".to_string(),
                    )
                })?;
            tracing::info!(%package, "installing extraction tool");
            let out = runner::run_argv(&argv).await;
            if !out.success() {
                return Err(SetupError::NoExtractor(format!(
                    "installing {package} failed: {}",
                    out.stderr.trim()
                )));
            }
            // the install changed the host, so re-probe
            let caps = crate::probe::probe().await;
            caps.archive_tool.map(ToolExtract::new).ok_or_else(|| {
                SetupError::NoExtractor(format!("{package} installed but no extractor found"))
            })
        }
        ExtractorAcquisition::PortableDownload { url, file_name } => {
            let bin_dir = platform.user_bin_dir();
            std::fs::create_dir_all(&bin_dir)?;
            let dest = bin_dir.join(file_name);
            if !dest.exists() {
                tracing::info!(%url, "fetching portable extraction tool");
                download_to(client, &url, &dest).await?;
            }
            Ok(ToolExtract::portable(&dest))
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Like [`Fetcher::fetch`], but acquires an extractor through the
    /// platform's route first. The acquisition is skipped entirely when the
    /// artifact is already present.
    pub async fn fetch_auto(
        &self,
        version: &str,
        arch: DeviceArchitecture,
        dest_dir: &Path,
        caps: &HostCapabilities,
        platform: &dyn Platform,
    ) -> Result<ArtifactLocation> {
        let dest = dest_dir.join(artifact_file_name(version, arch));
        if dest.exists() {
            tracing::info!(path = %dest.display(), "artifact already present, skipping download");
            return Ok(ArtifactLocation {
                path: dest,
                already_present: true,
            });
        }
        let extractor = ensure_extractor(caps, platform, &self.client).await?;
        self.fetch(version, arch, dest_dir, &extractor).await
    }

    /// Download and decompress the artifact for `version`/`arch` into
    /// `dest_dir`. A file already at the canonical destination short-circuits
    /// the whole operation.
    pub async fn fetch(
        &self,
        version: &str,
        arch: DeviceArchitecture,
        dest_dir: &Path,
        extractor: &dyn Extract,
    ) -> Result<ArtifactLocation> {
        let dest = dest_dir.join(artifact_file_name(version, arch));
        if dest.exists() {
            tracing::info!(path = %dest.display(), "artifact already present, skipping download");
            return Ok(ArtifactLocation {
                path: dest,
                already_present: true,
            });
        }

        let url = download_url(&self.base_url, version, arch);
        let compressed = dest_dir.join(format!("{}.xz", artifact_file_name(version, arch)));
        let part = dest_dir.join(format!("{}.xz.part", artifact_file_name(version, arch)));

        let result = self
            .fetch_inner(&url, &dest, &compressed, &part, extractor)
            .await;
        if result.is_err() {
            // dest's presence means "done" to future runs, so never leave a
            // partial file behind
            let _ = std::fs::remove_file(&dest);
            let _ = std::fs::remove_file(&compressed);
            let _ = std::fs::remove_file(&part);
        }
        result?;

        Ok(ArtifactLocation {
            path: dest,
            already_present: false,
        })
    }

    async fn fetch_inner(
        &self,
        url: &str,
        dest: &Path,
        compressed: &Path,
        part: &Path,
        extractor: &dyn Extract,
    ) -> Result<()> {
        tracing::info!(%url, "downloading artifact");
        download_to(&self.client, url, part).await?;
        std::fs::rename(part, compressed)?;

        extractor.extract(compressed).await?;
        if !dest.exists() {
            return Err(SetupError::Extract(format!(
                "extraction produced no file at {}",
                dest.display()
            )));
        }
        // xz removes the input itself; 7z leaves it behind
        if compressed.exists() {
            std::fs::remove_file(compressed)?;
        }
        Ok(())
    }
}

/// Stream a URL to a local file, with a progress bar when attended.
async fn download_to(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SetupError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(SetupError::Download {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bar = if console::user_attended() {
        let bar = match response.content_length() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {bytes}/{total_bytes} {bytes_per_sec}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SetupError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        file.write_all(&chunk).await?;
        if let Some(bar) = &bar {
            bar.inc(chunk.len() as u64);
        }
    }
    file.flush().await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoopExtract;

    #[async_trait]
    impl Extract for NoopExtract {
        async fn extract(&self, _compressed: &Path) -> Result<()> {
            Ok(())
        }
    }

    /// Simulates xz: writes the decompressed file and removes the input.
    struct FakeExtract;

    #[async_trait]
    impl Extract for FakeExtract {
        async fn extract(&self, compressed: &Path) -> Result<()> {
            let dest = compressed.with_extension("");
            std::fs::write(dest, b"decompressed")?;
            std::fs::remove_file(compressed)?;
            Ok(())
        }
    }

    /// Leaves junk at the destination, then fails.
    struct BrokenExtract;

    #[async_trait]
    impl Extract for BrokenExtract {
        async fn extract(&self, compressed: &Path) -> Result<()> {
            std::fs::write(compressed.with_extension(""), b"partial")?;
            Err(SetupError::Extract("corrupt stream".to_string()))
        }
    }

    #[test]
    fn file_name_and_url_are_deterministic() {
        assert_eq!(
            artifact_file_name("15.2.2", DeviceArchitecture::Arm64),
            "frida-server-15.2.2-android-arm64"
        );
        assert_eq!(
            download_url(DEFAULT_BASE_URL, "15.2.2", DeviceArchitecture::X86_64),
            "https://github.com/frida/frida/releases/download/15.2.2/frida-server-15.2.2-android-x86_64.xz"
        );
    }

    #[tokio::test]
    async fn existing_destination_skips_download_entirely() {
        let server = MockServer::start().await;
        // expect(0) makes the server verify on drop that nothing was fetched
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("frida-server-15.2.2-android-arm64");
        std::fs::write(&dest, b"cached").unwrap();

        let fetcher = Fetcher::new(reqwest::Client::new(), server.uri());
        let location = fetcher
            .fetch("15.2.2", DeviceArchitecture::Arm64, dir.path(), &NoopExtract)
            .await
            .unwrap();

        assert!(location.already_present);
        assert_eq!(location.path, dest);
    }

    #[tokio::test]
    async fn cached_artifact_skips_extractor_acquisition() {
        use crate::platform::UnixPlatform;
        use crate::probe::PackageManager;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("frida-server-15.2.2-android-arm64");
        std::fs::write(&dest, b"cached").unwrap();

        // no extractor and no package manager to get one with: acquisition
        // would fail, so reaching it at all would error out
        let caps = HostCapabilities {
            package_manager: PackageManager::Unknown,
            python: None,
            pip: None,
            archive_tool: None,
            adb: None,
        };
        let fetcher = Fetcher::new(reqwest::Client::new(), "http://unused.invalid");
        let location = fetcher
            .fetch_auto(
                "15.2.2",
                DeviceArchitecture::Arm64,
                dir.path(),
                &caps,
                &UnixPlatform,
            )
            .await
            .unwrap();
        assert!(location.already_present);
    }

    #[tokio::test]
    async fn unacquirable_extractor_is_fatal_before_any_download() {
        use crate::platform::UnixPlatform;
        use crate::probe::PackageManager;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let caps = HostCapabilities {
            package_manager: PackageManager::Unknown,
            python: None,
            pip: None,
            archive_tool: None,
            adb: None,
        };
        let fetcher = Fetcher::new(reqwest::Client::new(), server.uri());
        let err = fetcher
            .fetch_auto(
                "15.2.2",
                DeviceArchitecture::Arm64,
                dir.path(),
                &caps,
                &UnixPlatform,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::NoExtractor(_)));
        assert!(err.remediation().is_some());
        assert!(!dir
            .path()
            .join("frida-server-15.2.2-android-arm64")
            .exists());
    }

    #[tokio::test]
    async fn successful_fetch_extracts_and_cleans_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/15.2.2/frida-server-15.2.2-android-arm.xz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xz-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(reqwest::Client::new(), server.uri());
        let location = fetcher
            .fetch("15.2.2", DeviceArchitecture::Arm, dir.path(), &FakeExtract)
            .await
            .unwrap();

        assert!(!location.already_present);
        assert!(location.path.exists());
        assert!(!dir
            .path()
            .join("frida-server-15.2.2-android-arm.xz")
            .exists());
        assert!(!dir
            .path()
            .join("frida-server-15.2.2-android-arm.xz.part")
            .exists());
    }

    #[tokio::test]
    async fn http_error_is_fatal_and_leaves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(reqwest::Client::new(), server.uri());
        let err = fetcher
            .fetch("15.2.2", DeviceArchitecture::Arm64, dir.path(), &NoopExtract)
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::Download { .. }));
        assert!(err.remediation().is_some());
        assert!(!dir
            .path()
            .join("frida-server-15.2.2-android-arm64")
            .exists());
    }

    #[tokio::test]
    async fn failed_extraction_removes_canonical_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xz-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(reqwest::Client::new(), server.uri());
        let err = fetcher
            .fetch("15.2.2", DeviceArchitecture::Arm64, dir.path(), &BrokenExtract)
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::Extract(_)));
        // the presence of this file would wrongly signal "done" to a re-run
        assert!(!dir
            .path()
            .join("frida-server-15.2.2-android-arm64")
            .exists());
    }
}
