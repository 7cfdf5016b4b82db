use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All install strategies failed for: {packages}")]
    AllStrategiesFailed { packages: String },

    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Extraction failed: {0}")]
    Extract(String),

    #[error("No extraction tool available: {0}")]
    NoExtractor(String),

    #[error("Device bridge error: {0}")]
    Bridge(String),

    #[error("HTTP request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SetupError {
    /// Manual command the user can run to recover from a fatal step.
    pub fn remediation(&self) -> Option<String> {
        match self {
            SetupError::AllStrategiesFailed { packages } => Some(format!(
                "try installing manually: pip install --user {packages}"
            )),
            SetupError::Download { url, .. } => {
                Some(format!("download it yourself from {url} and re-run"))
            }
            SetupError::NoExtractor(_) => {
                Some("install xz (e.g. via your package manager) and re-run".to_string())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
