//! Ordered install-strategy fallback chain.
//!
//! Strategies run strictly in order, least invasive first. A strategy
//! succeeds only when every one of its steps exits zero; the first success
//! terminates the chain. Earlier failures are expected, so they are logged
//! at warn level and suppressed. Exhaustion is fatal for the caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, SetupError};
use crate::platform::Platform;
use crate::probe::HostCapabilities;
use crate::runner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyScope {
    UserScope,
    SystemScope,
    IsolatedEnvironment,
}

/// One install attempt: a labelled sequence of commands that must all
/// succeed, plus an optional directory to wipe first so retries after a
/// partial failure start clean.
#[derive(Debug, Clone)]
pub struct InstallStrategy {
    pub label: String,
    pub scope: StrategyScope,
    pub steps: Vec<Vec<String>>,
    pub fresh_dir: Option<PathBuf>,
}

/// Seam for executing a strategy step. The real implementation shells out;
/// tests substitute scripted outcomes.
#[async_trait]
pub trait CommandExec: Send + Sync {
    async fn exec(&self, argv: &[String]) -> bool;
}

pub struct ProcessExec;

#[async_trait]
impl CommandExec for ProcessExec {
    async fn exec(&self, argv: &[String]) -> bool {
        let out = runner::run_argv(argv).await;
        if !out.success() {
            tracing::debug!(?argv, stderr = %out.stderr.trim(), "step failed");
        }
        out.success()
    }
}

/// Run the chain. Returns the index of the winning strategy.
pub async fn run_chain(
    packages: &[String],
    strategies: &[InstallStrategy],
    exec: &dyn CommandExec,
) -> Result<usize> {
    for (idx, strategy) in strategies.iter().enumerate() {
        tracing::info!(strategy = %strategy.label, "attempting install");

        if let Some(dir) = &strategy.fresh_dir {
            // partial state from an earlier run must not poison this attempt
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }

        let mut ok = true;
        for step in &strategy.steps {
            if !exec.exec(step).await {
                ok = false;
                break;
            }
        }

        if ok {
            return Ok(idx);
        }

        // a failed isolated environment must not look half-usable later
        if let Some(dir) = &strategy.fresh_dir {
            if dir.exists() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
        tracing::warn!(strategy = %strategy.label, "install strategy failed, falling back");
    }

    Err(SetupError::AllStrategiesFailed {
        packages: packages.join(" "),
    })
}

/// The canonical pip chain: user scope, elevated, user scope with the
/// externally-managed override, then a fresh venv with entry points exposed
/// into the user bin dir.
pub fn pip_strategies(
    caps: &HostCapabilities,
    platform: &dyn Platform,
    packages: &[String],
    venv_dir: &Path,
    entry_points: &[&str],
) -> Vec<InstallStrategy> {
    let pip: Vec<String> = caps
        .pip
        .clone()
        .unwrap_or_else(|| vec!["pip".to_string()]);
    let python = caps.python.clone().unwrap_or_else(|| "python3".to_string());

    let with_pip = |extra: &[&str]| -> Vec<String> {
        let mut argv = pip.clone();
        argv.push("install".to_string());
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.extend(packages.iter().cloned());
        argv
    };

    let mut strategies = vec![
        InstallStrategy {
            label: "pip install --user".to_string(),
            scope: StrategyScope::UserScope,
            steps: vec![with_pip(&["--user"])],
            fresh_dir: None,
        },
        InstallStrategy {
            label: "elevated pip install".to_string(),
            scope: StrategyScope::SystemScope,
            steps: vec![{
                let mut argv = if cfg!(unix) {
                    vec!["sudo".to_string()]
                } else {
                    Vec::new()
                };
                argv.extend(with_pip(&[]));
                argv
            }],
            fresh_dir: None,
        },
        InstallStrategy {
            label: "pip install --user --break-system-packages".to_string(),
            scope: StrategyScope::UserScope,
            steps: vec![with_pip(&["--user", "--break-system-packages"])],
            fresh_dir: None,
        },
    ];

    // last resort: isolated venv, then expose its entry points
    let venv_python = platform.venv_python(venv_dir);
    let mut steps = vec![
        vec![
            python,
            "-m".to_string(),
            "venv".to_string(),
            venv_dir.display().to_string(),
        ],
        {
            let mut argv = vec![
                venv_python.display().to_string(),
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
            ];
            argv.extend(packages.iter().cloned());
            argv
        },
    ];
    let bin_dir = platform.user_bin_dir();
    let venv_bin = venv_python.parent().map(Path::to_path_buf).unwrap_or_default();
    for entry in entry_points {
        steps.push(link_entry_point_argv(
            &venv_bin.join(entry),
            &bin_dir.join(entry),
        ));
    }
    strategies.push(InstallStrategy {
        label: "isolated venv install".to_string(),
        scope: StrategyScope::IsolatedEnvironment,
        steps,
        fresh_dir: Some(venv_dir.to_path_buf()),
    });

    strategies
}

fn link_entry_point_argv(src: &Path, dst: &Path) -> Vec<String> {
    if cfg!(unix) {
        vec![
            "ln".to_string(),
            "-sf".to_string(),
            src.display().to_string(),
            dst.display().to_string(),
        ]
    } else {
        vec![
            "cmd".to_string(),
            "/C".to_string(),
            "copy".to_string(),
            "/Y".to_string(),
            src.display().to_string(),
            dst.display().to_string(),
        ]
    }
}
