//! Total wrapper around external process execution.
//!
//! The prober and the install strategy chain treat "binary missing" and
//! "nonzero exit" as ordinary data, so `run` never returns an `Err`: spawn
//! failures surface as a `CmdOutput` with `status: None` and the error text
//! in `stderr`.

use std::process::Stdio;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Exit code, or `None` when the process could not be spawned
    /// (binary not found) or was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn spawn_failure(err: std::io::Error) -> Self {
        Self {
            status: None,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }
}

/// Run a program with arguments, capturing stdout/stderr.
pub async fn run(program: &str, args: &[&str]) -> CmdOutput {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => CmdOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        },
        Err(e) => CmdOutput::spawn_failure(e),
    }
}

/// Run an argv where the program is the first element.
pub async fn run_argv(argv: &[String]) -> CmdOutput {
    let Some((program, args)) = argv.split_first() else {
        return CmdOutput {
            status: None,
            stdout: String::new(),
            stderr: "empty command".to_string(),
        };
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run(program, &args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let out = run("echo", &["hello"]).await;
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let out = run("sh", &["-c", "exit 3"]).await;
        assert!(!out.success());
        assert_eq!(out.status, Some(3));
    }

    #[tokio::test]
    async fn missing_binary_yields_status_none() {
        let out = run("definitely-not-a-real-binary-xyz", &[]).await;
        assert!(!out.success());
        assert_eq!(out.status, None);
        assert!(!out.stderr.is_empty());
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let out = run_argv(&[]).await;
        assert!(!out.success());
        assert_eq!(out.stderr, "empty command");
    }
}
