//! The external automation client port and its process-backed implementation.
//!
//! One call to [`AutomationClient::run_pass`] performs one automation pass
//! against the external platform and settles as success or failure.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;

/// Performs one automation pass.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    async fn run_pass(&self) -> Result<()>;
}

/// Runs the automation as a child process.
///
/// A pass succeeds when the process exits with status 0. When a timeout is
/// configured the child is killed once it elapses; without one the pass may
/// run indefinitely.
#[derive(Debug, Clone)]
pub struct CommandAutomationClient {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandAutomationClient {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run_process(&self) -> Result<Output> {
        let program = self.program.as_str();
        let mut child = tokio::process::Command::new(program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let settle = async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stdout_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stderr_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
            );
            Ok::<_, anyhow::Error>(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout,
                stderr,
            })
        };

        let Some(timeout) = self.timeout else {
            return settle.await;
        };

        tokio::select! {
            result = settle => result,
            () = tokio::time::sleep(timeout) => {
                bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}

#[async_trait]
impl AutomationClient for CommandAutomationClient {
    async fn run_pass(&self) -> Result<()> {
        let output = self.run_process().await?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(program = %self.program, "{line}");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => bail!("{} exited with {}: {}", self.program, output.status, last.trim()),
            None => bail!("{} exited with {}", self.program, output.status),
        }
    }
}
