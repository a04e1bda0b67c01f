//! Shared subprocess helper for the capture and effector backends.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Timeout for capture/input sub-commands.
const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Run a command with timeout, returning stdout on success.
pub(crate) async fn run_cmd(program: &str, args: &[&str]) -> Result<String> {
    let result = tokio::time::timeout(
        CMD_TIMEOUT,
        tokio::process::Command::new(program).args(args).output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(anyhow!("{program} failed: {}", stderr.trim()))
            }
        }
        Ok(Err(e)) => Err(anyhow!("failed to execute {program}: {e}")),
        Err(_) => Err(anyhow!(
            "{program} timed out after {}s",
            CMD_TIMEOUT.as_secs()
        )),
    }
}

/// Check that a program exists on PATH.
pub(crate) async fn have_program(program: &str) -> bool {
    run_cmd("which", &[program]).await.is_ok()
}
