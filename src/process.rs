//! Bounded execution of external tools.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, Stage, SubburnError};

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// A spawn failure or timeout is reported as a transient error for `stage`; a
/// non-zero exit is reported as a fatal one carrying the tail of stderr.
pub async fn run_with_timeout(
    mut cmd: Command,
    stage: Stage,
    description: &str,
    timeout: Duration,
) -> Result<Output> {
    debug!("Executing {}: {:?}", description, cmd.as_std());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| SubburnError::spawn_failure(stage, format!("Failed to launch {}: {}", description, e)))?;

    let started = Instant::now();
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|e| SubburnError::spawn_failure(stage, format!("Failed to wait for {}: {}", description, e)))?,
        Err(_) => {
            // Dropping the future drops the child, which kills it.
            warn!("{} exceeded {}s and was killed", description, timeout.as_secs());
            return Err(SubburnError::Timeout { stage, secs: timeout.as_secs() });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SubburnError::process_failure(
            stage,
            format!("{} exited with {}: {}", description, output.status, stderr_tail(&stderr)),
        ));
    }

    info!("{} finished in {:.1}s", description, started.elapsed().as_secs_f64());
    Ok(output)
}

/// Last few lines of stderr; ffmpeg prints its banner first and the error last.
fn stderr_tail(stderr: &str) -> String {
    const MAX_LINES: usize = 12;
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_success_returns_output() {
        let output = run_with_timeout(shell("echo ok"), Stage::Burn, "echo", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_fatal_stage_error() {
        let err = run_with_timeout(
            shell("echo 'Invalid data found' >&2; exit 1"),
            Stage::AudioExtraction,
            "ffmpeg",
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SubburnError::AudioExtraction { .. }));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let err = run_with_timeout(shell("sleep 10"), Stage::Transcription, "sleep", Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, SubburnError::Timeout { stage: Stage::Transcription, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transient() {
        let cmd = Command::new("/nonexistent/subburn-test-binary");
        let err = run_with_timeout(cmd, Stage::Burn, "missing", Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, SubburnError::Burn { transient: true, .. }));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 18"));
        assert!(tail.ends_with("line 29"));
    }
}
