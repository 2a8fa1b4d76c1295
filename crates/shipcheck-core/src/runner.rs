//! Stage execution: spawn one external command, observe its exit status.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::StageError;
use crate::stage::Stage;

/// Terminal status of one attempted stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Command ran and exited zero.
    Passed,

    /// Command ran and exited non-zero (execution failure). The code is
    /// -1 when the process was killed by a signal and left no status.
    Failed { exit_code: i32 },

    /// Command could not be located or started (launch failure).
    LaunchFailed { message: String },

    /// Command was killed after exceeding its time limit.
    TimedOut { limit_secs: u64 },

    /// The runner was interrupted while the command was running.
    Interrupted,
}

impl StageStatus {
    /// Whether the stage passed (exit status zero).
    pub fn passed(&self) -> bool {
        matches!(self, StageStatus::Passed)
    }
}

/// Result of one attempted stage: status plus elapsed time, nothing else.
///
/// Output streams are inherited by the child, so the tool's own output is
/// the log; the runner never captures or inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,

    /// How the stage ended.
    pub status: StageStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StageReport {
    /// Whether this stage passed.
    pub fn passed(&self) -> bool {
        self.status.passed()
    }
}

/// Executes a single stage inside a workspace directory.
pub struct StageRunner;

impl StageRunner {
    /// Run one stage to completion and report its exit status.
    ///
    /// The command inherits stdin/stdout/stderr so tool output streams
    /// live; execution blocks until the child exits. A non-zero exit is
    /// an `Ok` report carrying [`StageStatus::Failed`]; only launch
    /// failures, timeouts and interruption are `Err`. The child is killed
    /// before either of the latter two is returned, so a halted pipeline
    /// leaves no orphaned subprocess.
    pub async fn execute(stage: &Stage, workspace: &Path) -> Result<StageReport, StageError> {
        if stage.command.is_empty() {
            return Err(StageError::Launch {
                stage: stage.name.clone(),
                command: String::new(),
                source: io::Error::new(io::ErrorKind::NotFound, "empty command"),
            });
        }

        let start = Instant::now();

        let mut child = Command::new(&stage.command)
            .args(&stage.args)
            .current_dir(workspace)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| StageError::Launch {
                stage: stage.name.clone(),
                command: stage.command_line(),
                source,
            })?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|source| StageError::Launch {
                stage: stage.name.clone(),
                command: stage.command_line(),
                source,
            })?,
            _ = tokio::time::sleep(Duration::from_secs(stage.timeout_secs)),
                if stage.timeout_secs > 0 =>
            {
                child.kill().await.ok();
                return Err(StageError::Timeout {
                    stage: stage.name.clone(),
                    limit_secs: stage.timeout_secs,
                });
            }
            _ = tokio::signal::ctrl_c() => {
                child.kill().await.ok();
                return Err(StageError::Interrupted {
                    stage: stage.name.clone(),
                });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        debug!(stage = %stage.name, exit_code, duration_ms, "stage finished");

        let report_status = if status.success() {
            StageStatus::Passed
        } else {
            StageStatus::Failed { exit_code }
        };

        Ok(StageReport {
            name: stage.name.clone(),
            status: report_status,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn stage_report_passed() {
        let report = StageReport {
            name: "fmt".to_string(),
            status: StageStatus::Passed,
            duration_ms: 100,
        };
        assert!(report.passed());
    }

    #[test]
    fn stage_report_failed() {
        let report = StageReport {
            name: "clippy".to_string(),
            status: StageStatus::Failed { exit_code: 1 },
            duration_ms: 100,
        };
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn execute_passing_command() {
        let stage = Stage::new("ok", "true", Vec::<String>::new());
        let report = StageRunner::execute(&stage, &workspace())
            .await
            .expect("execute failed");
        assert!(report.passed());
        assert_eq!(report.status, StageStatus::Passed);
    }

    #[tokio::test]
    async fn execute_failing_command() {
        let stage = Stage::new("bad", "false", Vec::<String>::new());
        let report = StageRunner::execute(&stage, &workspace())
            .await
            .expect("execute failed");
        assert!(!report.passed());
        assert_eq!(report.status, StageStatus::Failed { exit_code: 1 });
    }

    #[tokio::test]
    async fn execute_preserves_exit_code() {
        let stage = Stage::new("exit7", "sh", ["-c", "exit 7"]);
        let report = StageRunner::execute(&stage, &workspace())
            .await
            .expect("execute failed");
        assert_eq!(report.status, StageStatus::Failed { exit_code: 7 });
    }

    #[tokio::test]
    async fn unresolved_command_is_a_launch_failure() {
        let stage = Stage::new("ghost", "shipcheck-no-such-tool", Vec::<String>::new());
        let err = StageRunner::execute(&stage, &workspace())
            .await
            .expect_err("expected launch failure");
        assert!(matches!(err, StageError::Launch { .. }));
        assert_eq!(err.stage(), "ghost");
    }

    #[tokio::test]
    async fn empty_command_is_a_launch_failure() {
        let stage = Stage::new("empty", "", Vec::<String>::new());
        let err = StageRunner::execute(&stage, &workspace())
            .await
            .expect_err("expected launch failure");
        assert!(matches!(err, StageError::Launch { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out_and_is_killed() {
        let stage = Stage::new("slow", "sleep", ["5"]).timeout(1);
        let start = Instant::now();
        let err = StageRunner::execute(&stage, &workspace())
            .await
            .expect_err("expected timeout");
        assert!(matches!(err, StageError::Timeout { limit_secs: 1, .. }));
        // The child must die with the timeout, not run its full 5s.
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
