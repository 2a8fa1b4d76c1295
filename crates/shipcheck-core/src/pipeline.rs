//! Pipeline orchestration: ordered, sequential, fail-fast.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::StageError;
use crate::runner::{StageReport, StageRunner, StageStatus};
use crate::stage::Stage;

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every attempted stage exited zero.
    Success,

    /// At least one stage failed; holds the first failing stage's name.
    /// Set even when that stage was marked `continue_on_failure` and
    /// later stages went on to pass.
    FailedAt(String),
}

/// Result of a complete pipeline run.
///
/// Created when the run starts, appended to per attempted stage, and
/// finalized exactly once when the pipeline halts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Reports for attempted stages, in execution order. Disabled stages
    /// are never attempted and do not appear here.
    pub stages: Vec<StageReport>,

    /// Overall outcome.
    pub status: PipelineStatus,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Whether every attempted stage passed.
    pub fn success(&self) -> bool {
        matches!(self.status, PipelineStatus::Success)
    }

    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    /// Process exit code for this run.
    ///
    /// Success maps to 0. A failed run propagates the first failing
    /// stage's exit status when it fits in 1..=255, uses 130 after an
    /// interrupt, and falls back to 1 otherwise (launch failure, timeout,
    /// or a status outside the propagatable range).
    pub fn exit_code(&self) -> u8 {
        let name = match &self.status {
            PipelineStatus::Success => return 0,
            PipelineStatus::FailedAt(name) => name,
        };

        let first_failed = self
            .stages
            .iter()
            .find(|report| report.name == *name && !report.passed());

        match first_failed.map(|report| &report.status) {
            Some(StageStatus::Failed { exit_code }) => u8::try_from(*exit_code).unwrap_or(1),
            Some(StageStatus::Interrupted) => 130,
            _ => 1,
        }
    }
}

/// Sequential pipeline executor.
///
/// Exactly one external command runs at a time; ordering is the only
/// synchronization the workspace needs, since each tool must see the
/// previous tool's mutations (formatting before linting, everything
/// before bundling).
pub struct Pipeline;

impl Pipeline {
    /// Run every enabled stage in declaration order inside `workspace`.
    ///
    /// Halts after the first failing stage unless that stage is marked
    /// `continue_on_failure`; launch failures and timeouts follow the
    /// same rule, interruption always halts. The returned result is
    /// finalized either way.
    pub async fn run(stages: &[Stage], workspace: &Path) -> PipelineResult {
        let start = Instant::now();
        let mut reports: Vec<StageReport> = Vec::new();
        let mut first_failure: Option<String> = None;

        for stage in stages {
            if !stage.enabled {
                info!(stage = %stage.name, "skipping disabled stage");
                continue;
            }

            info!(stage = %stage.name, command = %stage.command_line(), "running stage");
            let stage_start = Instant::now();

            match StageRunner::execute(stage, workspace).await {
                Ok(report) => {
                    let passed = report.passed();
                    if passed {
                        info!(
                            stage = %stage.name,
                            duration_ms = report.duration_ms,
                            "stage passed"
                        );
                    } else {
                        error!(stage = %stage.name, status = ?report.status, "stage failed");
                    }
                    reports.push(report);

                    if !passed {
                        if first_failure.is_none() {
                            first_failure = Some(stage.name.clone());
                        }
                        if !stage.continue_on_failure {
                            break;
                        }
                    }
                }
                Err(err) => {
                    error!(stage = %stage.name, %err, "stage aborted");
                    let status = match &err {
                        StageError::Launch { .. } => StageStatus::LaunchFailed {
                            message: err.to_string(),
                        },
                        StageError::Timeout { limit_secs, .. } => StageStatus::TimedOut {
                            limit_secs: *limit_secs,
                        },
                        StageError::Interrupted { .. } => StageStatus::Interrupted,
                    };
                    let interrupted = matches!(status, StageStatus::Interrupted);

                    reports.push(StageReport {
                        name: stage.name.clone(),
                        status,
                        duration_ms: stage_start.elapsed().as_millis() as u64,
                    });

                    if first_failure.is_none() {
                        first_failure = Some(stage.name.clone());
                    }
                    if interrupted || !stage.continue_on_failure {
                        break;
                    }
                }
            }
        }

        let status = match first_failure {
            None => PipelineStatus::Success,
            Some(name) => PipelineStatus::FailedAt(name),
        };

        let result = PipelineResult {
            stages: reports,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match &result.status {
            PipelineStatus::Success => {
                info!(duration_ms = result.duration_ms, "pipeline succeeded");
            }
            PipelineStatus::FailedAt(name) => {
                error!(stage = %name, duration_ms = result.duration_ms, "pipeline failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, status: StageStatus) -> StageReport {
        StageReport {
            name: name.to_string(),
            status,
            duration_ms: 10,
        }
    }

    #[test]
    fn result_counts() {
        let result = PipelineResult {
            stages: vec![
                report("check", StageStatus::Passed),
                report("clippy", StageStatus::Failed { exit_code: 1 }),
                report("test", StageStatus::Passed),
            ],
            status: PipelineStatus::FailedAt("clippy".to_string()),
            duration_ms: 30,
        };
        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.success());
    }

    #[test]
    fn exit_code_success_is_zero() {
        let result = PipelineResult {
            stages: vec![report("check", StageStatus::Passed)],
            status: PipelineStatus::Success,
            duration_ms: 10,
        };
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn exit_code_propagates_failing_stage_status() {
        let result = PipelineResult {
            stages: vec![
                report("check", StageStatus::Passed),
                report("test", StageStatus::Failed { exit_code: 101 }),
            ],
            status: PipelineStatus::FailedAt("test".to_string()),
            duration_ms: 20,
        };
        assert_eq!(result.exit_code(), 101);
    }

    #[test]
    fn exit_code_falls_back_to_one() {
        // Launch failure has no propagatable status.
        let launch = PipelineResult {
            stages: vec![report(
                "build_web",
                StageStatus::LaunchFailed {
                    message: "not found".to_string(),
                },
            )],
            status: PipelineStatus::FailedAt("build_web".to_string()),
            duration_ms: 1,
        };
        assert_eq!(launch.exit_code(), 1);

        // Killed-by-signal children report -1, also not propagatable.
        let signalled = PipelineResult {
            stages: vec![report("test", StageStatus::Failed { exit_code: -1 })],
            status: PipelineStatus::FailedAt("test".to_string()),
            duration_ms: 1,
        };
        assert_eq!(signalled.exit_code(), 1);
    }

    #[test]
    fn exit_code_interrupted_is_130() {
        let result = PipelineResult {
            stages: vec![report("test", StageStatus::Interrupted)],
            status: PipelineStatus::FailedAt("test".to_string()),
            duration_ms: 1,
        };
        assert_eq!(result.exit_code(), 130);
    }
}
