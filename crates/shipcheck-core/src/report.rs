//! Machine-readable run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineResult, PipelineStatus};
use crate::runner::{StageReport, StageStatus};
use crate::stage::Stage;

/// Top-level JSON report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// shipcheck version string.
    pub version: String,

    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,

    /// Overall outcome.
    pub status: PipelineStatus,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Number of stages that passed.
    pub passed: u32,

    /// Number of stages that failed.
    pub failed: u32,

    /// Per-stage entries, in execution order.
    pub results: Vec<StageEntry>,
}

/// Per-stage entry in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    /// Stage name.
    pub name: String,

    /// Full command string.
    pub command: String,

    /// "pass" or "fail".
    pub status: String,

    /// Exit code (0 = success; -1 when the command never produced one).
    pub exit_code: i32,

    /// Stage execution duration in milliseconds.
    pub duration_ms: u64,

    /// Failure detail if the stage did not pass (may be empty).
    #[serde(default)]
    pub error: String,
}

impl PipelineReport {
    /// Build a report from a finished run.
    ///
    /// `stages` is the declared stage list the run was given; it supplies
    /// the rendered command for each attempted stage.
    pub fn new(
        version: &str,
        started_at: DateTime<Utc>,
        stages: &[Stage],
        result: &PipelineResult,
    ) -> Self {
        let results = result
            .stages
            .iter()
            .map(|report| {
                let command = stages
                    .iter()
                    .find(|stage| stage.name == report.name)
                    .map(Stage::command_line)
                    .unwrap_or_default();
                StageEntry::new(report, command)
            })
            .collect();

        Self {
            version: version.to_string(),
            started_at,
            status: result.status.clone(),
            duration_ms: result.duration_ms,
            passed: result.passed_count() as u32,
            failed: result.failed_count() as u32,
            results,
        }
    }
}

impl StageEntry {
    fn new(report: &StageReport, command: String) -> Self {
        let (status, exit_code, error) = match &report.status {
            StageStatus::Passed => ("pass", 0, String::new()),
            StageStatus::Failed { exit_code } => {
                ("fail", *exit_code, format!("exited with code {exit_code}"))
            }
            StageStatus::LaunchFailed { message } => ("fail", -1, message.clone()),
            StageStatus::TimedOut { limit_secs } => {
                ("fail", -1, format!("timed out after {limit_secs}s"))
            }
            StageStatus::Interrupted => ("fail", -1, "interrupted".to_string()),
        };

        Self {
            name: report.name.clone(),
            command,
            status: status.to_string(),
            exit_code,
            duration_ms: report.duration_ms,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> (Vec<Stage>, PipelineResult) {
        let stages = vec![
            Stage::new("check", "cargo", ["check", "--workspace"]),
            Stage::new("clippy", "cargo", ["clippy"]),
        ];
        let result = PipelineResult {
            stages: vec![
                StageReport {
                    name: "check".to_string(),
                    status: StageStatus::Passed,
                    duration_ms: 1200,
                },
                StageReport {
                    name: "clippy".to_string(),
                    status: StageStatus::Failed { exit_code: 101 },
                    duration_ms: 800,
                },
            ],
            status: PipelineStatus::FailedAt("clippy".to_string()),
            duration_ms: 2000,
        };
        (stages, result)
    }

    #[test]
    fn report_counts_and_commands() {
        let (stages, result) = sample_result();
        let report = PipelineReport::new("0.1.0", Utc::now(), &stages, &result);

        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].command, "cargo check --workspace");
        assert_eq!(report.results[0].status, "pass");
        assert_eq!(report.results[1].status, "fail");
        assert_eq!(report.results[1].exit_code, 101);
        assert!(report.results[1].error.contains("101"));
    }

    #[test]
    fn report_serializes_failed_at_stage() {
        let (stages, result) = sample_result();
        let report = PipelineReport::new("0.1.0", Utc::now(), &stages, &result);
        let json = serde_json::to_value(&report).expect("serialize failed");
        assert_eq!(json["status"]["failed_at"], "clippy");
        assert_eq!(json["duration_ms"], 2000);
    }
}
