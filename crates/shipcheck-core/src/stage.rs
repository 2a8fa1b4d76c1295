//! Stage definitions and the builtin gate catalog.

use serde::{Deserialize, Serialize};

/// One external verification or build step in the pipeline.
///
/// Stages are declared at startup and never mutated afterwards. The
/// pipeline runs them in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    /// Stage name, used in logs, reports and `--stages` selection.
    pub name: String,

    /// Executable path or name.
    pub command: String,

    /// Arguments passed to the command, in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Keep running later stages even if this one fails.
    #[serde(default)]
    pub continue_on_failure: bool,

    /// Whether the stage runs at all. Disabled stages are skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Kill the command after this many seconds. Zero means no limit.
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

impl Stage {
    /// Create an enabled stage with no timeout.
    pub fn new<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            continue_on_failure: false,
            enabled: true,
            timeout_secs: 0,
        }
    }

    /// Record a failure but keep running later stages.
    pub fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Kill the command after `secs` seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Rendered command line for logs and reports.
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Builtin quality gates, in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// cargo check --workspace --all-targets
    Check,

    /// cargo check --workspace --target wasm32-unknown-unknown
    CheckWeb,

    /// cargo fmt --all (formats in place)
    Fmt,

    /// cargo clippy --workspace --all-targets -- -D warnings
    Clippy,

    /// cargo test --workspace
    Test,

    /// cargo test --doc
    DocTest,

    /// trunk build
    BuildWeb,
}

impl BuiltinStage {
    /// All builtin stages, in pipeline order. Compile checks run first so
    /// later gates never lint or test code that does not build, and the
    /// web bundle is produced last.
    pub const ALL: [BuiltinStage; 7] = [
        BuiltinStage::Check,
        BuiltinStage::CheckWeb,
        BuiltinStage::Fmt,
        BuiltinStage::Clippy,
        BuiltinStage::Test,
        BuiltinStage::DocTest,
        BuiltinStage::BuildWeb,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::Check => "check",
            BuiltinStage::CheckWeb => "check_web",
            BuiltinStage::Fmt => "fmt",
            BuiltinStage::Clippy => "clippy",
            BuiltinStage::Test => "test",
            BuiltinStage::DocTest => "doc_test",
            BuiltinStage::BuildWeb => "build_web",
        }
    }

    fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            BuiltinStage::Check => ("cargo", &["check", "--workspace", "--all-targets"]),
            BuiltinStage::CheckWeb => (
                "cargo",
                &["check", "--workspace", "--target", "wasm32-unknown-unknown"],
            ),
            BuiltinStage::Fmt => ("cargo", &["fmt", "--all"]),
            BuiltinStage::Clippy => (
                "cargo",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            ),
            BuiltinStage::Test => ("cargo", &["test", "--workspace"]),
            BuiltinStage::DocTest => ("cargo", &["test", "--doc"]),
            BuiltinStage::BuildWeb => ("trunk", &["build"]),
        }
    }

    fn timeout_secs(&self) -> u64 {
        match self {
            BuiltinStage::Check | BuiltinStage::CheckWeb => 300,
            BuiltinStage::Fmt => 120,
            BuiltinStage::Clippy => 600,
            BuiltinStage::Test => 1200,
            BuiltinStage::DocTest => 600,
            BuiltinStage::BuildWeb => 600,
        }
    }

    /// Stage configuration for this gate.
    ///
    /// Doc tests ship disabled: the stage stays declared in the catalog
    /// so `--stages doc_test` can opt in, but a default run skips it.
    pub fn stage(&self) -> Stage {
        let (command, args) = self.command();
        let stage = Stage::new(self.name(), command, args.iter().copied())
            .timeout(self.timeout_secs());
        match self {
            BuiltinStage::DocTest => stage.disabled(),
            _ => stage,
        }
    }
}

/// The default verification pipeline, in declaration order.
pub fn default_pipeline() -> Vec<Stage> {
    BuiltinStage::ALL.iter().map(BuiltinStage::stage).collect()
}
