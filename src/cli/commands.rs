//! CLI command definitions

use clap::Args;

/// Load manifests into an in-memory store and reconcile PipelineRuns
#[derive(Debug, Args, Clone)]
pub struct ReconcileCommand {
    /// Manifest files (multi-document YAML); may be repeated
    #[arg(short, long, required = true)]
    pub file: Vec<String>,

    /// Only reconcile these `namespace/name` keys (default: every PipelineRun)
    #[arg(short, long)]
    pub key: Vec<String>,

    /// Mark created TaskRuns finished and reconcile again, standing in for an
    /// execution engine
    #[arg(long, value_enum)]
    pub complete_task_runs: Option<TaskRunOutcome>,

    /// Give up if the queue hasn't drained after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Check that every PipelineRun in the manifests resolves
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Manifest files (multi-document YAML); may be repeated
    #[arg(short, long, required = true)]
    pub file: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Outcome recorded on TaskRuns by `--complete-task-runs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TaskRunOutcome {
    Succeeded,
    Failed,
}
