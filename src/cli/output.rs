//! CLI output formatting

use crate::core::{Condition, ConditionStatus, PipelineRun};
use crate::reconciler::ReconcileEvent;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a condition status for display
pub fn format_condition(condition: Option<&Condition>) -> String {
    match condition {
        None => style("PENDING").dim().to_string(),
        Some(c) => match c.status {
            ConditionStatus::Unknown => style(format!("RUNNING ({})", c.reason)).yellow().to_string(),
            ConditionStatus::True => style(c.reason.to_uppercase()).green().to_string(),
            ConditionStatus::False => style(c.reason.to_uppercase()).red().to_string(),
        },
    }
}

fn status_icon(condition: Option<&Condition>) -> Emoji<'static, 'static> {
    match condition.map(|c| c.status) {
        Some(ConditionStatus::True) => CHECK,
        Some(ConditionStatus::False) => CROSS,
        Some(ConditionStatus::Unknown) => SPINNER,
        None => INFO,
    }
}

/// Format a PipelineRun and its TaskRuns for display
pub fn format_run_summary(run: &PipelineRun) -> String {
    let condition = run.status.succeeded();
    let mut lines = vec![format!(
        "{} {} - {}",
        status_icon(condition),
        style(run.metadata.key()).bold(),
        format_condition(condition)
    )];

    if let Some(c) = condition.filter(|c| !c.message.is_empty()) {
        lines.push(format!("    {}", style(&c.message).dim()));
    }

    for (name, task_run) in &run.status.task_runs {
        lines.push(format!(
            "    {} {} ({}) - {}",
            status_icon(task_run.condition.as_ref()),
            style(name).cyan(),
            style(&task_run.pipeline_task_name).dim(),
            format_condition(task_run.condition.as_ref())
        ));
    }

    lines.join("\n")
}

/// Format a reconcile event for display
pub fn format_reconcile_event(event: &ReconcileEvent) -> String {
    match event {
        ReconcileEvent::KeyDropped { key, reason } => {
            format!("{} Skipped {}: {}", WARN, style(key).yellow(), style(reason).dim())
        }
        ReconcileEvent::ValidationFailed { run, error } => format!(
            "{} {} failed validation: {}",
            CROSS,
            style(run).red(),
            style(error).dim()
        ),
        ReconcileEvent::TaskRunCreated { run, task_run } => format!(
            "{} {} created TaskRun {}",
            ROCKET,
            style(run).bold(),
            style(task_run).cyan()
        ),
        ReconcileEvent::ConditionChanged { run, condition } => format!(
            "{} {} is now {}",
            status_icon(Some(condition)),
            style(run).bold(),
            format_condition(Some(condition))
        ),
    }
}
