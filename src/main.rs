use anyhow::{Context, Result};
use pipeline_controller::cli::commands::{ReconcileCommand, TaskRunOutcome, ValidateCommand};
use pipeline_controller::cli::output::*;
use pipeline_controller::cli::{Cli, Command};
use pipeline_controller::core::condition::{REASON_FAILED, REASON_SUCCEEDED};
use pipeline_controller::core::manifest::{self, Object};
use pipeline_controller::reconciler::resolver;
use pipeline_controller::{
    Condition, ConditionStatus, Controller, ControllerConfig, InMemoryStore, Lister, PipelineRun,
    ReconcileError, Reconciler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = match &cli.config {
        Some(path) => ControllerConfig::from_file(path)
            .with_context(|| format!("Failed to load controller config {}", path))?,
        None => ControllerConfig::default(),
    };
    debug!("Controller config: {:?}", config);

    let ok = match &cli.command {
        Command::Reconcile(cmd) => reconcile_manifests(cmd, config).await?,
        Command::Validate(cmd) => validate_manifests(cmd).await?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn load_manifests(files: &[String]) -> Result<Vec<Object>> {
    let mut objects = Vec::new();
    for file in files {
        let loaded = manifest::from_file(file)
            .with_context(|| format!("Failed to load manifests from {}", file))?;
        objects.extend(loaded);
    }
    Ok(objects)
}

/// Returns `false` if any PipelineRun ended up failed
async fn reconcile_manifests(cmd: &ReconcileCommand, config: ControllerConfig) -> Result<bool> {
    let objects = load_manifests(&cmd.file)?;
    if !cmd.json {
        println!("{} Loaded {} objects", INFO, style(objects.len()).cyan());
    }

    let store = Arc::new(InMemoryStore::with_objects(objects).await.with_action_capacity(0));
    let json = cmd.json;
    let reconciler = Reconciler::from_store(store.clone()).with_event_handler(move |event| {
        if !json {
            println!("{}", format_reconcile_event(&event));
        }
    });

    let controller = Controller::new(reconciler, config);
    let cancel = CancellationToken::new();
    let watch = controller.watch(store.subscribe(), store.clone(), cancel.clone());

    if cmd.key.is_empty() {
        controller
            .enqueue_all(store.as_ref())
            .await
            .context("Failed to list PipelineRuns")?;
    } else {
        for key in &cmd.key {
            controller.enqueue(key.clone());
        }
    }

    let drive = async {
        controller.wait_idle().await;

        if let Some(outcome) = cmd.complete_task_runs {
            for run in complete_task_runs(&store, outcome).await? {
                controller.enqueue(run);
            }
            controller.wait_idle().await;
        }
        Ok::<(), anyhow::Error>(())
    };

    let timeout = Duration::from_secs(cmd.timeout_secs);
    let (_, result) = tokio::join!(controller.run(cancel.clone()), async {
        let result = tokio::time::timeout(timeout, drive).await;
        cancel.cancel();
        result
    });
    watch.await.context("Watch task failed")?;

    result.with_context(|| format!("Reconciling did not settle within {}s", cmd.timeout_secs))??;

    let runs = store
        .list_pipeline_runs()
        .await
        .context("Failed to list PipelineRuns")?;
    let ok = !runs
        .iter()
        .any(|r| r.status.succeeded().is_some_and(|c| c.is_false()));

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        println!();
        for run in &runs {
            println!("{}", format_run_summary(run));
        }
    }

    Ok(ok)
}

/// Record `outcome` on every unfinished TaskRun, returning the owning run keys
async fn complete_task_runs(store: &InMemoryStore, outcome: TaskRunOutcome) -> Result<Vec<String>> {
    let mut runs = Vec::new();

    for task_run in store.task_runs().await {
        if task_run.is_done() {
            continue;
        }
        let condition = match outcome {
            TaskRunOutcome::Succeeded => Condition::succeeded(ConditionStatus::True, REASON_SUCCEEDED, ""),
            TaskRunOutcome::Failed => {
                Condition::succeeded(ConditionStatus::False, REASON_FAILED, "marked failed from the command line")
            }
        };
        let updated = store
            .set_task_run_condition(&task_run.metadata.namespace, &task_run.metadata.name, condition)
            .await?;
        if let Some(run) = updated.owning_run() {
            runs.push(run.to_string());
        }
    }

    runs.sort();
    runs.dedup();
    Ok(runs)
}

/// Returns `false` if any PipelineRun fails to resolve
async fn validate_manifests(cmd: &ValidateCommand) -> Result<bool> {
    let objects = load_manifests(&cmd.file)?;
    let store = InMemoryStore::with_objects(objects).await.with_action_capacity(0);
    let cancel = CancellationToken::new();

    let runs = store.list_pipeline_runs().await?;
    if runs.is_empty() && !cmd.json {
        println!("{} No PipelineRuns found", WARN);
    }

    let mut report = Vec::new();
    let mut ok = true;
    for run in &runs {
        let outcome = resolver::resolve(&store, run, &cancel).await;
        match outcome {
            Ok(resolved) => {
                if !cmd.json {
                    println!(
                        "{} {} - {} tasks, {} resources",
                        CHECK,
                        style(run.metadata.key()).bold(),
                        style(resolved.tasks.len()).cyan(),
                        style(resolved.resources.len()).cyan()
                    );
                }
                report.push(validation_entry(run, None));
            }
            Err(ReconcileError::Validation(err)) => {
                ok = false;
                if !cmd.json {
                    println!("{} {}: {}", CROSS, style(run.metadata.key()).bold(), style(&err).red());
                }
                report.push(validation_entry(run, Some(&err)));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to resolve {}", run.metadata.key()));
            }
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelineRuns": report });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(ok)
}

fn validation_entry(
    run: &PipelineRun,
    error: Option<&pipeline_controller::ValidationError>,
) -> serde_json::Value {
    serde_json::json!({
        "key": run.metadata.key().to_string(),
        "valid": error.is_none(),
        "kind": error.map(|e| e.kind.to_string()),
        "message": error.map(|e| e.message.clone()),
    })
}
