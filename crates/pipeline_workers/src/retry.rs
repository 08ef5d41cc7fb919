use pipeline_core::{PipelineError, StepKind};
use pipeline_providers::Notifier;
use pipeline_store::TaskStore;
use uuid::Uuid;

use crate::metrics::ROWS_FAILED_TOTAL;

/// Applies the retry policy (spec.md §4.8) to a failed Step and notifies on
/// final failure. Centralised so every phase worker shares the same
/// attempt-counting and notification behavior instead of re-deriving it.
pub async fn handle_step_failure(store: &TaskStore, notifier: &dyn Notifier, worker_name: &str, step_kind: StepKind, task_id: Uuid, step_id: Uuid, max_attempts: i32, error: &PipelineError) -> pipeline_core::PipelineResult<()> {
	let is_final = store.fail_step(task_id, step_id, max_attempts, step_kind, error).await?;
	ROWS_FAILED_TOTAL.with_label_values(&[worker_name, if is_final { "true" } else { "false" }]).inc();

	if is_final {
		notifier.notify_final_failure(&format!("{worker_name} task={task_id} step={step_id}"), error).await;
	}

	Ok(())
}
