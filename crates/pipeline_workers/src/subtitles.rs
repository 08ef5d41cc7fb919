use std::sync::Arc;

use pipeline_core::{PipelineError, PipelineResult, Step, StepKind, StepStatus, TaskLogStep, TaskStatus};
use pipeline_providers::{Aligner, Notifier};
use pipeline_store::TaskStore;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::loop_util::run_ticking;
use crate::metrics::{batch_len, ROWS_CLAIMED_TOTAL, ROWS_COMPLETED_TOTAL};
use crate::retry::handle_step_failure;

const INIT: &str = "init_subtitles";
const FETCH: &str = "fetch_subtitles";

/// The two SUBTITLES-phase workers (spec.md §4.5). Submit and poll are
/// fused into one `FetchSubtitles` action since `Aligner::fetch_subtitles`
/// is a single synchronous-looking call rather than a submit/poll pair.
pub struct SubtitlesWorkers {
	store: Arc<TaskStore>,
	aligner: Arc<dyn Aligner>,
	notifier: Arc<dyn Notifier>,
	config: WorkerConfig,
}

impl SubtitlesWorkers {
	#[must_use]
	pub fn new(store: Arc<TaskStore>, aligner: Arc<dyn Aligner>, notifier: Arc<dyn Notifier>, config: WorkerConfig) -> Self {
		Self { store, aligner, notifier, config }
	}

	/// InitSubtitles (spec.md §4.5).
	pub async fn run_init(&self, cancel: CancellationToken) {
		run_ticking(INIT, &cancel, self.config.tick_interval, || self.tick_init()).await;
	}

	async fn tick_init(&self) -> PipelineResult<()> {
		let tasks = self.store.claim_tasks_for_init(TaskStatus::TranscriptCompleted, StepKind::Subtitles, self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[INIT]).inc_by(batch_len(tasks.len()));

		for task in tasks {
			let Some(transcript_step) = self.store.find_step(task.id, StepKind::Transcript, StepStatus::Completed).await? else { continue };
			let Some(transcript_id) = transcript_step.payload.get("transcript_id").and_then(|v| v.as_str()) else { continue };

			if let Some(step) = self.store.init_subtitles_step(task.id, transcript_id).await? {
				self.store.append_log(task.id, Some(step.id), Some(TaskLogStep::SubtitlesStart), serde_json::json!({})).await?;
				ROWS_COMPLETED_TOTAL.with_label_values(&[INIT]).inc();
			}
		}
		Ok(())
	}

	/// FetchSubtitles (spec.md §4.5).
	pub async fn run_fetch(&self, cancel: CancellationToken) {
		run_ticking(FETCH, &cancel, self.config.tick_interval, || self.tick_fetch()).await;
	}

	async fn tick_fetch(&self) -> PipelineResult<()> {
		let steps = self.store.claim_steps(StepKind::Subtitles, &[StepStatus::Init, StepStatus::InProcess, StepStatus::Failed], self.config.max_attempts, Some("transcript_id"), None, None, self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[FETCH]).inc_by(batch_len(steps.len()));

		for step in steps {
			match self.fetch_one(&step).await {
				Ok(()) => ROWS_COMPLETED_TOTAL.with_label_values(&[FETCH]).inc(),
				Err(err) if err.is_not_ready() => {}
				Err(err) => handle_step_failure(&self.store, self.notifier.as_ref(), FETCH, StepKind::Subtitles, step.task_id, step.id, self.config.max_attempts, &err).await?,
			}
		}
		Ok(())
	}

	async fn fetch_one(&self, step: &Step) -> PipelineResult<()> {
		let transcript_id = step.payload.get("transcript_id").and_then(|v| v.as_str()).ok_or_else(|| PipelineError::validation("subtitles step missing transcript_id"))?.to_string();

		let cues = self.aligner.fetch_subtitles(&transcript_id).await?;
		self.store.complete_subtitles(step.task_id, step.id, &cues).await?;
		self.store.append_log(step.task_id, Some(step.id), Some(TaskLogStep::SubtitlesSuccess), serde_json::json!({ "cue_count": cues.len() })).await?;
		Ok(())
	}
}

// See split.rs: `TaskStore`-backed flows are verified against a live
// Postgres instance rather than with in-process tests here.
