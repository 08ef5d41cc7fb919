use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{PipelineError, PipelineResult, Step, StepKind, StepStatus, TaskLogStep, TaskStatus};
use pipeline_providers::{Asr, Notifier, ObjectStore, TranscriptJob};
use pipeline_store::{poll_cutoff, TaskStore};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::loop_util::run_ticking;
use crate::metrics::{batch_len, ROWS_CLAIMED_TOTAL, ROWS_COMPLETED_TOTAL};
use crate::retry::handle_step_failure;

const INIT: &str = "init_transcript";
const SUBMIT: &str = "submit_transcript";
const POLL: &str = "poll_transcript";

/// The three TRANSCRIPT-phase workers (spec.md §4.4).
pub struct TranscriptWorkers {
	store: Arc<TaskStore>,
	object_store: Arc<dyn ObjectStore>,
	asr: Arc<dyn Asr>,
	notifier: Arc<dyn Notifier>,
	config: WorkerConfig,
}

impl TranscriptWorkers {
	#[must_use]
	pub fn new(store: Arc<TaskStore>, object_store: Arc<dyn ObjectStore>, asr: Arc<dyn Asr>, notifier: Arc<dyn Notifier>, config: WorkerConfig) -> Self {
		Self { store, object_store, asr, notifier, config }
	}

	/// InitTranscript (spec.md §4.4).
	pub async fn run_init(&self, cancel: CancellationToken) {
		run_ticking(INIT, &cancel, self.config.tick_interval, || self.tick_init()).await;
	}

	async fn tick_init(&self) -> PipelineResult<()> {
		let tasks = self.store.claim_tasks_for_init(TaskStatus::SplitCompleted, StepKind::Transcript, self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[INIT]).inc_by(batch_len(tasks.len()));

		for task in tasks {
			if let Some(step) = self.store.init_step(task.id, StepKind::Transcript, TaskStatus::SplitCompleted, TaskStatus::InTranscriptProcess).await? {
				self.store.append_log(task.id, Some(step.id), Some(TaskLogStep::TranscriptStart), serde_json::json!({})).await?;
				ROWS_COMPLETED_TOTAL.with_label_values(&[INIT]).inc();
			}
		}
		Ok(())
	}

	/// SubmitTranscript (spec.md §4.4).
	pub async fn run_submit(&self, cancel: CancellationToken) {
		run_ticking(SUBMIT, &cancel, self.config.tick_interval, || self.tick_submit()).await;
	}

	async fn tick_submit(&self) -> PipelineResult<()> {
		let steps = self.store.claim_steps(StepKind::Transcript, &[StepStatus::Init, StepStatus::Failed], self.config.max_attempts, None, Some("transcript_id"), None, self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[SUBMIT]).inc_by(batch_len(steps.len()));

		for step in steps {
			match self.submit_one(&step).await {
				Ok(()) => ROWS_COMPLETED_TOTAL.with_label_values(&[SUBMIT]).inc(),
				Err(err) if err.is_not_ready() => {}
				Err(err) => handle_step_failure(&self.store, self.notifier.as_ref(), SUBMIT, StepKind::Transcript, step.task_id, step.id, self.config.max_attempts, &err).await?,
			}
		}
		Ok(())
	}

	async fn submit_one(&self, step: &Step) -> PipelineResult<()> {
		let Some(task) = self.store.get_task(step.task_id).await? else { return Ok(()) };
		let vocal_key = task.vocal_key.ok_or_else(|| PipelineError::storage(format!("task {} reached SPLIT_COMPLETED without a vocal_key", task.id)))?;

		let audio_url = self.object_store.presign_get(&vocal_key, Duration::from_secs(3600)).await?;
		let job = self.asr.submit(&audio_url, &task.lang_code, task.id).await?;

		let patch = serde_json::json!({
			"transcript_id": job.provider_job_id,
			"submitted_at": chrono::Utc::now(),
		});

		self.store.submit_step(step.id, &[StepStatus::Init, StepStatus::Failed], self.config.max_attempts, patch).await?;
		Ok(())
	}

	/// PollTranscript (spec.md §4.4).
	pub async fn run_poll(&self, cancel: CancellationToken) {
		run_ticking(POLL, &cancel, self.config.tick_interval, || self.tick_poll()).await;
	}

	async fn tick_poll(&self) -> PipelineResult<()> {
		let cutoff = poll_cutoff(i64::try_from(self.config.transcript_poll_threshold.as_secs()).unwrap_or(i64::MAX));
		let steps = self.store.claim_steps(StepKind::Transcript, &[StepStatus::InProcess, StepStatus::Failed], self.config.max_attempts, Some("transcript_id"), None, Some(cutoff), self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[POLL]).inc_by(batch_len(steps.len()));

		for step in steps {
			match self.poll_one(&step).await {
				Ok(()) => ROWS_COMPLETED_TOTAL.with_label_values(&[POLL]).inc(),
				Err(err) if err.is_not_ready() => {}
				Err(err) => handle_step_failure(&self.store, self.notifier.as_ref(), POLL, StepKind::Transcript, step.task_id, step.id, self.config.max_attempts, &err).await?,
			}
		}
		Ok(())
	}

	async fn poll_one(&self, step: &Step) -> PipelineResult<()> {
		let provider_job_id = step.payload.get("transcript_id").and_then(|v| v.as_str()).ok_or_else(|| PipelineError::validation("transcript step missing transcript_id"))?.to_string();

		let words = self.asr.poll(&TranscriptJob { provider_job_id }).await?;
		self.store.complete_transcript(step.task_id, step.id, &words).await?;
		self.store.append_log(step.task_id, Some(step.id), Some(TaskLogStep::TranscriptSuccess), serde_json::json!({ "word_count": words.len() })).await?;
		Ok(())
	}
}

// See split.rs: the claim/submit/poll flow against `TaskStore` needs a live
// Postgres connection, so spec.md §8 scenario #3 (transcript not-ready then
// success) is verified manually rather than with an in-process test here.
