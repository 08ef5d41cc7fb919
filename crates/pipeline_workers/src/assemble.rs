use std::sync::Arc;

use pipeline_core::{fuse, PipelineResult, TaskLogStep};
use pipeline_store::TaskStore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::loop_util::run_ticking;
use crate::metrics::{batch_len, ROWS_CLAIMED_TOTAL, ROWS_COMPLETED_TOTAL};

const WORKER: &str = "assemble";

/// The Assemble worker (spec.md §4.6): the only step-less worker, since
/// assembly produces a Track rather than advancing a Step.
pub struct AssembleWorker {
	store: Arc<TaskStore>,
	config: WorkerConfig,
}

impl AssembleWorker {
	#[must_use]
	pub fn new(store: Arc<TaskStore>, config: WorkerConfig) -> Self {
		Self { store, config }
	}

	pub async fn run(&self, cancel: CancellationToken) {
		run_ticking(WORKER, &cancel, self.config.tick_interval, || self.tick()).await;
	}

	async fn tick(&self) -> PipelineResult<()> {
		let tasks = self.store.claim_tasks_for_assemble(self.config.task_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[WORKER]).inc_by(batch_len(tasks.len()));

		for task in tasks {
			let words = task.words.clone().unwrap_or_default();
			let subtitles = task.subtitles.clone().unwrap_or_default();

			let (lines, coverage) = fuse(&words, &subtitles);
			debug!(task_id = %task.id, matched = coverage.matched_words, total = coverage.total_words, coverage_pct = coverage.coverage_percentage, "fused transcript");

			if let Some(track) = self.store.assemble_track(task.id, lines).await? {
				self.store.append_log(task.id, None, Some(TaskLogStep::AssembleSuccess), serde_json::json!({ "track_id": track.id, "line_count": track.lines.len() })).await?;
				ROWS_COMPLETED_TOTAL.with_label_values(&[WORKER]).inc();
			}
		}
		Ok(())
	}
}

