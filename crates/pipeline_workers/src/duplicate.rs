use std::sync::Arc;

use pipeline_core::{PipelineResult, Vacancy};
use pipeline_providers::LanguageModel;
use pipeline_store::VacancyStore;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::loop_util::run_ticking;
use crate::metrics::{batch_len, ROWS_CLAIMED_TOTAL, ROWS_COMPLETED_TOTAL};

const WORKER: &str = "check_duplicates";

/// The CheckDuplicates worker (spec.md §4.9). Provider failures here are a
/// deliberate dead end rather than a retry target: the vacancy is marked
/// `duplicate_check_success = false` and left alone (spec.md §9 open
/// question: cost-control, not a bug, per this implementation's reading).
pub struct DuplicateWorker {
	store: Arc<VacancyStore>,
	language_model: Arc<dyn LanguageModel>,
	config: WorkerConfig,
}

impl DuplicateWorker {
	#[must_use]
	pub fn new(store: Arc<VacancyStore>, language_model: Arc<dyn LanguageModel>, config: WorkerConfig) -> Self {
		Self { store, language_model, config }
	}

	pub async fn run(&self, cancel: CancellationToken) {
		run_ticking(WORKER, &cancel, self.config.tick_interval, || self.tick()).await;
	}

	async fn tick(&self) -> PipelineResult<()> {
		let vacancies = self.store.claim_for_duplicate_check(self.config.vacancy_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[WORKER]).inc_by(batch_len(vacancies.len()));

		for vacancy in vacancies {
			self.check_one(&vacancy).await?;
			ROWS_COMPLETED_TOTAL.with_label_values(&[WORKER]).inc();
		}
		Ok(())
	}

	async fn check_one(&self, vacancy: &Vacancy) -> PipelineResult<()> {
		let candidates = self.store.duplicate_candidates(vacancy).await?;

		if candidates.is_empty() {
			self.store.append_duplicate_log(vacancy.id, None, serde_json::json!({ "result": "no_candidates" })).await?;
			self.store.resolve_duplicate_check(vacancy.id, true, None).await?;
			return Ok(());
		}

		for candidate in &candidates {
			match self.language_model.check_vacancy_duplicate(&vacancy.text, &candidate.text).await {
				Ok(score) => {
					self.store.append_duplicate_log(vacancy.id, Some(candidate.id), serde_json::json!({ "score": score })).await?;

					if score >= self.config.duplicate_threshold {
						self.store.resolve_duplicate_check(vacancy.id, true, Some(candidate.id)).await?;
						return Ok(());
					}
				}
				Err(err) => {
					self.store.append_duplicate_log(vacancy.id, Some(candidate.id), serde_json::json!({ "error_kind": format!("{:?}", err.kind), "message": err.message() })).await?;
					self.store.resolve_duplicate_check(vacancy.id, false, None).await?;
					return Ok(());
				}
			}
		}

		self.store.resolve_duplicate_check(vacancy.id, true, None).await?;
		Ok(())
	}
}

// See split.rs: `VacancyStore`-backed flows need a live Postgres instance
// and are verified manually; spec.md §8 scenario #4 (duplicate detection)
// is the reference case this module's logic was written against.
