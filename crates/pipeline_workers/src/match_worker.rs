use std::sync::Arc;

use futures::future::join_all;
use pipeline_core::{MatchComment, PipelineResult, Resume, Vacancy};
use pipeline_providers::{LanguageModel, MatchOutcome, Notifier};
use pipeline_store::VacancyStore;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::loop_util::run_ticking;
use crate::metrics::{batch_len, ROWS_CLAIMED_TOTAL, ROWS_COMPLETED_TOTAL};

const WORKER: &str = "match";

/// The Match worker (spec.md §4.10). Resumes are scored in parallel per
/// vacancy via `join_all` (spec.md §9 open question resolved in favor of
/// parallelism), relying on the `(vacancy_id, resume_id)` unique constraint
/// rather than a lock to keep the uniqueness guarantee under concurrent
/// workers.
pub struct MatchWorker {
	store: Arc<VacancyStore>,
	language_model: Arc<dyn LanguageModel>,
	notifier: Arc<dyn Notifier>,
	config: WorkerConfig,
}

impl MatchWorker {
	#[must_use]
	pub fn new(store: Arc<VacancyStore>, language_model: Arc<dyn LanguageModel>, notifier: Arc<dyn Notifier>, config: WorkerConfig) -> Self {
		Self { store, language_model, notifier, config }
	}

	pub async fn run(&self, cancel: CancellationToken) {
		run_ticking(WORKER, &cancel, self.config.tick_interval, || self.tick()).await;
	}

	async fn tick(&self) -> PipelineResult<()> {
		let vacancies = self.store.claim_for_matching(self.config.vacancy_batch_size).await?;
		ROWS_CLAIMED_TOTAL.with_label_values(&[WORKER]).inc_by(batch_len(vacancies.len()));

		for vacancy in vacancies {
			self.match_one(&vacancy).await?;
			ROWS_COMPLETED_TOTAL.with_label_values(&[WORKER]).inc();
		}
		Ok(())
	}

	async fn match_one(&self, vacancy: &Vacancy) -> PipelineResult<()> {
		let resumes = self.store.active_resumes().await?;

		let outcomes = join_all(resumes.into_iter().map(|resume| self.match_resume(vacancy, resume))).await;
		for outcome in outcomes {
			outcome?;
		}

		self.store.mark_processed(vacancy.id).await?;
		Ok(())
	}

	async fn match_resume(&self, vacancy: &Vacancy, resume: Resume) -> PipelineResult<()> {
		if self.store.match_exists(vacancy.id, resume.id).await? {
			return Ok(());
		}

		let outcome = if resume.specialist_type == vacancy.specialist_type {
			self.language_model.match_vacancy_and_resume(&vacancy.text, &resume.text).await?
		} else {
			MatchOutcome { score: 1, comments: vec![MatchComment { text: "kind mismatch".to_string(), score: 1 }] }
		};

		let is_recommended = outcome.score >= self.config.recommend_threshold;
		self.store.create_match(vacancy.id, resume.id, outcome.score, is_recommended, &outcome.comments).await?;
		self.store.append_match_log(vacancy.id, Some(resume.id), serde_json::json!({ "score": outcome.score, "is_recommended": is_recommended })).await?;

		if is_recommended {
			self.notifier.notify(&format!("Vacancy {} matched resume {} (score {})", vacancy.id, resume.id, outcome.score)).await;
		}

		Ok(())
	}
}

// See split.rs: `VacancyStore`-backed flows need a live Postgres instance
// and are verified manually; spec.md §8 scenario #5 (match not-recommended)
// is the reference case this module's logic was written against.
