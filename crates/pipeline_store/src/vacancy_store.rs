use chrono::Utc;
use pipeline_core::{MatchComment, PipelineResult, Resume, Vacancy, VacancyResumeMatch};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::storage_error;
use crate::vacancy_rows::{MatchRow, ResumeRow, VacancyRow};

/// Persistence for the vacancy-duplicate-detector and vacancy/resume matcher
/// subsystems (spec.md §4.9/§4.10), sharing `TaskStore`'s "one method per
/// worker action, transaction owned by the store" shape over a different
/// pair of domain tables.
pub struct VacancyStore {
	pool: PgPool,
}

impl VacancyStore {
	#[must_use]
	pub const fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn create_vacancy(&self, vacancy: &Vacancy) -> PipelineResult<()> {
		sqlx::query(
			"INSERT INTO vacancies (id, source, text, company, job_title, specialist_type, work_format, grade, experience_required, salary, technologies, skills, duplicate_checked_at, duplicate_check_success, original_vacancy_id, processed_at, created_at)
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
		)
		.bind(vacancy.id)
		.bind(vacancy.source.as_str())
		.bind(&vacancy.text)
		.bind(&vacancy.company)
		.bind(&vacancy.job_title)
		.bind(vacancy.specialist_type.as_str())
		.bind(vacancy.work_format.as_str())
		.bind(vacancy.grade.as_str())
		.bind(vacancy.experience_required)
		.bind(vacancy.salary.as_ref().map(serde_json::to_value).transpose()?)
		.bind(serde_json::to_value(&vacancy.technologies)?)
		.bind(serde_json::to_value(&vacancy.skills)?)
		.bind(vacancy.duplicate_checked_at)
		.bind(vacancy.duplicate_check_success)
		.bind(vacancy.original_vacancy_id)
		.bind(vacancy.processed_at)
		.bind(vacancy.created_at)
		.execute(&self.pool)
		.await
		.map_err(|e| storage_error("create_vacancy", e))?;

		Ok(())
	}

	/// Batch claim for `CheckDuplicates` (spec.md §4.9): vacancies not yet
	/// duplicate-checked, oldest first, capped at `limit`.
	pub async fn claim_for_duplicate_check(&self, limit: i64) -> PipelineResult<Vec<Vacancy>> {
		let rows = sqlx::query_as::<_, VacancyRow>("SELECT * FROM vacancies WHERE duplicate_checked_at IS NULL ORDER BY created_at ASC, id ASC LIMIT $1")
			.bind(limit)
			.fetch_all(&self.pool)
			.await
			.map_err(|e| storage_error("claim_for_duplicate_check", e))?;

		rows.into_iter().map(Vacancy::try_from).collect()
	}

	/// Candidate window for a vacancy `V` (spec.md §4.9): same specialist
	/// type and grade, already resolved as a canonical non-duplicate,
	/// created within the two hours preceding `V`, strictly earlier than
	/// `V`, oldest first (the detector stops at the first match).
	pub async fn duplicate_candidates(&self, vacancy: &Vacancy) -> PipelineResult<Vec<Vacancy>> {
		let window_start = vacancy.created_at - chrono::Duration::hours(2);

		let rows = sqlx::query_as::<_, VacancyRow>(
			"SELECT * FROM vacancies
			 WHERE specialist_type = $1
			   AND grade = $2
			   AND duplicate_check_success = true
			   AND original_vacancy_id IS NULL
			   AND created_at >= $3
			   AND created_at < $4
			   AND id != $5
			 ORDER BY created_at ASC, id ASC",
		)
		.bind(vacancy.specialist_type.as_str())
		.bind(vacancy.grade.as_str())
		.bind(window_start)
		.bind(vacancy.created_at)
		.bind(vacancy.id)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| storage_error("duplicate_candidates", e))?;

		rows.into_iter().map(Vacancy::try_from).collect()
	}

	/// Resolves `vacancy_id`'s duplicate check (spec.md §4.9): sets
	/// `duplicate_checked_at`/`duplicate_check_success`, and
	/// `original_vacancy_id` when a match was found. Locks the row so a
	/// concurrent resolution (there should be none, since claim and resolve
	/// run in the same tick, but workers may be scaled out) can't race.
	pub async fn resolve_duplicate_check(&self, vacancy_id: Uuid, success: bool, original_vacancy_id: Option<Uuid>) -> PipelineResult<()> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("resolve_duplicate_check begin", e))?;

		sqlx::query("SELECT id FROM vacancies WHERE id = $1 FOR UPDATE").bind(vacancy_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("resolve_duplicate_check lock", e))?;

		sqlx::query("UPDATE vacancies SET duplicate_checked_at = now(), duplicate_check_success = $1, original_vacancy_id = $2 WHERE id = $3")
			.bind(success)
			.bind(original_vacancy_id)
			.bind(vacancy_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("resolve_duplicate_check update", e))?;

		tx.commit().await.map_err(|e| storage_error("resolve_duplicate_check commit", e))?;
		Ok(())
	}

	pub async fn append_duplicate_log(&self, vacancy_id: Uuid, candidate_vacancy_id: Option<Uuid>, data: serde_json::Value) -> PipelineResult<()> {
		sqlx::query("INSERT INTO duplicate_logs (id, vacancy_id, candidate_vacancy_id, data, created_at) VALUES ($1, $2, $3, $4, now())")
			.bind(Uuid::new_v4())
			.bind(vacancy_id)
			.bind(candidate_vacancy_id)
			.bind(data)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("append_duplicate_log", e))?;
		Ok(())
	}

	/// Batch claim for `Match` (spec.md §4.10): canonical vacancies that
	/// passed their duplicate check and have not yet been matched.
	pub async fn claim_for_matching(&self, limit: i64) -> PipelineResult<Vec<Vacancy>> {
		let rows = sqlx::query_as::<_, VacancyRow>(
			"SELECT * FROM vacancies
			 WHERE duplicate_check_success = true
			   AND processed_at IS NULL
			   AND original_vacancy_id IS NULL
			 ORDER BY created_at ASC, id ASC
			 LIMIT $1",
		)
		.bind(limit)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| storage_error("claim_for_matching", e))?;

		rows.into_iter().map(Vacancy::try_from).collect()
	}

	pub async fn active_resumes(&self) -> PipelineResult<Vec<Resume>> {
		let rows = sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE is_active = true ORDER BY created_at ASC, id ASC").fetch_all(&self.pool).await.map_err(|e| storage_error("active_resumes", e))?;

		rows.into_iter().map(Resume::try_from).collect()
	}

	pub async fn match_exists(&self, vacancy_id: Uuid, resume_id: Uuid) -> PipelineResult<bool> {
		let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM matches WHERE vacancy_id = $1 AND resume_id = $2")
			.bind(vacancy_id)
			.bind(resume_id)
			.fetch_one(&self.pool)
			.await
			.map_err(|e| storage_error("match_exists", e))?;

		Ok(count > 0)
	}

	/// Persists a (vacancy, resume) match (spec.md §4.10). Relies on the
	/// `(vacancy_id, resume_id)` unique constraint rather than a row lock:
	/// `match_exists` plus this insert run from a single-vacancy worker
	/// task, and concurrent duplicate inserts are rejected by the database
	/// rather than silently racing.
	pub async fn create_match(&self, vacancy_id: Uuid, resume_id: Uuid, score: u8, is_recommended: bool, comments: &[MatchComment]) -> PipelineResult<VacancyResumeMatch> {
		let id = Uuid::new_v4();
		let created_at = Utc::now();

		sqlx::query("INSERT INTO matches (id, vacancy_id, resume_id, score, is_recommended, comments, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
			.bind(id)
			.bind(vacancy_id)
			.bind(resume_id)
			.bind(i16::from(score))
			.bind(is_recommended)
			.bind(serde_json::to_value(comments)?)
			.bind(created_at)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("create_match", e))?;

		Ok(VacancyResumeMatch { id, vacancy_id, resume_id, score, is_recommended, comments: comments.to_vec(), created_at })
	}

	pub async fn mark_processed(&self, vacancy_id: Uuid) -> PipelineResult<()> {
		sqlx::query("UPDATE vacancies SET processed_at = now() WHERE id = $1").bind(vacancy_id).execute(&self.pool).await.map_err(|e| storage_error("mark_processed", e))?;
		Ok(())
	}

	pub async fn append_match_log(&self, vacancy_id: Uuid, resume_id: Option<Uuid>, data: serde_json::Value) -> PipelineResult<()> {
		sqlx::query("INSERT INTO match_logs (id, vacancy_id, resume_id, data, created_at) VALUES ($1, $2, $3, $4, now())")
			.bind(Uuid::new_v4())
			.bind(vacancy_id)
			.bind(resume_id)
			.bind(data)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("append_match_log", e))?;
		Ok(())
	}

	pub async fn matches_for_vacancy(&self, vacancy_id: Uuid) -> PipelineResult<Vec<VacancyResumeMatch>> {
		let rows = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE vacancy_id = $1 ORDER BY created_at ASC, id ASC")
			.bind(vacancy_id)
			.fetch_all(&self.pool)
			.await
			.map_err(|e| storage_error("matches_for_vacancy", e))?;

		rows.into_iter().map(VacancyResumeMatch::try_from).collect()
	}
}
