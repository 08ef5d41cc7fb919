use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pipeline_core::{PipelineError, PipelineResult, Step, StepKind, StepStatus, Task, TaskLogStep, TaskStatus, Track, TranscriptLine};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::storage_error;
use crate::rows::{StepRow, TaskRow, TrackRow};

/// Durable persistence for the karaoke Task/Step/Track chain (spec.md §3,
/// §4.2), grounded in `MoodEventRepository`'s "one method per use-case,
/// transaction owned by the store" shape. Every method that mutates a row
/// the worker loop contract requires to be locked (§4.2 step 2) opens its
/// own transaction and issues `SELECT ... FOR UPDATE` before re-checking the
/// precondition, so a caller never has to manage transactions itself.
///
/// Query methods use `sqlx`'s runtime API (`sqlx::query`/`query_as`) rather
/// than the compile-time-checked `query!` macro the teacher repo favors:
/// `query!` needs a live database (or a committed `.sqlx` metadata cache) to
/// check against at build time, which this workspace cannot produce without
/// running the toolchain against a real Postgres instance.
pub struct TaskStore {
	pool: PgPool,
}

impl TaskStore {
	#[must_use]
	pub const fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn create_task(&self, task: &Task) -> PipelineResult<()> {
		sqlx::query(
			"INSERT INTO tasks (id, base_track_key, lang_code, status, vocal_key, instrumental_key, words, subtitles, result_track_id, created_at, updated_at)
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
		)
		.bind(task.id)
		.bind(&task.base_track_key)
		.bind(&task.lang_code)
		.bind(task.status.as_str())
		.bind(&task.vocal_key)
		.bind(&task.instrumental_key)
		.bind(task.words.as_ref().map(serde_json::to_value).transpose()?)
		.bind(task.subtitles.as_ref().map(serde_json::to_value).transpose()?)
		.bind(task.result_track_id)
		.bind(task.created_at)
		.bind(task.updated_at)
		.execute(&self.pool)
		.await
		.map_err(|e| storage_error("create_task", e))?;

		Ok(())
	}

	pub async fn get_task(&self, id: Uuid) -> PipelineResult<Option<Task>> {
		let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1").bind(id).fetch_optional(&self.pool).await.map_err(|e| storage_error("get_task", e))?;

		row.map(Task::try_from).transpose()
	}

	/// Claim query for an init worker (spec.md §4.2 step 1): no lock, just a
	/// deterministic ordering over tasks in `status` with no existing step of
	/// `kind`.
	pub async fn claim_tasks_for_init(&self, status: TaskStatus, kind: StepKind, limit: i64) -> PipelineResult<Vec<Task>> {
		let rows = sqlx::query_as::<_, TaskRow>(
			"SELECT t.* FROM tasks t
			 WHERE t.status = $1
			   AND NOT EXISTS (SELECT 1 FROM task_steps s WHERE s.task_id = t.id AND s.kind = $2)
			 ORDER BY t.created_at ASC, t.id ASC
			 LIMIT $3",
		)
		.bind(status.as_str())
		.bind(kind.as_str())
		.bind(limit)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| storage_error("claim_tasks_for_init", e))?;

		rows.into_iter().map(Task::try_from).collect()
	}

	/// Creates the INIT step for `kind` on `task_id` and advances the parent
	/// task to the in-process status for that phase, re-checking the
	/// precondition under lock (spec.md §4.3/§4.4/§4.5 "Init*" actions).
	/// Returns `None` if another worker already advanced the task.
	pub async fn init_step(&self, task_id: Uuid, kind: StepKind, precondition: TaskStatus, next_status: TaskStatus) -> PipelineResult<Option<Step>> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("init_step begin", e))?;

		let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
			.bind(task_id)
			.fetch_optional(&mut *tx)
			.await
			.map_err(|e| storage_error("init_step lock task", e))?;

		let Some(row) = row else { return Ok(None) };
		let task = Task::try_from(row)?;

		if task.status != precondition {
			return Ok(None);
		}

		let existing = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM task_steps WHERE task_id = $1 AND kind = $2")
			.bind(task_id)
			.bind(kind.as_str())
			.fetch_one(&mut *tx)
			.await
			.map_err(|e| storage_error("init_step check existing", e))?;

		if existing > 0 {
			return Ok(None);
		}

		let step = Step::new(task_id, kind);

		sqlx::query(
			"INSERT INTO task_steps (id, task_id, kind, status, attempts, payload, processed_at, created_at, updated_at)
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
		)
		.bind(step.id)
		.bind(step.task_id)
		.bind(step.kind.as_str())
		.bind(step.status.as_str())
		.bind(step.attempts)
		.bind(&step.payload)
		.bind(step.processed_at)
		.bind(step.created_at)
		.bind(step.updated_at)
		.execute(&mut *tx)
		.await
		.map_err(|e| storage_error("init_step insert", e))?;

		sqlx::query("UPDATE tasks SET status = $1, updated_at = now() WHERE id = $2").bind(next_status.as_str()).bind(task_id).execute(&mut *tx).await.map_err(|e| storage_error("init_step update task", e))?;

		tx.commit().await.map_err(|e| storage_error("init_step commit", e))?;
		Ok(Some(step))
	}

	/// Looks up the (at most one) Step of `kind` in `status` belonging to
	/// `task_id` (spec.md §4.5 InitSubtitles: "locate the COMPLETED
	/// TRANSCRIPT step on the task").
	pub async fn find_step(&self, task_id: Uuid, kind: StepKind, status: StepStatus) -> PipelineResult<Option<Step>> {
		let row = sqlx::query_as::<_, StepRow>("SELECT * FROM task_steps WHERE task_id = $1 AND kind = $2 AND status = $3 LIMIT 1")
			.bind(task_id)
			.bind(kind.as_str())
			.bind(status.as_str())
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| storage_error("find_step", e))?;

		row.map(Step::try_from).transpose()
	}

	/// Creates the SUBTITLES step pre-seeded with the transcript id copied
	/// from the completed TRANSCRIPT step (spec.md §4.5 InitSubtitles action:
	/// submit and poll are fused, so the new step starts with the payload key
	/// `FetchSubtitles` needs rather than an empty one).
	pub async fn init_subtitles_step(&self, task_id: Uuid, transcript_id: &str) -> PipelineResult<Option<Step>> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("init_subtitles_step begin", e))?;

		let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("init_subtitles_step lock task", e))?;

		let Some(row) = row else { return Ok(None) };
		let task = Task::try_from(row)?;

		if task.status != TaskStatus::TranscriptCompleted {
			return Ok(None);
		}

		let existing = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM task_steps WHERE task_id = $1 AND kind = $2")
			.bind(task_id)
			.bind(StepKind::Subtitles.as_str())
			.fetch_one(&mut *tx)
			.await
			.map_err(|e| storage_error("init_subtitles_step check existing", e))?;

		if existing > 0 {
			return Ok(None);
		}

		let mut step = Step::new(task_id, StepKind::Subtitles);
		step.payload = serde_json::json!({ "transcript_id": transcript_id });

		sqlx::query(
			"INSERT INTO task_steps (id, task_id, kind, status, attempts, payload, processed_at, created_at, updated_at)
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
		)
		.bind(step.id)
		.bind(step.task_id)
		.bind(step.kind.as_str())
		.bind(step.status.as_str())
		.bind(step.attempts)
		.bind(&step.payload)
		.bind(step.processed_at)
		.bind(step.created_at)
		.bind(step.updated_at)
		.execute(&mut *tx)
		.await
		.map_err(|e| storage_error("init_subtitles_step insert", e))?;

		sqlx::query("UPDATE tasks SET status = $1, updated_at = now() WHERE id = $2").bind(TaskStatus::InSubtitlesProcess.as_str()).bind(task_id).execute(&mut *tx).await.map_err(|e| storage_error("init_subtitles_step update task", e))?;

		tx.commit().await.map_err(|e| storage_error("init_subtitles_step commit", e))?;
		Ok(Some(step))
	}

	/// Claim query for submit/poll workers (spec.md §4.2 step 1): filters by
	/// kind, a set of eligible statuses, the attempt cap, and whether
	/// `payload_key` is present/absent. For poll workers `submitted_before`
	/// additionally enforces the `submitted_at < now - THRESHOLD` predicate.
	#[allow(clippy::too_many_arguments)]
	pub async fn claim_steps(
		&self,
		kind: StepKind,
		statuses: &[StepStatus],
		max_attempts: i32,
		require_payload_key: Option<&str>,
		lacks_payload_key: Option<&str>,
		submitted_before: Option<DateTime<Utc>>,
		limit: i64,
	) -> PipelineResult<Vec<Step>> {
		let status_values: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

		let rows = sqlx::query_as::<_, StepRow>(
			"SELECT * FROM task_steps
			 WHERE kind = $1
			   AND status = ANY($2)
			   AND attempts < $3
			   AND ($4::text IS NULL OR payload ? $4)
			   AND ($5::text IS NULL OR NOT (payload ? $5))
			   AND ($6::timestamptz IS NULL OR (payload->>'submitted_at')::timestamptz < $6)
			 ORDER BY created_at ASC, id ASC
			 LIMIT $7",
		)
		.bind(kind.as_str())
		.bind(&status_values)
		.bind(max_attempts)
		.bind(require_payload_key)
		.bind(lacks_payload_key)
		.bind(submitted_before)
		.bind(limit)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| storage_error("claim_steps", e))?;

		rows.into_iter().map(Step::try_from).collect()
	}

	/// Locks a step for per-row work (spec.md §4.2 step 2), re-checking it is
	/// still in one of `statuses` with `attempts < max_attempts`. Returns
	/// `None` if another worker already moved it on.
	async fn lock_step(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, step_id: Uuid, statuses: &[StepStatus], max_attempts: i32) -> PipelineResult<Option<Step>> {
		let row = sqlx::query_as::<_, StepRow>("SELECT * FROM task_steps WHERE id = $1 FOR UPDATE").bind(step_id).fetch_optional(&mut **tx).await.map_err(|e| storage_error("lock_step", e))?;

		let Some(row) = row else { return Ok(None) };
		let step = Step::try_from(row)?;

		if !statuses.contains(&step.status) || step.attempts >= max_attempts {
			return Ok(None);
		}

		Ok(Some(step))
	}

	/// Submits a step (spec.md §4.3/§4.4 "Submit*" actions): locks the step,
	/// re-checks eligibility, and if the caller's `submit` closure succeeds,
	/// merges `payload_patch` and moves the step to `IN_PROCESS`.
	pub async fn submit_step(&self, step_id: Uuid, eligible: &[StepStatus], max_attempts: i32, payload_patch: serde_json::Value) -> PipelineResult<Option<Step>> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("submit_step begin", e))?;

		let Some(step) = Self::lock_step(&mut tx, step_id, eligible, max_attempts).await? else {
			return Ok(None);
		};

		sqlx::query("UPDATE task_steps SET status = $1, payload = payload || $2, updated_at = now() WHERE id = $3")
			.bind(StepStatus::InProcess.as_str())
			.bind(&payload_patch)
			.bind(step_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("submit_step update", e))?;

		tx.commit().await.map_err(|e| storage_error("submit_step commit", e))?;

		Ok(Some(Step { status: StepStatus::InProcess, payload: merge_json(step.payload, payload_patch), ..step }))
	}

	/// Completes the SPLIT step (spec.md §4.3 `PollSplit` SUCCESS branch):
	/// persists the derived keys on the task, advances both the task and the
	/// step, under one lock on each row.
	pub async fn complete_split(&self, task_id: Uuid, step_id: Uuid, vocal_key: &str, instrumental_key: &str) -> PipelineResult<()> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("complete_split begin", e))?;

		sqlx::query("SELECT id FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("complete_split lock task", e))?;

		sqlx::query("UPDATE tasks SET vocal_key = $1, instrumental_key = $2, status = $3, updated_at = now() WHERE id = $4")
			.bind(vocal_key)
			.bind(instrumental_key)
			.bind(TaskStatus::SplitCompleted.as_str())
			.bind(task_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("complete_split update task", e))?;

		Self::complete_step(&mut tx, step_id).await?;

		tx.commit().await.map_err(|e| storage_error("complete_split commit", e))?;
		Ok(())
	}

	/// Completes the TRANSCRIPT step (spec.md §4.4 `PollTranscript` COMPLETED
	/// branch).
	pub async fn complete_transcript(&self, task_id: Uuid, step_id: Uuid, words: &[pipeline_core::Word]) -> PipelineResult<()> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("complete_transcript begin", e))?;

		sqlx::query("SELECT id FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("complete_transcript lock task", e))?;

		sqlx::query("UPDATE tasks SET words = $1, status = $2, updated_at = now() WHERE id = $3")
			.bind(serde_json::to_value(words)?)
			.bind(TaskStatus::TranscriptCompleted.as_str())
			.bind(task_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("complete_transcript update task", e))?;

		Self::complete_step(&mut tx, step_id).await?;

		tx.commit().await.map_err(|e| storage_error("complete_transcript commit", e))?;
		Ok(())
	}

	/// Completes the SUBTITLES step (spec.md §4.5 `FetchSubtitles` action).
	pub async fn complete_subtitles(&self, task_id: Uuid, step_id: Uuid, subtitles: &[pipeline_core::SubtitleCue]) -> PipelineResult<()> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("complete_subtitles begin", e))?;

		sqlx::query("SELECT id FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("complete_subtitles lock task", e))?;

		sqlx::query("UPDATE tasks SET subtitles = $1, status = $2, updated_at = now() WHERE id = $3")
			.bind(serde_json::to_value(subtitles)?)
			.bind(TaskStatus::SubtitlesCompleted.as_str())
			.bind(task_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("complete_subtitles update task", e))?;

		Self::complete_step(&mut tx, step_id).await?;

		tx.commit().await.map_err(|e| storage_error("complete_subtitles commit", e))?;
		Ok(())
	}

	async fn complete_step(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, step_id: Uuid) -> PipelineResult<()> {
		sqlx::query("UPDATE task_steps SET status = $1, processed_at = now(), updated_at = now() WHERE id = $2")
			.bind(StepStatus::Completed.as_str())
			.bind(step_id)
			.execute(&mut **tx)
			.await
			.map_err(|e| storage_error("complete_step", e))?;
		Ok(())
	}

	/// Tasks ready for `Assemble` (spec.md §4.6): `SUBTITLES_COMPLETED` with
	/// no track yet.
	pub async fn claim_tasks_for_assemble(&self, limit: i64) -> PipelineResult<Vec<Task>> {
		let rows = sqlx::query_as::<_, TaskRow>(
			"SELECT * FROM tasks WHERE status = $1 AND result_track_id IS NULL ORDER BY created_at ASC, id ASC LIMIT $2",
		)
		.bind(TaskStatus::SubtitlesCompleted.as_str())
		.bind(limit)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| storage_error("claim_tasks_for_assemble", e))?;

		rows.into_iter().map(Task::try_from).collect()
	}

	/// Creates the final `Track` and completes the task (spec.md §4.6
	/// `Assemble` action).
	pub async fn assemble_track(&self, task_id: Uuid, lines: Vec<TranscriptLine>) -> PipelineResult<Option<Track>> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("assemble_track begin", e))?;

		let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("assemble_track lock task", e))?;

		let Some(row) = row else { return Ok(None) };
		let task = Task::try_from(row)?;

		if task.status != TaskStatus::SubtitlesCompleted || task.result_track_id.is_some() {
			return Ok(None);
		}

		let (Some(vocal_key), Some(instrumental_key)) = (task.vocal_key.clone(), task.instrumental_key.clone()) else {
			return Err(PipelineError::storage(format!("task {task_id} reached SUBTITLES_COMPLETED without split keys")));
		};

		let track = Track { id: Uuid::new_v4(), base_track_key: task.base_track_key.clone(), vocal_key, instrumental_key, lang_code: task.lang_code.clone(), lines, created_at: Utc::now() };

		sqlx::query("INSERT INTO tracks (id, base_track_key, vocal_key, instrumental_key, lang_code, lines, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
			.bind(track.id)
			.bind(&track.base_track_key)
			.bind(&track.vocal_key)
			.bind(&track.instrumental_key)
			.bind(&track.lang_code)
			.bind(serde_json::to_value(&track.lines)?)
			.bind(track.created_at)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("assemble_track insert", e))?;

		sqlx::query("UPDATE tasks SET result_track_id = $1, status = $2, updated_at = now() WHERE id = $3")
			.bind(track.id)
			.bind(TaskStatus::Completed.as_str())
			.bind(task_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("assemble_track update task", e))?;

		tx.commit().await.map_err(|e| storage_error("assemble_track commit", e))?;
		Ok(Some(track))
	}

	/// Applies the retry policy (spec.md §4.8) under lock: increments
	/// `attempts`; if the cap is reached the step becomes `FINAL_FAILED` and
	/// the parent task `FAILED`, otherwise the step becomes `FAILED` for
	/// re-pickup. Always appends a `task_logs` row. Returns whether this
	/// failure was final, so the caller knows whether to notify.
	pub async fn fail_step(&self, task_id: Uuid, step_id: Uuid, max_attempts: i32, step_kind: StepKind, error: &PipelineError) -> PipelineResult<bool> {
		let mut tx = self.pool.begin().await.map_err(|e| storage_error("fail_step begin", e))?;

		let row = sqlx::query_as::<_, StepRow>("SELECT * FROM task_steps WHERE id = $1 FOR UPDATE").bind(step_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("fail_step lock step", e))?;

		let Some(row) = row else { return Ok(false) };
		let step = Step::try_from(row)?;
		let attempts = step.attempts + 1;
		let is_final = attempts >= max_attempts;

		sqlx::query("UPDATE task_steps SET status = $1, attempts = $2, updated_at = now() WHERE id = $3")
			.bind(if is_final { StepStatus::FinalFailed } else { StepStatus::Failed }.as_str())
			.bind(attempts)
			.bind(step_id)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("fail_step update step", e))?;

		if is_final {
			sqlx::query("SELECT id FROM tasks WHERE id = $1 FOR UPDATE").bind(task_id).fetch_optional(&mut *tx).await.map_err(|e| storage_error("fail_step lock task", e))?;
			sqlx::query("UPDATE tasks SET status = $1, updated_at = now() WHERE id = $2").bind(TaskStatus::Failed.as_str()).bind(task_id).execute(&mut *tx).await.map_err(|e| storage_error("fail_step update task", e))?;
		}

		let log_data = serde_json::json!({
			"error_kind": format!("{:?}", error.kind),
			"message": error.message(),
			"context": error.context(),
			"attempts": attempts,
			"final": is_final,
		});

		sqlx::query("INSERT INTO task_logs (id, task_id, step_id, step, data, created_at) VALUES ($1, $2, $3, $4, $5, now())")
			.bind(Uuid::new_v4())
			.bind(task_id)
			.bind(step_id)
			.bind(TaskLogStep::error_for(step_kind).as_str())
			.bind(log_data)
			.execute(&mut *tx)
			.await
			.map_err(|e| storage_error("fail_step log", e))?;

		tx.commit().await.map_err(|e| storage_error("fail_step commit", e))?;
		Ok(is_final)
	}

	/// Appends a success-path audit entry (spec.md §4.2 step 3, "optionally ...
	/// an audit StepLog entry"). `step` is the `TaskLogStep` tag identifying
	/// which transition wrote the row; `None` covers callers outside the
	/// karaoke Task/Step chain (e.g. vacancy duplicate/match logs, which use
	/// their own tables).
	pub async fn append_log(&self, task_id: Uuid, step_id: Option<Uuid>, step: Option<TaskLogStep>, data: serde_json::Value) -> PipelineResult<()> {
		sqlx::query("INSERT INTO task_logs (id, task_id, step_id, step, data, created_at) VALUES ($1, $2, $3, $4, $5, now())")
			.bind(Uuid::new_v4())
			.bind(task_id)
			.bind(step_id)
			.bind(step.map(TaskLogStep::as_str))
			.bind(data)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("append_log", e))?;
		Ok(())
	}
}

/// Shallow merge used to layer a step's payload patch over its prior
/// payload, mirroring the `payload || $patch` SQL merge above so the
/// in-memory `Step` returned to the caller matches what was committed
/// without a round-trip read.
fn merge_json(base: serde_json::Value, patch: serde_json::Value) -> serde_json::Value {
	let serde_json::Value::Object(mut base_map) = base else { return patch };
	let serde_json::Value::Object(patch_map) = patch else { return serde_json::Value::Object(base_map) };
	base_map.extend(patch_map);
	serde_json::Value::Object(base_map)
}

/// Default poll threshold helper (spec.md §4.3/§4.4: `submitted_at < now -
/// THRESHOLD`), kept here since every poll-claim call site needs the same
/// arithmetic.
#[must_use]
pub fn poll_cutoff(threshold_seconds: i64) -> DateTime<Utc> {
	Utc::now() - ChronoDuration::seconds(threshold_seconds)
}
