use std::str::FromStr;

use chrono::{DateTime, Utc};
use pipeline_core::{PipelineError, Step, StepKind, StepStatus, SubtitleCue, Task, TaskStatus, Track, TranscriptLine, Word};
use uuid::Uuid;

/// Plain column shape for the `tasks` table. `pipeline_core` carries no
/// `sqlx` dependency (SPEC_FULL §9 decision: domain types stay persistence
/// agnostic), so every enum and JSON column is round-tripped through this
/// row type instead of deriving `sqlx::FromRow` on `Task` directly.
#[derive(sqlx::FromRow)]
pub struct TaskRow {
	pub id: Uuid,
	pub base_track_key: String,
	pub lang_code: String,
	pub status: String,
	pub vocal_key: Option<String>,
	pub instrumental_key: Option<String>,
	pub words: Option<serde_json::Value>,
	pub subtitles: Option<serde_json::Value>,
	pub result_track_id: Option<Uuid>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
	type Error = PipelineError;

	fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
		let words = row.words.map(serde_json::from_value::<Vec<Word>>).transpose()?;
		let subtitles = row.subtitles.map(serde_json::from_value::<Vec<SubtitleCue>>).transpose()?;

		Ok(Self {
			id: row.id,
			base_track_key: row.base_track_key,
			lang_code: row.lang_code,
			status: TaskStatus::from_str(&row.status)?,
			vocal_key: row.vocal_key,
			instrumental_key: row.instrumental_key,
			words,
			subtitles,
			result_track_id: row.result_track_id,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(sqlx::FromRow)]
pub struct StepRow {
	pub id: Uuid,
	pub task_id: Uuid,
	pub kind: String,
	pub status: String,
	pub attempts: i32,
	pub payload: serde_json::Value,
	pub processed_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl TryFrom<StepRow> for Step {
	type Error = PipelineError;

	fn try_from(row: StepRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: row.id,
			task_id: row.task_id,
			kind: StepKind::from_str(&row.kind)?,
			status: StepStatus::from_str(&row.status)?,
			attempts: row.attempts,
			payload: row.payload,
			processed_at: row.processed_at,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(sqlx::FromRow)]
pub struct TrackRow {
	pub id: Uuid,
	pub base_track_key: String,
	pub vocal_key: String,
	pub instrumental_key: String,
	pub lang_code: String,
	pub lines: serde_json::Value,
	pub created_at: DateTime<Utc>,
}

impl TryFrom<TrackRow> for Track {
	type Error = PipelineError;

	fn try_from(row: TrackRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: row.id,
			base_track_key: row.base_track_key,
			vocal_key: row.vocal_key,
			instrumental_key: row.instrumental_key,
			lang_code: row.lang_code,
			lines: serde_json::from_value::<Vec<TranscriptLine>>(row.lines)?,
			created_at: row.created_at,
		})
	}
}
