use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Status of a karaoke `Task`, driven through the chain described in
/// SPEC_FULL §4.1. Stored as a lowercase string column so the wire format
/// matches what the original system persisted (SPEC_FULL §9, "enum stored
/// as lowercase strings").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
	Created,
	InSplitProcess,
	SplitCompleted,
	InTranscriptProcess,
	TranscriptCompleted,
	InSubtitlesProcess,
	SubtitlesCompleted,
	Completed,
	Failed,
}

impl TaskStatus {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::InSplitProcess => "in_split_process",
			Self::SplitCompleted => "split_completed",
			Self::InTranscriptProcess => "in_transcript_process",
			Self::TranscriptCompleted => "transcript_completed",
			Self::InSubtitlesProcess => "in_subtitles_process",
			Self::SubtitlesCompleted => "subtitles_completed",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	/// `true` once a task can no longer transition (spec.md §3: "FAILED is
	/// terminal"; COMPLETED is the other terminal state).
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}
}

impl std::str::FromStr for TaskStatus {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"created" => Ok(Self::Created),
			"in_split_process" => Ok(Self::InSplitProcess),
			"split_completed" => Ok(Self::SplitCompleted),
			"in_transcript_process" => Ok(Self::InTranscriptProcess),
			"transcript_completed" => Ok(Self::TranscriptCompleted),
			"in_subtitles_process" => Ok(Self::InSubtitlesProcess),
			"subtitles_completed" => Ok(Self::SubtitlesCompleted),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			other => Err(PipelineError::validation(format!("unknown task status: {other}"))),
		}
	}
}

impl std::fmt::Display for TaskStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One karaoke-creation job (spec.md §3 "Task").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
	pub id: Uuid,
	pub base_track_key: String,
	pub lang_code: String,
	pub status: TaskStatus,
	pub vocal_key: Option<String>,
	pub instrumental_key: Option<String>,
	pub words: Option<Vec<crate::transcript::Word>>,
	pub subtitles: Option<Vec<crate::transcript::SubtitleCue>>,
	pub result_track_id: Option<Uuid>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Task {
	#[must_use]
	pub fn new(base_track_key: impl Into<String>, lang_code: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			base_track_key: base_track_key.into(),
			lang_code: lang_code.into(),
			status: TaskStatus::Created,
			vocal_key: None,
			instrumental_key: None,
			words: None,
			subtitles: None,
			result_track_id: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Kind of `Step` a karaoke task can have at most one non-terminal instance
/// of per kind (spec.md §3 "Step" invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	Split,
	Transcript,
	Subtitles,
}

impl StepKind {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Split => "split",
			Self::Transcript => "transcript",
			Self::Subtitles => "subtitles",
		}
	}
}

impl std::str::FromStr for StepKind {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"split" => Ok(Self::Split),
			"transcript" => Ok(Self::Transcript),
			"subtitles" => Ok(Self::Subtitles),
			other => Err(PipelineError::validation(format!("unknown step kind: {other}"))),
		}
	}
}

/// Status of a `Step` (spec.md §3 "Step").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
	Init,
	InProcess,
	Completed,
	Failed,
	FinalFailed,
}

impl StepStatus {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Init => "init",
			Self::InProcess => "in_process",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::FinalFailed => "final_failed",
		}
	}

	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::FinalFailed)
	}
}

impl std::str::FromStr for StepStatus {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"init" => Ok(Self::Init),
			"in_process" => Ok(Self::InProcess),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			"final_failed" => Ok(Self::FinalFailed),
			other => Err(PipelineError::validation(format!("unknown step status: {other}"))),
		}
	}
}

/// Default attempt cap before a `Step` transitions to `FinalFailed` (spec.md
/// §3, §6 "MAX_ATTEMPTS").
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// One attempt-bearing unit of work belonging to a `Task` (spec.md §3
/// "Step").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
	pub id: Uuid,
	pub task_id: Uuid,
	pub kind: StepKind,
	pub status: StepStatus,
	pub attempts: i32,
	pub payload: serde_json::Value,
	pub processed_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Step {
	#[must_use]
	pub fn new(task_id: Uuid, kind: StepKind) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			task_id,
			kind,
			status: StepStatus::Init,
			attempts: 0,
			payload: serde_json::json!({}),
			processed_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// `true` once `attempts` has reached the cap, i.e. the next failure
	/// must be a final one (spec.md §4.8, §8 boundary behavior).
	#[must_use]
	pub fn at_attempt_cap(&self, max_attempts: i32) -> bool {
		self.attempts >= max_attempts
	}
}

/// Tag on a `task_logs` entry identifying which transition wrote it, mirroring
/// the original system's step-log taxonomy (SPEC_FULL §3). Optional on the
/// row: a log entry with no tag is still valid, just less queryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLogStep {
	SplitStart,
	SplitSuccess,
	SplitError,
	TranscriptStart,
	TranscriptSuccess,
	TranscriptError,
	SubtitlesStart,
	SubtitlesSuccess,
	SubtitlesError,
	AssembleSuccess,
	AssembleError,
}

impl TaskLogStep {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::SplitStart => "split_start",
			Self::SplitSuccess => "split_success",
			Self::SplitError => "split_error",
			Self::TranscriptStart => "transcript_start",
			Self::TranscriptSuccess => "transcript_success",
			Self::TranscriptError => "transcript_error",
			Self::SubtitlesStart => "subtitles_start",
			Self::SubtitlesSuccess => "subtitles_success",
			Self::SubtitlesError => "subtitles_error",
			Self::AssembleSuccess => "assemble_success",
			Self::AssembleError => "assemble_error",
		}
	}

	/// The `_error` tag that corresponds to a given step kind's failure path.
	#[must_use]
	pub const fn error_for(kind: StepKind) -> Self {
		match kind {
			StepKind::Split => Self::SplitError,
			StepKind::Transcript => Self::TranscriptError,
			StepKind::Subtitles => Self::SubtitlesError,
		}
	}
}

/// The finished karaoke artifact (spec.md §3 "Track").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
	pub id: Uuid,
	pub base_track_key: String,
	pub vocal_key: String,
	pub instrumental_key: String,
	pub lang_code: String,
	pub lines: Vec<crate::transcript::TranscriptLine>,
	pub created_at: DateTime<Utc>,
}
