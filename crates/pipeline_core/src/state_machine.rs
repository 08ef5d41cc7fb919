use crate::task::{StepKind, StepStatus, TaskStatus};

/// The task status a `Task` must already be in for the init worker of a
/// given phase to be allowed to create its `Step` (spec.md §4.1).
#[must_use]
pub const fn precondition_for_init(kind: StepKind) -> TaskStatus {
	match kind {
		StepKind::Split => TaskStatus::Created,
		StepKind::Transcript => TaskStatus::SplitCompleted,
		StepKind::Subtitles => TaskStatus::TranscriptCompleted,
	}
}

/// The task status entered the moment an init worker creates the `Step`
/// for that phase (spec.md §4.1).
#[must_use]
pub const fn status_after_init(kind: StepKind) -> TaskStatus {
	match kind {
		StepKind::Split => TaskStatus::InSplitProcess,
		StepKind::Transcript => TaskStatus::InTranscriptProcess,
		StepKind::Subtitles => TaskStatus::InSubtitlesProcess,
	}
}

/// The task status entered once a phase's `Step` reaches `Completed` and
/// its artifact has been persisted (spec.md §4.1).
#[must_use]
pub const fn status_after_step_completed(kind: StepKind) -> TaskStatus {
	match kind {
		StepKind::Split => TaskStatus::SplitCompleted,
		StepKind::Transcript => TaskStatus::TranscriptCompleted,
		StepKind::Subtitles => TaskStatus::SubtitlesCompleted,
	}
}

/// `true` if a step in `status` with `attempts` hitting the cap on its next
/// failure must become `FinalFailed` rather than `Failed` (spec.md §4.8).
#[must_use]
pub fn is_final_failure(attempts_after_increment: i32, max_attempts: i32) -> bool {
	attempts_after_increment >= max_attempts
}

/// Validates the handful of cross-field invariants spec.md §3 and §8
/// require to hold for a `Task` at rest (used by tests and, defensively, by
/// the store layer after a write). Not an exhaustive validator — it only
/// checks what can be checked from the `Task` row alone.
#[must_use]
pub fn task_invariants_hold(task: &crate::task::Task) -> bool {
	let has_split_artifacts = task.vocal_key.is_some() && task.instrumental_key.is_some();
	let split_ok = has_split_artifacts
		|| !matches!(
			task.status,
			TaskStatus::SplitCompleted
				| TaskStatus::InTranscriptProcess
				| TaskStatus::TranscriptCompleted
				| TaskStatus::InSubtitlesProcess
				| TaskStatus::SubtitlesCompleted
				| TaskStatus::Completed
		);

	let words_ok = task.words.is_some()
		|| !matches!(task.status, TaskStatus::TranscriptCompleted | TaskStatus::InSubtitlesProcess | TaskStatus::SubtitlesCompleted | TaskStatus::Completed);

	let subtitles_ok = task.subtitles.is_some() || !matches!(task.status, TaskStatus::SubtitlesCompleted | TaskStatus::Completed);

	let track_ok = (task.status == TaskStatus::Completed) == task.result_track_id.is_some();

	split_ok && words_ok && subtitles_ok && track_ok
}

/// Whether a `Step` in `status` is eligible for the submit/poll/fetch
/// workers per spec.md §4.2's precondition shape: `{INIT, FAILED}` for
/// first submission, `{IN_PROCESS, FAILED}` for polling.
#[must_use]
pub const fn eligible_for_submit(status: StepStatus) -> bool {
	matches!(status, StepStatus::Init | StepStatus::Failed)
}

#[must_use]
pub const fn eligible_for_poll(status: StepStatus) -> bool {
	matches!(status, StepStatus::InProcess | StepStatus::Failed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::task::Task;

	#[test]
	fn fresh_task_satisfies_invariants() {
		let task = Task::new("jobs/t1/original.mp3", "en");
		assert!(task_invariants_hold(&task));
	}

	#[test]
	fn split_completed_without_keys_violates_invariant() {
		let mut task = Task::new("jobs/t1/original.mp3", "en");
		task.status = TaskStatus::SplitCompleted;
		assert!(!task_invariants_hold(&task));
	}

	#[test]
	fn completed_without_track_violates_invariant() {
		let mut task = Task::new("jobs/t1/original.mp3", "en");
		task.status = TaskStatus::Completed;
		assert!(!task_invariants_hold(&task));
	}

	#[test]
	fn attempt_cap_boundary() {
		assert!(!is_final_failure(4, 5));
		assert!(is_final_failure(5, 5));
	}
}
