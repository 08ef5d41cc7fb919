use std::time::Duration;

/// Tunables shared by every worker loop (spec.md §4.2/§4.3/§4.9: "typical
/// 10-30s" ticks, poll thresholds, batch sizes). Grounded in the teacher's
/// `task_queue::config::Config`, generalized from one worker's knobs to the
/// whole fleet's.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
	pub tick_interval: Duration,
	pub task_batch_size: i64,
	/// spec.md §4.9/§4.10: both vacancy workers cap their batch at 20.
	pub vacancy_batch_size: i64,
	pub max_attempts: i32,
	pub split_poll_threshold: Duration,
	pub transcript_poll_threshold: Duration,
	pub duplicate_threshold: u8,
	pub recommend_threshold: u8,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			tick_interval: Duration::from_secs(15),
			task_batch_size: 100,
			vacancy_batch_size: 20,
			max_attempts: pipeline_core::DEFAULT_MAX_ATTEMPTS,
			split_poll_threshold: Duration::from_secs(30),
			transcript_poll_threshold: Duration::from_secs(30),
			duplicate_threshold: 7,
			recommend_threshold: 7,
		}
	}
}
