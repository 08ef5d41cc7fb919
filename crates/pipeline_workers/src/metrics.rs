use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

/// Per-worker tick instrumentation, grounded in `file_host::metrics`'s
/// `lazy_static` + `register_*_vec!` pattern (swapped for `once_cell::Lazy`,
/// already a workspace dependency, to avoid adding `lazy_static` just for
/// this).
pub static TICKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| register_int_counter_vec!("pipeline_worker_ticks_total", "Worker ticks run", &["worker"]).expect("failed to register pipeline_worker_ticks_total"));

pub static ROWS_CLAIMED_TOTAL: Lazy<IntCounterVec> =
	Lazy::new(|| register_int_counter_vec!("pipeline_worker_rows_claimed_total", "Rows claimed for processing", &["worker"]).expect("failed to register pipeline_worker_rows_claimed_total"));

pub static ROWS_COMPLETED_TOTAL: Lazy<IntCounterVec> =
	Lazy::new(|| register_int_counter_vec!("pipeline_worker_rows_completed_total", "Rows that completed successfully", &["worker"]).expect("failed to register pipeline_worker_rows_completed_total"));

pub static ROWS_FAILED_TOTAL: Lazy<IntCounterVec> =
	Lazy::new(|| register_int_counter_vec!("pipeline_worker_rows_failed_total", "Rows that hit the retry or final-failure path", &["worker", "final"]).expect("failed to register pipeline_worker_rows_failed_total"));

pub static TICK_DURATION: Lazy<HistogramVec> =
	Lazy::new(|| register_histogram_vec!("pipeline_worker_tick_duration_seconds", "Wall time of one worker tick", &["worker"]).expect("failed to register pipeline_worker_tick_duration_seconds"));

/// `IntCounterVec::inc_by` wants a `u64`; batch sizes come back as `usize`.
#[must_use]
pub fn batch_len(n: usize) -> u64 {
	u64::try_from(n).unwrap_or(u64::MAX)
}
