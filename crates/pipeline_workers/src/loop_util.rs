use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::metrics::{TICKS_TOTAL, TICK_DURATION};

/// Shared tick/sleep/shutdown loop (spec.md §4.2 step 4, §5 "workers observe
/// a shutdown signal between ticks and mid-sleep"), grounded in the
/// teacher's `Worker::run` loop shape. A batch-query failure is logged and
/// the worker sleeps its normal interval rather than tearing down (spec.md
/// §7 "per-batch errors... logged and the worker sleeps the normal
/// interval before retrying").
pub async fn run_ticking<F, Fut>(worker_name: &'static str, cancel: &CancellationToken, interval: Duration, mut tick: F)
where
	F: FnMut() -> Fut,
	Fut: Future<Output = pipeline_core::PipelineResult<()>>,
{
	loop {
		if cancel.is_cancelled() {
			break;
		}

		let start = Instant::now();
		if let Err(err) = tick().await {
			error!(worker = worker_name, ?err, "worker tick failed");
		}
		TICK_DURATION.with_label_values(&[worker_name]).observe(start.elapsed().as_secs_f64());
		TICKS_TOTAL.with_label_values(&[worker_name]).inc();

		tokio::select! {
			() = cancel.cancelled() => break,
			() = tokio::time::sleep(interval) => {}
		}
	}
}
