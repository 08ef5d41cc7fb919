use std::sync::Arc;

use pipeline_providers::{Aligner, Asr, LanguageModel, Notifier, ObjectStore, Splitter};
use pipeline_store::{TaskStore, VacancyStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assemble::AssembleWorker;
use crate::config::WorkerConfig;
use crate::duplicate::DuplicateWorker;
use crate::match_worker::MatchWorker;
use crate::split::SplitWorkers;
use crate::subtitles::SubtitlesWorkers;
use crate::transcript::TranscriptWorkers;

/// Provider handles shared across every worker, grounded in the teacher's
/// habit (`apps/orchestrator`) of passing one bundle of dependencies down
/// into each managed task rather than threading individual clients through.
pub struct Providers {
	pub object_store: Arc<dyn ObjectStore>,
	pub splitter: Arc<dyn Splitter>,
	pub asr: Arc<dyn Asr>,
	pub aligner: Arc<dyn Aligner>,
	pub language_model: Arc<dyn LanguageModel>,
	pub notifier: Arc<dyn Notifier>,
}

/// Starts every worker loop as its own task and tears them all down on one
/// shutdown signal, grounded in `ManagedOrchestrator`/`OrchestratorService`'s
/// `CancellationToken` + join-handle bookkeeping (spec.md §5 "a process-wide
/// shutdown signal flips a flag; workers exit after their current tick").
pub struct Supervisor {
	cancel: CancellationToken,
	handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
	#[must_use]
	pub fn start(task_store: Arc<TaskStore>, vacancy_store: Arc<VacancyStore>, providers: Providers, config: WorkerConfig) -> Self {
		let cancel = CancellationToken::new();
		let mut handles = Vec::new();

		let split = Arc::new(SplitWorkers::new(Arc::clone(&task_store), Arc::clone(&providers.object_store), Arc::clone(&providers.splitter), Arc::clone(&providers.notifier), config.clone()));
		handles.push(spawn_loop(&cancel, {
			let split = Arc::clone(&split);
			move |c| async move { split.run_init(c).await }
		}));
		handles.push(spawn_loop(&cancel, {
			let split = Arc::clone(&split);
			move |c| async move { split.run_submit(c).await }
		}));
		handles.push(spawn_loop(&cancel, {
			let split = Arc::clone(&split);
			move |c| async move { split.run_poll(c).await }
		}));

		let transcript = Arc::new(TranscriptWorkers::new(Arc::clone(&task_store), Arc::clone(&providers.object_store), Arc::clone(&providers.asr), Arc::clone(&providers.notifier), config.clone()));
		handles.push(spawn_loop(&cancel, {
			let transcript = Arc::clone(&transcript);
			move |c| async move { transcript.run_init(c).await }
		}));
		handles.push(spawn_loop(&cancel, {
			let transcript = Arc::clone(&transcript);
			move |c| async move { transcript.run_submit(c).await }
		}));
		handles.push(spawn_loop(&cancel, {
			let transcript = Arc::clone(&transcript);
			move |c| async move { transcript.run_poll(c).await }
		}));

		let subtitles = Arc::new(SubtitlesWorkers::new(Arc::clone(&task_store), Arc::clone(&providers.aligner), Arc::clone(&providers.notifier), config.clone()));
		handles.push(spawn_loop(&cancel, {
			let subtitles = Arc::clone(&subtitles);
			move |c| async move { subtitles.run_init(c).await }
		}));
		handles.push(spawn_loop(&cancel, {
			let subtitles = Arc::clone(&subtitles);
			move |c| async move { subtitles.run_fetch(c).await }
		}));

		let assemble = Arc::new(AssembleWorker::new(Arc::clone(&task_store), config.clone()));
		handles.push(spawn_loop(&cancel, {
			let assemble = Arc::clone(&assemble);
			move |c| async move { assemble.run(c).await }
		}));

		let duplicate = Arc::new(DuplicateWorker::new(Arc::clone(&vacancy_store), Arc::clone(&providers.language_model), config.clone()));
		handles.push(spawn_loop(&cancel, {
			let duplicate = Arc::clone(&duplicate);
			move |c| async move { duplicate.run(c).await }
		}));

		let matcher = Arc::new(MatchWorker::new(Arc::clone(&vacancy_store), Arc::clone(&providers.language_model), Arc::clone(&providers.notifier), config));
		handles.push(spawn_loop(&cancel, {
			let matcher = Arc::clone(&matcher);
			move |c| async move { matcher.run(c).await }
		}));

		info!(workers = handles.len(), "pipeline worker fleet started");
		Self { cancel, handles }
	}

	/// Signals every worker to stop after its current tick and waits for
	/// them to drain (spec.md §5: "in-flight external calls are not
	/// interrupted, so shutdown may take up to one timeout to drain").
	pub async fn shutdown(self) {
		self.cancel.cancel();
		for handle in self.handles {
			let _ = handle.await;
		}
		info!("pipeline worker fleet stopped");
	}
}

fn spawn_loop<F, Fut>(parent: &CancellationToken, make_fut: F) -> JoinHandle<()>
where
	F: FnOnce(CancellationToken) -> Fut + Send + 'static,
	Fut: std::future::Future<Output = ()> + Send + 'static,
{
	let child = parent.child_token();
	tokio::spawn(make_fut(child))
}
