use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use pipeline_core::{PipelineError, PipelineResult};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

/// Result of asking a splitter provider to separate a track into vocal and
/// instrumental stems, addressed by object-store key rather than by URL
/// (spec.md §4.1 keeps everything keyed against the `ObjectStore`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
	pub vocal_key: String,
	pub instrumental_key: String,
}

/// Stem a `StartSplit` call isolates (spec.md §4.1 `StartSplit(file_id,
/// stem=VOCALS)`). The karaoke pipeline only ever asks for `Vocals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stem {
	Vocals,
}

impl Stem {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Vocals => "vocals",
		}
	}
}

/// Outcome of `Splitter::check` (spec.md §4.1 `Check(file_id)` and §4.3
/// `PollSplit`'s PROGRESS/SUCCESS/ERROR states).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitCheck {
	Progress,
	Success(SplitResult),
}

/// Vocal/instrumental separation provider (spec.md §4.1/§4.3), grounded in
/// `ILalalClient`. Three phases mirror `SubmitSplit`/`PollSplit` exactly:
/// `upload` stages the source bytes and returns a `file_id`; `start_split`
/// kicks off separation against that `file_id` and returns a provider job id;
/// `check` polls the job by `file_id`. `check` returning
/// `Err(PipelineError::not_ready())` means "ask again later" rather than a
/// failure.
#[async_trait]
pub trait Splitter: Send + Sync {
	async fn upload(&self, bytes: Vec<u8>, name: &str) -> PipelineResult<String>;
	async fn start_split(&self, file_id: &str, stem: Stem) -> PipelineResult<String>;
	async fn check(&self, file_id: &str) -> PipelineResult<SplitCheck>;
}

#[derive(Debug, Deserialize)]
struct LalalUploadResponse {
	id: String,
}

#[derive(Debug, Deserialize)]
struct LalalSplitResponse {
	task_id: String,
}

#[derive(Debug, Deserialize)]
struct LalalStatusResponse {
	status: String,
	vocal_url: Option<String>,
	instrumental_url: Option<String>,
	error: Option<String>,
}

/// Client for the lalal.ai vocal/instrumental separation API, grounded in
/// `LalalClient`. Upload, split-start, and status-check are three distinct
/// HTTP calls rather than one `separate_track` that blocks for the result,
/// matching the worker's upload/start/check step shape.
pub struct LalalSplitter {
	http: Client,
	api_key: String,
	base_url: String,
}

impl LalalSplitter {
	#[must_use]
	pub fn new(http: Client, api_key: String, base_url: String) -> Self {
		Self { http, api_key, base_url }
	}
}

#[async_trait]
impl Splitter for LalalSplitter {
	async fn upload(&self, bytes: Vec<u8>, name: &str) -> PipelineResult<String> {
		let response = self
			.http
			.post(format!("{}/upload/", self.base_url.trim_end_matches('/')))
			.bearer_auth(&self.api_key)
			.header("Content-Disposition", format!("attachment; filename=\"{name}\""))
			.body(bytes)
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("lalal upload failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("lalal upload returned {}", response.status()), None));
		}

		let body: LalalUploadResponse = response.json().await.map_err(|e| PipelineError::provider(format!("lalal upload body invalid: {e}"), None))?;
		Ok(body.id)
	}

	async fn start_split(&self, file_id: &str, stem: Stem) -> PipelineResult<String> {
		let response = self
			.http
			.post(format!("{}/split/", self.base_url.trim_end_matches('/')))
			.bearer_auth(&self.api_key)
			.form(&[("id", file_id), ("stem", stem.as_str())])
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("lalal start_split failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("lalal start_split returned {}", response.status()), None));
		}

		let body: LalalSplitResponse = response.json().await.map_err(|e| PipelineError::provider(format!("lalal start_split body invalid: {e}"), None))?;
		Ok(body.task_id)
	}

	async fn check(&self, file_id: &str) -> PipelineResult<SplitCheck> {
		let response = self
			.http
			.get(format!("{}/check/", self.base_url.trim_end_matches('/')))
			.bearer_auth(&self.api_key)
			.query(&[("id", file_id)])
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("lalal check failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("lalal check returned {}", response.status()), None));
		}

		let body: LalalStatusResponse = response.json().await.map_err(|e| PipelineError::provider(format!("lalal check body invalid: {e}"), None))?;

		match body.status.as_str() {
			"success" => {
				let vocal_key = body.vocal_url.ok_or_else(|| PipelineError::provider("lalal success without vocal_url".to_string(), None))?;
				let instrumental_key = body.instrumental_url.ok_or_else(|| PipelineError::provider("lalal success without instrumental_url".to_string(), None))?;
				Ok(SplitCheck::Success(SplitResult { vocal_key, instrumental_key }))
			}
			"processing" | "queued" => Ok(SplitCheck::Progress),
			_ => Err(PipelineError::terminal_provider(body.error.unwrap_or_else(|| "lalal split failed".to_string()), None)),
		}
	}
}

/// Scripted splitter used by worker tests, grounded in the teacher's
/// `redis_queue` test doubles. Keyed by `file_id`, the same handle `check`
/// is called with.
#[derive(Default)]
pub struct MockSplitter {
	files: Mutex<HashMap<String, SplitterOutcome>>,
}

enum SplitterOutcome {
	NotReady,
	Success(SplitResult),
	Terminal(String),
}

impl MockSplitter {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn queue_success(&self, file_id: &str, result: SplitResult) {
		self.files.lock().expect("mock splitter mutex poisoned").insert(file_id.to_string(), SplitterOutcome::Success(result));
	}

	pub fn queue_not_ready(&self, file_id: &str) {
		self.files.lock().expect("mock splitter mutex poisoned").insert(file_id.to_string(), SplitterOutcome::NotReady);
	}

	pub fn queue_terminal_failure(&self, file_id: &str, message: &str) {
		self.files.lock().expect("mock splitter mutex poisoned").insert(file_id.to_string(), SplitterOutcome::Terminal(message.to_string()));
	}
}

#[async_trait]
impl Splitter for MockSplitter {
	async fn upload(&self, _bytes: Vec<u8>, _name: &str) -> PipelineResult<String> {
		Ok(Uuid::new_v4().to_string())
	}

	async fn start_split(&self, file_id: &str, _stem: Stem) -> PipelineResult<String> {
		Ok(format!("task-{file_id}"))
	}

	async fn check(&self, file_id: &str) -> PipelineResult<SplitCheck> {
		match self.files.lock().expect("mock splitter mutex poisoned").get(file_id) {
			Some(SplitterOutcome::Success(result)) => Ok(SplitCheck::Success(result.clone())),
			Some(SplitterOutcome::NotReady) | None => Ok(SplitCheck::Progress),
			Some(SplitterOutcome::Terminal(message)) => Err(PipelineError::terminal_provider(message.clone(), None)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unscheduled_job_is_not_ready() {
		let splitter = MockSplitter::new();
		let file_id = splitter.upload(b"bytes".to_vec(), "a.mp3").await.unwrap();
		splitter.start_split(&file_id, Stem::Vocals).await.unwrap();
		assert_eq!(splitter.check(&file_id).await.unwrap(), SplitCheck::Progress);
	}

	#[tokio::test]
	async fn queued_success_is_returned() {
		let splitter = MockSplitter::new();
		let file_id = splitter.upload(b"bytes".to_vec(), "a.mp3").await.unwrap();
		splitter.start_split(&file_id, Stem::Vocals).await.unwrap();
		let result = SplitResult { vocal_key: "v".to_string(), instrumental_key: "i".to_string() };
		splitter.queue_success(&file_id, result.clone());
		assert_eq!(splitter.check(&file_id).await.unwrap(), SplitCheck::Success(result));
	}

	#[tokio::test]
	async fn terminal_failure_is_propagated() {
		let splitter = MockSplitter::new();
		let file_id = splitter.upload(b"bytes".to_vec(), "a.mp3").await.unwrap();
		splitter.start_split(&file_id, Stem::Vocals).await.unwrap();
		splitter.queue_terminal_failure(&file_id, "boom");
		let err = splitter.check(&file_id).await.unwrap_err();
		assert!(matches!(err.kind, pipeline_core::ErrorKind::TerminalProvider { .. }));
	}
}
