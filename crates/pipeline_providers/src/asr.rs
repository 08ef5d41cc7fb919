use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use pipeline_core::{PipelineError, PipelineResult, Word};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

/// A submitted transcription job, grounded in `SubmitTranscriptResponseWithContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptJob {
	pub provider_job_id: String,
}

/// Word-level speech-to-text provider (spec.md §4.3/§4.4), grounded in
/// `IAssemblyAIClient`. Same submit/poll shape as `Splitter`. `task_id` is
/// forwarded to the provider as client-supplied correlation metadata (spec.md
/// §4.4 `ASR.Submit(audio_url, language_code, task_id)`), not used to address
/// the job itself.
#[async_trait]
pub trait Asr: Send + Sync {
	async fn submit(&self, audio_url: &str, lang_code: &str, task_id: Uuid) -> PipelineResult<TranscriptJob>;
	async fn poll(&self, job: &TranscriptJob) -> PipelineResult<Vec<Word>>;
}

#[derive(Debug, Deserialize)]
struct AssemblySubmitResponse {
	id: String,
}

#[derive(Debug, Deserialize)]
struct AssemblyWord {
	text: String,
	start: i64,
	end: i64,
	confidence: f32,
	speaker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssemblyPollResponse {
	status: String,
	words: Option<Vec<AssemblyWord>>,
	error: Option<String>,
}

/// AssemblyAI transcription client, grounded in `AssemblyAIClient`.
pub struct AssemblyAiAsr {
	http: Client,
	api_key: String,
	base_url: String,
}

impl AssemblyAiAsr {
	#[must_use]
	pub fn new(http: Client, api_key: String, base_url: String) -> Self {
		Self { http, api_key, base_url }
	}
}

#[async_trait]
impl Asr for AssemblyAiAsr {
	async fn submit(&self, audio_url: &str, lang_code: &str, task_id: Uuid) -> PipelineResult<TranscriptJob> {
		let response = self
			.http
			.post(format!("{}/v2/transcript", self.base_url.trim_end_matches('/')))
			.header("Authorization", &self.api_key)
			.json(&serde_json::json!({
				"audio_url": audio_url,
				"language_code": lang_code,
				"speaker_labels": true,
				"punctuate": true,
				"format_text": true,
				"webhook_auth_header_name": "X-Task-Id",
				"webhook_auth_header_value": task_id.to_string(),
			}))
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("assemblyai submit failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("assemblyai submit returned {}", response.status()), None));
		}

		let body: AssemblySubmitResponse = response.json().await.map_err(|e| PipelineError::provider(format!("assemblyai submit body invalid: {e}"), None))?;

		Ok(TranscriptJob { provider_job_id: body.id })
	}

	async fn poll(&self, job: &TranscriptJob) -> PipelineResult<Vec<Word>> {
		let response = self
			.http
			.get(format!("{}/v2/transcript/{}", self.base_url.trim_end_matches('/'), job.provider_job_id))
			.header("Authorization", &self.api_key)
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("assemblyai poll failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("assemblyai poll returned {}", response.status()), None));
		}

		let body: AssemblyPollResponse = response.json().await.map_err(|e| PipelineError::provider(format!("assemblyai poll body invalid: {e}"), None))?;

		match body.status.as_str() {
			"completed" => {
				let words = body.words.unwrap_or_default();
				Ok(words
					.into_iter()
					.map(|w| Word { text: w.text, start_ms: w.start, end_ms: w.end, confidence: w.confidence, speaker: w.speaker })
					.collect())
			}
			"queued" | "processing" => Err(PipelineError::not_ready()),
			_ => Err(PipelineError::terminal_provider(body.error.unwrap_or_else(|| "assemblyai transcription failed".to_string()), None)),
		}
	}
}

/// Scripted ASR provider used by worker tests.
#[derive(Default)]
pub struct MockAsr {
	jobs: Mutex<HashMap<String, AsrOutcome>>,
}

enum AsrOutcome {
	NotReady,
	Success(Vec<Word>),
	Terminal(String),
}

impl MockAsr {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn queue_success(&self, job_id: &str, words: Vec<Word>) {
		self.jobs.lock().expect("mock asr mutex poisoned").insert(job_id.to_string(), AsrOutcome::Success(words));
	}

	pub fn queue_not_ready(&self, job_id: &str) {
		self.jobs.lock().expect("mock asr mutex poisoned").insert(job_id.to_string(), AsrOutcome::NotReady);
	}

	pub fn queue_terminal_failure(&self, job_id: &str, message: &str) {
		self.jobs.lock().expect("mock asr mutex poisoned").insert(job_id.to_string(), AsrOutcome::Terminal(message.to_string()));
	}
}

#[async_trait]
impl Asr for MockAsr {
	async fn submit(&self, _audio_url: &str, _lang_code: &str, _task_id: Uuid) -> PipelineResult<TranscriptJob> {
		Ok(TranscriptJob { provider_job_id: Uuid::new_v4().to_string() })
	}

	async fn poll(&self, job: &TranscriptJob) -> PipelineResult<Vec<Word>> {
		match self.jobs.lock().expect("mock asr mutex poisoned").get(&job.provider_job_id) {
			Some(AsrOutcome::Success(words)) => Ok(words.clone()),
			Some(AsrOutcome::NotReady) | None => Err(PipelineError::not_ready()),
			Some(AsrOutcome::Terminal(message)) => Err(PipelineError::terminal_provider(message.clone(), None)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unscheduled_job_is_not_ready() {
		let asr = MockAsr::new();
		let job = asr.submit("https://example.com/v.wav", "en", Uuid::new_v4()).await.unwrap();
		assert!(asr.poll(&job).await.unwrap_err().is_not_ready());
	}

	#[tokio::test]
	async fn queued_words_are_returned_in_order() {
		let asr = MockAsr::new();
		let job = asr.submit("https://example.com/v.wav", "en", Uuid::new_v4()).await.unwrap();
		let words = vec![Word { text: "hi".to_string(), start_ms: 0, end_ms: 100, confidence: 0.9, speaker: None }];
		asr.queue_success(&job.provider_job_id, words.clone());
		assert_eq!(asr.poll(&job).await.unwrap(), words);
	}
}
