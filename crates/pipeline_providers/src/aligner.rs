use async_trait::async_trait;
use pipeline_core::{vtt::parse_vtt, PipelineError, PipelineResult, SubtitleCue};
use reqwest::Client;
use serde::Deserialize;

/// Fetches rendered subtitle cues for an already-completed transcript
/// (spec.md §4.7), grounded in `IAssemblyAIClient.get_subtitles`. Unlike
/// `Splitter`/`Asr` this has no submit phase: AssemblyAI renders subtitles
/// on demand from a transcript id that is already final.
#[async_trait]
pub trait Aligner: Send + Sync {
	async fn fetch_subtitles(&self, transcript_job_id: &str) -> PipelineResult<Vec<SubtitleCue>>;
}

#[derive(Debug, Deserialize)]
struct AssemblySubtitlesResponse {
	status: String,
	vtt: Option<String>,
	error: Option<String>,
}

/// Reuses the AssemblyAI HTTP client: the same vendor that performs ASR also
/// renders its transcripts into VTT, grounded in the original's choice to
/// route both through `AssemblyAIClient`.
pub struct AssemblyAiAligner {
	http: Client,
	api_key: String,
	base_url: String,
}

impl AssemblyAiAligner {
	#[must_use]
	pub fn new(http: Client, api_key: String, base_url: String) -> Self {
		Self { http, api_key, base_url }
	}
}

#[async_trait]
impl Aligner for AssemblyAiAligner {
	async fn fetch_subtitles(&self, transcript_job_id: &str) -> PipelineResult<Vec<SubtitleCue>> {
		let response = self
			.http
			.get(format!("{}/v2/transcript/{}/vtt", self.base_url.trim_end_matches('/'), transcript_job_id))
			.header("Authorization", &self.api_key)
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("assemblyai subtitles fetch failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("assemblyai subtitles fetch returned {}", response.status()), None));
		}

		let body: AssemblySubtitlesResponse = response.json().await.map_err(|e| PipelineError::provider(format!("assemblyai subtitles body invalid: {e}"), None))?;

		match body.status.as_str() {
			"completed" => {
				let vtt = body.vtt.ok_or_else(|| PipelineError::provider("assemblyai completed without vtt payload".to_string(), None))?;
				let cues = parse_vtt(&vtt);
				if cues.is_empty() {
					return Err(PipelineError::terminal_provider("vtt payload contained no parseable cues".to_string(), None));
				}
				Ok(cues)
			}
			"queued" | "processing" => Err(PipelineError::not_ready()),
			_ => Err(PipelineError::terminal_provider(body.error.unwrap_or_else(|| "assemblyai subtitles rendering failed".to_string()), None)),
		}
	}
}

/// Scripted subtitle source for worker tests: returns a fixed VTT payload
/// regardless of which transcript job is asked for.
pub struct MockAligner {
	payload: String,
}

impl MockAligner {
	#[must_use]
	pub fn new(payload: impl Into<String>) -> Self {
		Self { payload: payload.into() }
	}
}

#[async_trait]
impl Aligner for MockAligner {
	async fn fetch_subtitles(&self, _transcript_job_id: &str) -> PipelineResult<Vec<SubtitleCue>> {
		let cues = parse_vtt(&self.payload);
		if cues.is_empty() {
			return Err(PipelineError::terminal_provider("vtt payload contained no parseable cues".to_string(), None));
		}
		Ok(cues)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn mock_aligner_parses_its_fixed_payload() {
		let aligner = MockAligner::new("WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nhello");
		let cues = aligner.fetch_subtitles("anything").await.unwrap();
		assert_eq!(cues, vec![SubtitleCue { start_ms: 0, end_ms: 1000, text: "hello".to_string() }]);
	}

	#[tokio::test]
	async fn unparseable_payload_is_a_terminal_error() {
		let aligner = MockAligner::new("not vtt");
		assert!(matches!(aligner.fetch_subtitles("x").await.unwrap_err().kind, pipeline_core::ErrorKind::TerminalProvider { .. }));
	}
}
