use async_trait::async_trait;
use pipeline_core::{MatchComment, PipelineError, PipelineResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
	pub score: u8,
	pub comments: Vec<MatchComment>,
}

/// Language-model integration for vacancy-duplicate scoring and
/// vacancy/resume matching (spec.md §4.10/§4.11), grounded in `LLMService`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
	async fn match_vacancy_and_resume(&self, vacancy_text: &str, resume_text: &str) -> PipelineResult<MatchOutcome>;
	/// 1-10 probability the two vacancy texts describe the same posting
	/// (spec.md §4.10, grounded in `CheckVacancyDuplicateResult`).
	async fn check_vacancy_duplicate(&self, vacancy_text_1: &str, vacancy_text_2: &str) -> PipelineResult<u8>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse<T> {
	result: T,
}

/// Thin HTTP client over an OpenAI-compatible structured-completion
/// endpoint, grounded in the `reqwest`-based clients the rest of this
/// workspace already uses for AssemblyAI/lalal.
pub struct HttpLanguageModel {
	http: Client,
	api_key: String,
	base_url: String,
	model: String,
}

impl HttpLanguageModel {
	#[must_use]
	pub fn new(http: Client, api_key: String, base_url: String, model: String) -> Self {
		Self { http, api_key, base_url, model }
	}

	async fn complete<T: for<'de> Deserialize<'de>>(&self, prompt: &str) -> PipelineResult<T> {
		let response = self
			.http
			.post(format!("{}/completions", self.base_url.trim_end_matches('/')))
			.bearer_auth(&self.api_key)
			.json(&ChatRequest { model: &self.model, prompt })
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("llm completion failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("llm completion returned {}", response.status()), None));
		}

		let body: ChatResponse<T> = response.json().await.map_err(|e| PipelineError::provider(format!("llm completion body invalid: {e}"), None))?;

		Ok(body.result)
	}
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
	async fn match_vacancy_and_resume(&self, vacancy_text: &str, resume_text: &str) -> PipelineResult<MatchOutcome> {
		self.complete(&format!("score this vacancy against this resume:\n---\n{vacancy_text}\n---\n{resume_text}")).await
	}

	async fn check_vacancy_duplicate(&self, vacancy_text_1: &str, vacancy_text_2: &str) -> PipelineResult<u8> {
		self.complete(&format!("rate duplicate probability 1-10:\n---\n{vacancy_text_1}\n---\n{vacancy_text_2}")).await
	}
}

/// Deterministic stand-in used by worker and use-case tests.
#[derive(Default)]
pub struct DummyLanguageModel {
	pub match_outcome: Option<MatchOutcome>,
	pub duplicate_score: u8,
}

#[async_trait]
impl LanguageModel for DummyLanguageModel {
	async fn match_vacancy_and_resume(&self, _vacancy_text: &str, _resume_text: &str) -> PipelineResult<MatchOutcome> {
		self.match_outcome.clone().ok_or_else(|| PipelineError::terminal_provider("dummy language model has no scripted match outcome".to_string(), None))
	}

	async fn check_vacancy_duplicate(&self, _vacancy_text_1: &str, _vacancy_text_2: &str) -> PipelineResult<u8> {
		Ok(self.duplicate_score)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn dummy_model_returns_scripted_duplicate_score() {
		let model = DummyLanguageModel { duplicate_score: 9, ..Default::default() };
		assert_eq!(model.check_vacancy_duplicate("a", "b").await.unwrap(), 9);
	}

	#[tokio::test]
	async fn dummy_model_without_match_outcome_errors() {
		let model = DummyLanguageModel::default();
		assert!(model.match_vacancy_and_resume("a", "b").await.is_err());
	}
}
