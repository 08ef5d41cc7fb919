use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use pipeline_core::PipelineError;
use reqwest::Client;
use tracing::error;

const MAX_MESSAGE_LEN: usize = 4000;

/// Operator-facing alerting for final failures (spec.md §4.8/§7), grounded
/// in `Notifier`. A failed send is logged and swallowed rather than
/// propagated: losing a notification must never re-fail the step whose
/// terminal failure triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn notify_final_failure(&self, context: &str, error: &PipelineError);
	async fn notify(&self, message: &str);
}

fn format_final_failure(context: &str, error: &PipelineError) -> String {
	format!(
		"<b>Pipeline step failed permanently</b>\n\n{}\n{context}\n{}\n{}",
		Utc::now().format("%Y-%m-%d %H:%M:%S"),
		error.kind,
		error.message()
	)
}

fn truncate(message: &str) -> String {
	if message.len() > MAX_MESSAGE_LEN {
		format!("{}\n\n...", &message[..MAX_MESSAGE_LEN])
	} else {
		message.to_string()
	}
}

/// Telegram bot API notifier, grounded in `TgAiogramNotifier`. Uses the
/// plain HTTP bot API (`sendMessage`) rather than an aiogram-equivalent
/// client library, since none of this workspace's dependencies wrap it.
pub struct TelegramNotifier {
	http: Client,
	bot_token: String,
	chat_id: String,
}

impl TelegramNotifier {
	#[must_use]
	pub fn new(http: Client, bot_token: String, chat_id: String) -> Self {
		Self { http, bot_token, chat_id }
	}

	async fn send(&self, message: &str) {
		let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
		let body = truncate(message);

		let result = self.http.post(url).json(&serde_json::json!({ "chat_id": self.chat_id, "text": body, "parse_mode": "HTML" })).send().await;

		match result {
			Ok(response) if !response.status().is_success() => {
				error!(status = %response.status(), "telegram notification rejected");
			}
			Err(err) => {
				error!(%err, "failed to send telegram notification");
			}
			Ok(_) => {}
		}
	}
}

#[async_trait]
impl Notifier for TelegramNotifier {
	async fn notify_final_failure(&self, context: &str, error: &PipelineError) {
		self.send(&format_final_failure(context, error)).await;
	}

	async fn notify(&self, message: &str) {
		self.send(message).await;
	}
}

/// No-op notifier for environments with no alerting channel configured, and
/// for tests that don't care about notification side effects.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
	async fn notify_final_failure(&self, _context: &str, _error: &PipelineError) {}
	async fn notify(&self, _message: &str) {}
}

/// Records every notification it receives so tests can assert on them.
#[derive(Default)]
pub struct RecordingNotifier {
	messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn sent(&self) -> Vec<String> {
		self.messages.lock().expect("recording notifier mutex poisoned").clone()
	}
}

#[async_trait]
impl Notifier for RecordingNotifier {
	async fn notify_final_failure(&self, context: &str, error: &PipelineError) {
		self.messages.lock().expect("recording notifier mutex poisoned").push(format_final_failure(context, error));
	}

	async fn notify(&self, message: &str) {
		self.messages.lock().expect("recording notifier mutex poisoned").push(message.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn recording_notifier_captures_final_failures() {
		let notifier = RecordingNotifier::new();
		let err = PipelineError::terminal_provider("boom".to_string(), None);
		notifier.notify_final_failure("split step task=t1", &err).await;
		assert_eq!(notifier.sent().len(), 1);
		assert!(notifier.sent()[0].contains("boom"));
	}

	#[tokio::test]
	async fn null_notifier_does_nothing() {
		let notifier = NullNotifier;
		notifier.notify("hello").await;
	}
}
