use std::time::Duration;

use clap::Parser;

/// Process configuration, grounded in `audio-transcriber::config::Config`'s
/// `clap::Parser` + `env` + `validate()` shape.
#[derive(Parser, Debug, Clone)]
#[command(name = "pipeline-worker")]
#[command(about = "Runs the karaoke pipeline and vacancy-matching worker fleet", long_about = None)]
pub struct Config {
	/// Postgres connection string.
	#[arg(long, env = "DATABASE_URL")]
	pub database_url: String,

	#[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value = "10")]
	pub database_max_connections: u32,

	/// "live" wires the real reqwest-backed provider clients; "mock" wires
	/// the deterministic in-memory doubles, useful for demoing the fleet
	/// without provider credentials.
	#[arg(long, env = "PIPELINE_PROVIDERS", default_value = "live")]
	pub providers: ProviderMode,

	#[arg(long, env = "OBJECT_STORE_ENDPOINT", default_value = "")]
	pub object_store_endpoint: String,
	#[arg(long, env = "OBJECT_STORE_BUCKET", default_value = "")]
	pub object_store_bucket: String,
	#[arg(long, env = "OBJECT_STORE_ACCESS_KEY_ID", default_value = "")]
	pub object_store_access_key_id: String,
	#[arg(long, env = "OBJECT_STORE_SECRET_ACCESS_KEY", default_value = "")]
	pub object_store_secret_access_key: String,

	#[arg(long, env = "LALAL_API_KEY", default_value = "")]
	pub lalal_api_key: String,
	#[arg(long, env = "LALAL_BASE_URL", default_value = "https://www.lalal.ai/api")]
	pub lalal_base_url: String,

	#[arg(long, env = "ASSEMBLYAI_API_KEY", default_value = "")]
	pub assemblyai_api_key: String,
	#[arg(long, env = "ASSEMBLYAI_BASE_URL", default_value = "https://api.assemblyai.com")]
	pub assemblyai_base_url: String,

	#[arg(long, env = "LLM_API_KEY", default_value = "")]
	pub llm_api_key: String,
	#[arg(long, env = "LLM_BASE_URL", default_value = "")]
	pub llm_base_url: String,
	#[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
	pub llm_model: String,

	/// Telegram bot token; when unset, final-failure and match notifications
	/// are dropped by a `NullNotifier` instead of sent.
	#[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "")]
	pub telegram_bot_token: String,
	#[arg(long, env = "TELEGRAM_CHAT_ID", default_value = "")]
	pub telegram_chat_id: String,

	#[arg(long, env = "WORKER_TICK_INTERVAL_SECS", default_value = "15")]
	pub tick_interval_secs: u64,
	#[arg(long, env = "WORKER_TASK_BATCH_SIZE", default_value = "100")]
	pub task_batch_size: i64,
	#[arg(long, env = "WORKER_VACANCY_BATCH_SIZE", default_value = "20")]
	pub vacancy_batch_size: i64,
	#[arg(long, env = "WORKER_MAX_ATTEMPTS", default_value = "5")]
	pub max_attempts: i32,
	#[arg(long, env = "SPLIT_POLL_THRESHOLD_SECS", default_value = "30")]
	pub split_poll_threshold_secs: u64,
	#[arg(long, env = "TRANSCRIPT_POLL_THRESHOLD_SECS", default_value = "30")]
	pub transcript_poll_threshold_secs: u64,
	#[arg(long, env = "DUPLICATE_THRESHOLD", default_value = "7")]
	pub duplicate_threshold: u8,
	#[arg(long, env = "RECOMMEND_THRESHOLD", default_value = "7")]
	pub recommend_threshold: u8,

	/// HTTP port serving `/healthz` and `/metrics`.
	#[arg(long, env = "HEALTH_PORT", default_value = "8080")]
	pub health_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderMode {
	Live,
	Mock,
}

impl Config {
	/// Validate configuration values, grounded in the teacher's
	/// `Config::validate` shape (one early-return `Err(String)` per rule).
	pub fn validate(&self) -> Result<(), String> {
		if self.database_url.is_empty() {
			return Err("DATABASE_URL must be set".to_string());
		}

		if self.database_max_connections == 0 {
			return Err("DATABASE_MAX_CONNECTIONS must be at least 1".to_string());
		}

		if !(1..=10).contains(&self.duplicate_threshold) {
			return Err(format!("DUPLICATE_THRESHOLD must be 1-10 (got {})", self.duplicate_threshold));
		}

		if !(1..=10).contains(&self.recommend_threshold) {
			return Err(format!("RECOMMEND_THRESHOLD must be 1-10 (got {})", self.recommend_threshold));
		}

		if self.tick_interval_secs == 0 {
			return Err("WORKER_TICK_INTERVAL_SECS must be greater than 0".to_string());
		}

		if self.task_batch_size <= 0 {
			return Err("WORKER_TASK_BATCH_SIZE must be greater than 0".to_string());
		}

		if self.vacancy_batch_size <= 0 {
			return Err("WORKER_VACANCY_BATCH_SIZE must be greater than 0".to_string());
		}

		if self.max_attempts <= 0 {
			return Err("WORKER_MAX_ATTEMPTS must be greater than 0".to_string());
		}

		if self.providers == ProviderMode::Live {
			if self.object_store_endpoint.is_empty() || self.object_store_bucket.is_empty() {
				return Err("OBJECT_STORE_ENDPOINT and OBJECT_STORE_BUCKET must be set when PIPELINE_PROVIDERS=live".to_string());
			}
			if self.lalal_api_key.is_empty() {
				return Err("LALAL_API_KEY must be set when PIPELINE_PROVIDERS=live".to_string());
			}
			if self.assemblyai_api_key.is_empty() {
				return Err("ASSEMBLYAI_API_KEY must be set when PIPELINE_PROVIDERS=live".to_string());
			}
			if self.llm_api_key.is_empty() || self.llm_base_url.is_empty() {
				return Err("LLM_API_KEY and LLM_BASE_URL must be set when PIPELINE_PROVIDERS=live".to_string());
			}
		}

		Ok(())
	}

	#[must_use]
	pub fn worker_config(&self) -> pipeline_workers::WorkerConfig {
		pipeline_workers::WorkerConfig {
			tick_interval: Duration::from_secs(self.tick_interval_secs),
			task_batch_size: self.task_batch_size,
			vacancy_batch_size: self.vacancy_batch_size,
			max_attempts: self.max_attempts,
			split_poll_threshold: Duration::from_secs(self.split_poll_threshold_secs),
			transcript_poll_threshold: Duration::from_secs(self.transcript_poll_threshold_secs),
			duplicate_threshold: self.duplicate_threshold,
			recommend_threshold: self.recommend_threshold,
		}
	}
}
