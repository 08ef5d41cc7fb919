mod config;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use pipeline_providers::{
	AssemblyAiAligner, AssemblyAiAsr, HttpLanguageModel, LalalSplitter, MockAligner, MockAsr, MockObjectStore, MockSplitter, NullNotifier, S3ObjectStore, TelegramNotifier,
};
use pipeline_store::{PgPool, TaskStore, VacancyStore};
use pipeline_workers::{Providers, Supervisor};
use prometheus::{Encoder, TextEncoder};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use clap::Parser;
use config::{Config, ProviderMode};

const SHUTDOWN_GRACE_PERIOD_MS: u64 = 200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(|e| anyhow::anyhow!(e))?;

	tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

	info!(providers = ?config.providers, health_port = config.health_port, "starting pipeline worker fleet");

	let pool = pipeline_store::connect(&config.database_url, config.database_max_connections).await?;
	let health_pool = pool.clone();
	let task_store = Arc::new(TaskStore::new(pool.clone()));
	let vacancy_store = Arc::new(VacancyStore::new(pool));

	let providers = build_providers(&config);
	let worker_config = config.worker_config();

	let supervisor = Supervisor::start(task_store, vacancy_store, providers, worker_config);

	let health_port = config.health_port;
	let cancel = CancellationToken::new();
	let server_cancel = cancel.clone();
	let server = tokio::spawn(async move { serve_health(health_port, health_pool, server_cancel).await });

	wait_for_shutdown_signal().await;
	info!("shutdown signal received, draining worker fleet");

	cancel.cancel();
	tokio::time::sleep(std::time::Duration::from_millis(SHUTDOWN_GRACE_PERIOD_MS)).await;

	supervisor.shutdown().await;
	let _ = server.await;

	info!("pipeline worker process exiting");
	Ok(())
}

fn build_providers(config: &Config) -> Providers {
	match config.providers {
		ProviderMode::Live => {
			let http = reqwest::Client::new();

			let object_store = Arc::new(S3ObjectStore::new(
				http.clone(),
				config.object_store_endpoint.clone(),
				config.object_store_bucket.clone(),
				config.object_store_access_key_id.clone(),
				config.object_store_secret_access_key.clone(),
			));
			let splitter = Arc::new(LalalSplitter::new(http.clone(), config.lalal_api_key.clone(), config.lalal_base_url.clone()));
			let asr = Arc::new(AssemblyAiAsr::new(http.clone(), config.assemblyai_api_key.clone(), config.assemblyai_base_url.clone()));
			let aligner = Arc::new(AssemblyAiAligner::new(http.clone(), config.assemblyai_api_key.clone(), config.assemblyai_base_url.clone()));
			let language_model = Arc::new(HttpLanguageModel::new(http.clone(), config.llm_api_key.clone(), config.llm_base_url.clone(), config.llm_model.clone()));

			let notifier: Arc<dyn pipeline_providers::Notifier> = if config.telegram_bot_token.is_empty() {
				Arc::new(NullNotifier)
			} else {
				Arc::new(TelegramNotifier::new(http, config.telegram_bot_token.clone(), config.telegram_chat_id.clone()))
			};

			Providers { object_store, splitter, asr, aligner, language_model, notifier }
		}
		ProviderMode::Mock => Providers {
			object_store: Arc::new(MockObjectStore::new()),
			splitter: Arc::new(MockSplitter::new()),
			asr: Arc::new(MockAsr::new()),
			aligner: Arc::new(MockAligner::new("WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nmock subtitle")),
			language_model: Arc::new(pipeline_providers::DummyLanguageModel::default()),
			notifier: Arc::new(NullNotifier),
		},
	}
}

async fn serve_health(port: u16, pool: PgPool, cancel: CancellationToken) {
	let app = Router::new().route("/healthz", get(healthz)).route("/metrics", get(metrics_handler)).layer(TraceLayer::new_for_http()).with_state(pool);

	let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(listener) => listener,
		Err(err) => {
			error!(%err, %addr, "failed to bind health/metrics listener");
			return;
		}
	};

	info!(%addr, "health/metrics server listening");

	let server = axum::serve(listener, app).with_graceful_shutdown(async move { cancel.cancelled().await });
	if let Err(err) = server.await {
		error!(%err, "health/metrics server exited with error");
	}
}

/// Reports Store connectivity (SPEC_FULL §6 "External triggers"), not just
/// process liveness.
async fn healthz(State(pool): State<PgPool>) -> StatusCode {
	match pipeline_store::ping(&pool).await {
		Ok(()) => StatusCode::OK,
		Err(err) => {
			error!(%err, "healthz: database ping failed");
			StatusCode::SERVICE_UNAVAILABLE
		}
	}
}

async fn metrics_handler() -> Result<String, StatusCode> {
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();
	let mut buffer = Vec::new();

	if encoder.encode(&metric_families, &mut buffer).is_err() {
		return Err(StatusCode::INTERNAL_SERVER_ERROR);
	}

	String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install ctrl-c handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install sigterm handler").recv().await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}
