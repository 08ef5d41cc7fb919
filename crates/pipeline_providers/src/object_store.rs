use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pipeline_core::{ErrorKind, PipelineError, PipelineResult};
use reqwest::Client;
use uuid::Uuid;

/// Blob storage used for source uploads, split stems, and generated subtitle
/// payloads (spec.md §4.10, grounded in `FileStorageService`). Keys are
/// opaque; callers never construct or parse them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> PipelineResult<String>;

	/// Downloads `url` and stores it, generating a key from `name` when given
	/// or from the URL's last path segment otherwise.
	async fn upload_from_url(&self, url: &str, name: Option<&str>) -> PipelineResult<String>;

	async fn download(&self, key: &str) -> PipelineResult<Vec<u8>>;

	/// A temporary URL an external provider (e.g. the splitter or ASR
	/// vendor) can fetch `key` from without credentials.
	async fn presign_get(&self, key: &str, ttl: Duration) -> PipelineResult<String>;
}

/// S3-compatible object store reached over HTTP via a presigned-URL style
/// API gateway, grounded in `FileStorageService`'s `aioboto3` client.
pub struct S3ObjectStore {
	http: Client,
	endpoint: String,
	bucket: String,
	access_key_id: String,
	secret_access_key: String,
}

impl S3ObjectStore {
	#[must_use]
	pub fn new(http: Client, endpoint: String, bucket: String, access_key_id: String, secret_access_key: String) -> Self {
		Self { http, endpoint, bucket, access_key_id, secret_access_key }
	}

	fn object_url(&self, key: &str) -> String {
		format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, key)
	}
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
	async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> PipelineResult<String> {
		let key = format!("{}_{name}", Uuid::new_v4());

		let response = self
			.http
			.put(self.object_url(&key))
			.basic_auth(&self.access_key_id, Some(&self.secret_access_key))
			.header("Content-Type", content_type)
			.body(bytes)
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("s3 put failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("s3 put returned {}", response.status()), None));
		}

		Ok(key)
	}

	async fn upload_from_url(&self, url: &str, name: Option<&str>) -> PipelineResult<String> {
		let response = self.http.get(url).send().await.map_err(|e| PipelineError::network(format!("download for upload failed: {e}")))?;

		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("source fetch returned {}", response.status()), None));
		}

		let content_type = response.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("application/octet-stream").to_string();

		let file_name = name.map(ToString::to_string).unwrap_or_else(|| {
			url.rsplit('/').next().filter(|segment| !segment.is_empty()).map_or_else(|| format!("downloaded_{}", Uuid::new_v4()), ToString::to_string)
		});

		let bytes = response.bytes().await.map_err(|e| PipelineError::network(format!("reading download body failed: {e}")))?;

		self.upload(bytes.to_vec(), &file_name, &content_type).await
	}

	async fn download(&self, key: &str) -> PipelineResult<Vec<u8>> {
		let response = self
			.http
			.get(self.object_url(key))
			.basic_auth(&self.access_key_id, Some(&self.secret_access_key))
			.send()
			.await
			.map_err(|e| PipelineError::network(format!("s3 get failed: {e}")))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(PipelineError::terminal_provider(format!("key not found: {key}"), None));
		}
		if !response.status().is_success() {
			return Err(PipelineError::provider(format!("s3 get returned {}", response.status()), None));
		}

		Ok(response.bytes().await.map_err(|e| PipelineError::network(format!("reading s3 body failed: {e}")))?.to_vec())
	}

	async fn presign_get(&self, key: &str, ttl: Duration) -> PipelineResult<String> {
		Ok(format!("{}?expires_in={}", self.object_url(key), ttl.as_secs()))
	}
}

/// In-memory store for tests, grounded in the teacher's habit of pairing
/// every external-provider trait with a deterministic mock (see
/// `task_queue::redis_queue` tests).
#[derive(Default)]
pub struct MockObjectStore {
	objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MockObjectStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn seed(self, key: &str, bytes: Vec<u8>, content_type: &str) -> Self {
		self.objects.lock().expect("mock store mutex poisoned").insert(key.to_string(), (bytes, content_type.to_string()));
		self
	}
}

#[async_trait]
impl ObjectStore for MockObjectStore {
	async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> PipelineResult<String> {
		let key = format!("{}_{name}", Uuid::new_v4());
		self.objects.lock().expect("mock store mutex poisoned").insert(key.clone(), (bytes, content_type.to_string()));
		Ok(key)
	}

	async fn upload_from_url(&self, url: &str, name: Option<&str>) -> PipelineResult<String> {
		let file_name = name.unwrap_or("downloaded.bin");
		self.upload(format!("fetched:{url}").into_bytes(), file_name, "application/octet-stream").await
	}

	async fn download(&self, key: &str) -> PipelineResult<Vec<u8>> {
		self.objects
			.lock()
			.expect("mock store mutex poisoned")
			.get(key)
			.map(|(bytes, _)| bytes.clone())
			.ok_or_else(|| PipelineError::terminal_provider(format!("key not found: {key}"), None))
	}

	async fn presign_get(&self, key: &str, ttl: Duration) -> PipelineResult<String> {
		Ok(format!("mock://{key}?ttl={}", ttl.as_secs()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn round_trips_uploaded_bytes() {
		let store = MockObjectStore::new();
		let key = store.upload(b"hello".to_vec(), "a.txt", "text/plain").await.unwrap();
		assert_eq!(store.download(&key).await.unwrap(), b"hello");
	}

	#[tokio::test]
	async fn missing_key_is_terminal() {
		let store = MockObjectStore::new();
		let err = store.download("nope").await.unwrap_err();
		assert!(matches!(err.kind, ErrorKind::TerminalProvider { .. }));
	}
}
