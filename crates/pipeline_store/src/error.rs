use pipeline_core::PipelineError;

/// Maps a raw `sqlx::Error` onto the workspace's classification. Row-not-found
/// from an optimistic re-check is not a failure the caller should log as an
/// error: callers that care (the worker loops) special-case
/// `sqlx::Error::RowNotFound` themselves via `fetch_optional` rather than via
/// this conversion, so every error reaching here is a genuine storage fault.
pub fn storage_error(context: &str, error: sqlx::Error) -> PipelineError {
	PipelineError::storage(format!("{context}: {error}"))
}
