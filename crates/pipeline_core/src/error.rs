use serde_json::Value;
use thiserror::Error;

/// Classification of a failure raised while driving a `Step` through a
/// worker tick. `NotReady` is not really a failure: it just means the
/// provider has nothing to report yet, so the caller must not mutate the
/// step or bump its attempt counter. Each variant that can come from a
/// provider response carries its own message/context rather than hoisting
/// them onto an outer struct, so matching on the kind is enough to recover
/// everything worth logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
	#[error("not ready")]
	NotReady,
	#[error("provider error: {message}")]
	Provider { message: String, context: Option<Value> },
	#[error("network error: {0}")]
	Network(String),
	#[error("validation error: {0}")]
	Validation(String),
	#[error("storage error: {0}")]
	Storage(String),
	#[error("terminal provider error: {message}")]
	TerminalProvider { message: String, context: Option<Value> },
}

impl ErrorKind {
	/// `NotReady` is the only kind that does not count as an attempt and is
	/// never logged as an error (spec taxonomy, see SPEC_FULL §7).
	#[must_use]
	pub const fn counts_as_attempt(&self) -> bool {
		!matches!(self, Self::NotReady)
	}

	/// Flat message for logging regardless of which variant carries it.
	#[must_use]
	pub fn message(&self) -> String {
		match self {
			Self::NotReady => "not ready".to_string(),
			Self::Provider { message, .. } | Self::TerminalProvider { message, .. } => message.clone(),
			Self::Network(message) | Self::Validation(message) | Self::Storage(message) => message.clone(),
		}
	}

	/// Provider response context, if this variant carries one.
	#[must_use]
	pub const fn context(&self) -> Option<&Value> {
		match self {
			Self::Provider { context, .. } | Self::TerminalProvider { context, .. } => context.as_ref(),
			_ => None,
		}
	}
}

/// The error type every provider-facing and store-facing operation in this
/// workspace returns. The classification and its payload live on `kind`;
/// this struct only adds an optional `source` for error-chain propagation.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct PipelineError {
	pub kind: ErrorKind,
	#[source]
	pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
	#[must_use]
	pub fn not_ready() -> Self {
		Self { kind: ErrorKind::NotReady, source: None }
	}

	#[must_use]
	pub fn provider(message: impl Into<String>, context: Option<Value>) -> Self {
		Self { kind: ErrorKind::Provider { message: message.into(), context }, source: None }
	}

	#[must_use]
	pub fn terminal_provider(message: impl Into<String>, context: Option<Value>) -> Self {
		Self { kind: ErrorKind::TerminalProvider { message: message.into(), context }, source: None }
	}

	#[must_use]
	pub fn network(message: impl Into<String>) -> Self {
		Self { kind: ErrorKind::Network(message.into()), source: None }
	}

	#[must_use]
	pub fn validation(message: impl Into<String>) -> Self {
		Self { kind: ErrorKind::Validation(message.into()), source: None }
	}

	#[must_use]
	pub fn storage(message: impl Into<String>) -> Self {
		Self { kind: ErrorKind::Storage(message.into()), source: None }
	}

	#[must_use]
	pub const fn is_not_ready(&self) -> bool {
		matches!(self.kind, ErrorKind::NotReady)
	}

	/// Flat message, delegated to `kind` (see `ErrorKind::message`).
	#[must_use]
	pub fn message(&self) -> String {
		self.kind.message()
	}

	/// Provider response context, delegated to `kind` (see `ErrorKind::context`).
	#[must_use]
	pub const fn context(&self) -> Option<&Value> {
		self.kind.context()
	}
}

impl From<serde_json::Error> for PipelineError {
	fn from(error: serde_json::Error) -> Self {
		Self::validation(format!("JSON error: {error}"))
	}
}

pub type PipelineResult<T> = Result<T, PipelineError>;
