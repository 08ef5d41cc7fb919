pub mod aligner;
pub mod asr;
pub mod language_model;
pub mod notifier;
pub mod object_store;
pub mod splitter;

pub use aligner::{Aligner, AssemblyAiAligner, MockAligner};
pub use asr::{AssemblyAiAsr, Asr, MockAsr, TranscriptJob};
pub use language_model::{DummyLanguageModel, HttpLanguageModel, LanguageModel, MatchOutcome};
pub use notifier::{NullNotifier, RecordingNotifier, TelegramNotifier, Notifier};
pub use object_store::{MockObjectStore, ObjectStore, S3ObjectStore};
pub use splitter::{LalalSplitter, MockSplitter, SplitCheck, SplitResult, Splitter, Stem};
