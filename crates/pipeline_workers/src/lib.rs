pub mod assemble;
pub mod config;
pub mod duplicate;
pub mod loop_util;
pub mod match_worker;
pub mod metrics;
pub mod retry;
pub mod split;
pub mod subtitles;
pub mod supervisor;
pub mod transcript;

pub use assemble::AssembleWorker;
pub use config::WorkerConfig;
pub use duplicate::DuplicateWorker;
pub use match_worker::MatchWorker;
pub use split::SplitWorkers;
pub use subtitles::SubtitlesWorkers;
pub use supervisor::{Providers, Supervisor};
pub use transcript::TranscriptWorkers;
