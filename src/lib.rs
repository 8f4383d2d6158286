// Declare all modules that are part of this library
pub mod config;
pub mod error;
pub mod navigation;
pub mod parsing;
pub mod storage;
pub mod sync;
pub mod text;
pub mod types;
pub mod vocabulary;

pub use config::Config;
pub use navigation::{ReaderSession, ViewMode};
pub use sync::{ContextSynchronizer, SyncOutcome, SyncSink, SyncSummary};
pub use types::{Page, Volume};
pub use vocabulary::{AppearanceStore, VocabularyService};
