pub mod library;
pub mod vocabulary;
pub mod volume;

pub use library::LibraryVolume;
pub use vocabulary::{TrackedWord, VolumeEntry, WordAppearance};
pub use volume::{Block, CropRect, Page, Volume};
