//! Subtitle module - dataset types and parsing
//!
//! - `types`: `SubtitleLine`, `WordTiming`, `KaraokeTimingInfo`, `SubtitleDataset`
//! - `ass`: ASS `[Events]` parsing with `{\k}` karaoke extraction

pub mod ass;
mod types;

pub use ass::{load_ass_file, parse_ass};
pub use types::*;
