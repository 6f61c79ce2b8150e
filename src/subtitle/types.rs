//! Subtitle data types
//!
//! All times are in seconds. Activity is tested on the half-open interval
//! `[start_time, end_time)`.

use serde::{Deserialize, Serialize};

use crate::error::DataError;

fn check_timing(start: f64, end: f64) -> Result<(), DataError> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
        return Err(DataError::InvalidTiming { start, end });
    }
    Ok(())
}

/// Timing of a single word (or syllable) inside a line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl WordTiming {
    /// Zero-length words are allowed (`{\k0}` in ASS), inverted ones are not
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Result<Self, DataError> {
        if !start_time.is_finite() || !end_time.is_finite() || start_time < 0.0 || end_time < start_time
        {
            return Err(DataError::InvalidTiming {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            word: word.into(),
            start_time,
            end_time,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One subtitle cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleLine {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    /// Style name, "Default" unless the source says otherwise
    #[serde(default = "default_style")]
    pub style: String,
    /// Optional per-word timings (karaoke)
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,
}

fn default_style() -> String {
    "Default".to_string()
}

impl SubtitleLine {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Result<Self, DataError> {
        check_timing(start_time, end_time)?;
        Ok(Self {
            start_time,
            end_time,
            text: text.into(),
            style: default_style(),
            word_timings: Vec::new(),
        })
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_word_timings(mut self, word_timings: Vec<WordTiming>) -> Self {
        self.word_timings = word_timings;
        self
    }

    /// Whether the cue is on screen at `timestamp`
    pub fn is_active(&self, timestamp: f64) -> bool {
        self.start_time <= timestamp && timestamp < self.end_time
    }
}

/// Karaoke timing of one line
///
/// `syllable_timings` are durations in seconds, in singing order. Their sum
/// does not have to match `end_time - start_time`; the progress calculator
/// rescales them onto the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeTimingInfo {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub syllable_count: usize,
    pub syllable_timings: Vec<f64>,
    /// Syllable boundaries from the timing source. Empty when unknown.
    #[serde(default)]
    pub syllable_texts: Vec<String>,
    #[serde(default)]
    pub style_overrides: String,
}

impl KaraokeTimingInfo {
    pub fn new(
        start_time: f64,
        end_time: f64,
        text: impl Into<String>,
        syllable_count: usize,
        syllable_timings: Vec<f64>,
    ) -> Result<Self, DataError> {
        check_timing(start_time, end_time)?;
        if syllable_timings.len() != syllable_count {
            return Err(DataError::SyllableMismatch {
                count: syllable_count,
                timings: syllable_timings.len(),
            });
        }
        if let Some((index, &duration)) = syllable_timings
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d < 0.0)
        {
            return Err(DataError::NegativeDuration { index, duration });
        }

        Ok(Self {
            start_time,
            end_time,
            text: text.into(),
            syllable_count,
            syllable_timings,
            syllable_texts: Vec::new(),
            style_overrides: String::new(),
        })
    }

    pub fn with_syllable_texts(mut self, syllable_texts: Vec<String>) -> Self {
        self.syllable_texts = syllable_texts;
        self
    }

    pub fn with_style_overrides(mut self, style_overrides: impl Into<String>) -> Self {
        self.style_overrides = style_overrides.into();
        self
    }

    /// Derive karaoke timing from a line's word timings
    ///
    /// Returns `None` when the line carries no word timings.
    pub fn from_line(line: &SubtitleLine) -> Option<Self> {
        if line.word_timings.is_empty() {
            return None;
        }
        let timings = line.word_timings.iter().map(|w| w.duration().max(0.0)).collect();
        let texts = line.word_timings.iter().map(|w| w.word.clone()).collect();
        Self::new(
            line.start_time,
            line.end_time,
            line.text.clone(),
            line.word_timings.len(),
            timings,
        )
        .ok()
        .map(|info| info.with_syllable_texts(texts))
    }

    /// Whether the line is being sung at `timestamp`
    pub fn contains(&self, timestamp: f64) -> bool {
        self.start_time <= timestamp && timestamp < self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Ordered lines plus ordered karaoke entries, replaced wholesale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleDataset {
    #[serde(default)]
    pub lines: Vec<SubtitleLine>,
    #[serde(default)]
    pub karaoke: Vec<KaraokeTimingInfo>,
}

impl SubtitleDataset {
    pub fn new(lines: Vec<SubtitleLine>, karaoke: Vec<KaraokeTimingInfo>) -> Self {
        Self { lines, karaoke }
    }

    /// Lines on screen at `timestamp`, in dataset order
    pub fn active_lines(&self, timestamp: f64) -> impl Iterator<Item = &SubtitleLine> {
        self.lines.iter().filter(move |line| line.is_active(timestamp))
    }

    /// First karaoke entry (dataset order) whose interval contains `timestamp`
    ///
    /// Overlapping entries are resolved by position, not by start time.
    pub fn find_karaoke(&self, timestamp: f64) -> Option<&KaraokeTimingInfo> {
        self.karaoke.iter().find(|info| info.contains(timestamp))
    }

    /// Index of the entry [`SubtitleDataset::find_karaoke`] would return
    pub fn find_karaoke_index(&self, timestamp: f64) -> Option<usize> {
        self.karaoke.iter().position(|info| info.contains(timestamp))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.karaoke.is_empty()
    }
}
