//! Karaoke progress calculator
//!
//! 根据卡拉OK 时间信息计算演唱进度，并把一行拆分为逐音节的渲染请求
//!
//! Syllable durations are rescaled onto `[start_time, end_time)` before use,
//! so their sum does not have to match the line duration.

use std::ops::Range;

use crate::render::{Fill, StyleRef, SyllableSpan};
use crate::subtitle::KaraokeTimingInfo;

/// Style name used for karaoke lines
const KARAOKE_STYLE: &str = "Default";

/// Share of the whole line that has been sung at `timestamp`, in [0, 1]
pub fn progress_ratio(info: &KaraokeTimingInfo, timestamp: f64) -> f32 {
    if timestamp <= info.start_time {
        return 0.0;
    }
    if timestamp >= info.end_time {
        return 1.0;
    }
    let duration = info.duration();
    if duration <= 0.0 {
        return 0.0;
    }
    ((timestamp - info.start_time) / duration).clamp(0.0, 1.0) as f32
}

/// Syllable durations rescaled to fill the line
///
/// All-zero timings are split evenly.
pub fn normalized_timings(info: &KaraokeTimingInfo) -> Vec<f64> {
    let count = info.syllable_timings.len();
    if count == 0 {
        return Vec::new();
    }
    let duration = info.duration().max(0.0);
    let total: f64 = info.syllable_timings.iter().map(|d| d.max(0.0)).sum();
    if total <= 0.0 {
        return vec![duration / count as f64; count];
    }
    info.syllable_timings
        .iter()
        .map(|d| d.max(0.0) * duration / total)
        .collect()
}

/// Byte ranges of each syllable inside `info.text`
///
/// Upstream syllable texts are used when they reassemble the line exactly.
/// Otherwise whitespace-separated words are used if their count matches,
/// and as a last resort the text is cut into equal character runs.
pub fn syllable_segments(info: &KaraokeTimingInfo) -> Vec<Range<usize>> {
    let count = info.syllable_count;
    let text = info.text.as_str();
    if count == 0 {
        return Vec::new();
    }

    if info.syllable_texts.len() == count && info.syllable_texts.concat() == text {
        let mut offset = 0;
        return info
            .syllable_texts
            .iter()
            .map(|s| {
                let range = offset..offset + s.len();
                offset = range.end;
                range
            })
            .collect();
    }

    // 按空白分词：每个词连同其后的空白归为一个音节
    let word_starts: Vec<usize> = text
        .char_indices()
        .filter(|&(i, c)| {
            !c.is_whitespace() && text[..i].chars().next_back().is_none_or(char::is_whitespace)
        })
        .map(|(i, _)| i)
        .collect();
    if word_starts.len() == count {
        return (0..count)
            .map(|i| {
                let start = if i == 0 { 0 } else { word_starts[i] };
                let end = word_starts.get(i + 1).copied().unwrap_or(text.len());
                start..end
            })
            .collect();
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars = boundaries.len() - 1;
    (0..count)
        .map(|i| boundaries[i * chars / count]..boundaries[(i + 1) * chars / count])
        .collect()
}

/// Singing state of one syllable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyllableState {
    Sung,
    /// Being sung; the value is the sung share of this syllable
    Singing(f32),
    Unsung,
}

impl SyllableState {
    /// Sung share in [0, 1]
    pub fn fraction(self) -> f32 {
        match self {
            SyllableState::Sung => 1.0,
            SyllableState::Singing(f) => f,
            SyllableState::Unsung => 0.0,
        }
    }
}

/// One bitmap request produced from a karaoke line
#[derive(Debug, Clone, PartialEq)]
pub struct SyllableRequest {
    pub index: usize,
    pub text: String,
    /// Byte range inside the line text
    pub range: Range<usize>,
    pub state: SyllableState,
    pub style: StyleRef,
    pub viewport: (u32, u32),
}

/// State of every syllable at `timestamp`
pub fn syllable_states(info: &KaraokeTimingInfo, timestamp: f64) -> Vec<SyllableState> {
    if timestamp >= info.end_time {
        return vec![SyllableState::Sung; info.syllable_timings.len()];
    }

    let mut cursor = info.start_time;
    normalized_timings(info)
        .into_iter()
        .map(|duration| {
            let start = cursor;
            let end = cursor + duration;
            cursor = end;
            if timestamp < start {
                SyllableState::Unsung
            } else if timestamp >= end {
                SyllableState::Sung
            } else {
                let local = ((timestamp - start) / duration).clamp(0.0, 1.0) as f32;
                SyllableState::Singing(local)
            }
        })
        .collect()
}

/// Decompose a karaoke line into ordered per-syllable requests
///
/// Lines without usable syllable data degrade to one plain, unsung request
/// covering the whole text.
pub fn render_syllable_textures(
    info: &KaraokeTimingInfo,
    timestamp: f64,
    viewport: (u32, u32),
) -> Vec<SyllableRequest> {
    let usable = info.syllable_count > 0
        && !info.syllable_timings.is_empty()
        && info.syllable_timings.len() == info.syllable_count;
    if !usable {
        return vec![SyllableRequest {
            index: 0,
            text: info.text.clone(),
            range: 0..info.text.len(),
            state: SyllableState::Unsung,
            style: StyleRef {
                overrides: info.style_overrides.clone(),
                ..StyleRef::plain(KARAOKE_STYLE)
            },
            viewport,
        }];
    }

    let states = syllable_states(info, timestamp);
    syllable_segments(info)
        .into_iter()
        .zip(states)
        .enumerate()
        .map(|(index, (range, state))| SyllableRequest {
            index,
            text: info.text[range.clone()].to_string(),
            style: StyleRef {
                name: KARAOKE_STYLE.to_string(),
                overrides: info.style_overrides.clone(),
                fill: Fill::Karaoke {
                    sung: state.fraction(),
                },
                span: Some(SyllableSpan {
                    line: info.text.clone(),
                    offset: range.start,
                }),
            },
            range,
            state,
            viewport,
        })
        .collect()
}
