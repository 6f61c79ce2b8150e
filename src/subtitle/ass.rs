//! ASS 字幕解析
//!
//! Only the `[Events]` section matters here: each `Dialogue:` becomes a
//! [`SubtitleLine`], and lines carrying `{\k}` tags additionally yield a
//! [`KaraokeTimingInfo`]. Karaoke durations are in centiseconds.
//!
//! Supported karaoke tags: `\k`, `\K`, `\kf`, `\ko`. Every other override tag
//! is removed from the visible text and kept as the line's style override.

use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use super::types::{KaraokeTimingInfo, SubtitleDataset, SubtitleLine, WordTiming};

/// Field layout used when the file has no `Format:` line in `[Events]`
const DEFAULT_EVENT_FORMAT: &[&str] = &[
    "layer", "start", "end", "style", "name", "marginl", "marginr", "marginv", "effect", "text",
];

/// Parse `H:MM:SS.cc` into seconds
fn parse_time(s: &str) -> Option<f64> {
    let mut parts = s.trim().split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Karaoke duration in centiseconds if `tag` is a karaoke tag
fn karaoke_duration(tag: &str) -> Option<u32> {
    let digits = tag
        .strip_prefix("kf")
        .or_else(|| tag.strip_prefix("ko"))
        .or_else(|| tag.strip_prefix('K'))
        .or_else(|| tag.strip_prefix('k'))?;
    digits.trim().parse().ok()
}

fn push_visible(out: &mut String, raw: &str) {
    out.push_str(
        &raw.replace("\\N", "\n")
            .replace("\\n", " ")
            .replace("\\h", "\u{a0}"),
    );
}

/// A syllable under construction: (visible text, duration in seconds)
type Syllable = (String, f64);

/// Split dialogue text into visible text, karaoke syllables and override tags
fn parse_dialogue_text(raw: &str) -> (String, Vec<Syllable>, String) {
    let mut text = String::new();
    let mut syllables: Vec<Syllable> = Vec::new();
    let mut overrides = String::new();
    let mut rest = raw;

    loop {
        // (visible text, override block, bytes consumed)
        let (visible, block, consumed) = match rest.find('{') {
            Some(open) => match rest[open..].find('}') {
                Some(close) => (
                    &rest[..open],
                    Some(&rest[open + 1..open + close]),
                    open + close + 1,
                ),
                // Unterminated block: treat the remainder as text
                None => (rest, None, rest.len()),
            },
            None => (rest, None, rest.len()),
        };

        if !visible.is_empty() {
            let before = text.len();
            push_visible(&mut text, visible);
            let added = &text[before..];
            match syllables.last_mut() {
                Some((syllable, _)) => syllable.push_str(added),
                // Text before the first \k is sung instantly
                None if !added.is_empty() => syllables.push((added.to_string(), 0.0)),
                None => {}
            }
        }

        let Some(block) = block else {
            break;
        };
        for tag in block.split('\\').map(str::trim).filter(|t| !t.is_empty()) {
            match karaoke_duration(tag) {
                Some(cs) => syllables.push((String::new(), cs as f64 / 100.0)),
                None => {
                    overrides.push('\\');
                    overrides.push_str(tag);
                }
            }
        }
        rest = &rest[consumed..];
    }

    // A lone zero-length leading syllable means there were no \k tags at all
    let has_karaoke = syllables.iter().any(|(_, d)| *d > 0.0) || syllables.len() > 1;
    if !has_karaoke {
        syllables.clear();
    }

    (text, syllables, overrides)
}

/// Build word timings from syllable durations, clamped to the line
fn word_timings(start: f64, end: f64, syllables: &[Syllable]) -> Vec<WordTiming> {
    let mut cursor = start;
    let mut words = Vec::with_capacity(syllables.len());
    for (text, duration) in syllables {
        let word_start = cursor.min(end);
        let word_end = (cursor + duration).min(end);
        cursor += duration;
        if let Ok(word) = WordTiming::new(text.clone(), word_start, word_end) {
            words.push(word);
        }
    }
    words
}

/// Parse ASS content
pub fn parse_ass(content: &str) -> SubtitleDataset {
    let mut document = SubtitleDataset::default();
    let mut in_events = false;
    let mut format: Vec<String> = DEFAULT_EVENT_FORMAT.iter().map(|s| s.to_string()).collect();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(fields) = line.strip_prefix("Format:") {
            format = fields
                .split(',')
                .map(|f| f.trim().to_ascii_lowercase())
                .collect();
            continue;
        }

        let Some(body) = line.strip_prefix("Dialogue:") else {
            continue;
        };

        let values: Vec<&str> = body.splitn(format.len(), ',').collect();
        let field = |name: &str| {
            format
                .iter()
                .position(|f| f == name)
                .and_then(|i| values.get(i).copied())
        };

        let (Some(start), Some(end)) = (
            field("start").and_then(parse_time),
            field("end").and_then(parse_time),
        ) else {
            warn!("[AssParser] line {}: unreadable timestamps, skipped", line_no + 1);
            continue;
        };
        let style = field("style").map(str::trim).unwrap_or("Default");
        let raw_text = field("text").unwrap_or("");

        let (text, syllables, overrides) = parse_dialogue_text(raw_text);
        let subtitle = match SubtitleLine::new(start, end, text) {
            Ok(l) => l.with_style(style),
            Err(e) => {
                warn!("[AssParser] line {}: {}, skipped", line_no + 1, e);
                continue;
            }
        };
        let subtitle = subtitle.with_word_timings(word_timings(start, end, &syllables));

        if let Some(karaoke) = KaraokeTimingInfo::from_line(&subtitle) {
            document
                .karaoke
                .push(karaoke.with_style_overrides(overrides));
        }
        document.lines.push(subtitle);
    }

    document
}

/// Read and parse an ASS file
pub fn load_ass_file(path: &Path) -> anyhow::Result<SubtitleDataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read subtitle file {:?}", path))?;
    let document = parse_ass(&content);
    info!(
        "Loaded {:?}: {} lines, {} karaoke entries",
        path,
        document.lines.len(),
        document.karaoke.len()
    );
    Ok(document)
}
