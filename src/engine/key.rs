//! Cache key derivation
//!
//! A key folds together everything that changes the rendered result: the
//! quantized timestamp, the viewport, and a fingerprint of the dataset. Loading
//! new subtitles or resizing therefore never hits stale entries.

use xxhash_rust::xxh3::Xxh3;

use crate::subtitle::SubtitleDataset;

/// Identity of a cached render result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Timestamp rounded to whole milliseconds
    pub timestamp_ms: i64,
    pub viewport: (u32, u32),
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(timestamp: f64, viewport: (u32, u32), fingerprint: u64) -> Self {
        Self {
            timestamp_ms: quantize(timestamp),
            viewport,
            fingerprint,
        }
    }
}

/// Seconds -> milliseconds, rounded
pub fn quantize(timestamp: f64) -> i64 {
    (timestamp * 1000.0).round() as i64
}

fn hash_str(hasher: &mut Xxh3, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_f64(hasher: &mut Xxh3, v: f64) {
    hasher.update(&v.to_bits().to_le_bytes());
}

/// xxh3 over every line and karaoke entry
pub fn dataset_fingerprint(dataset: &SubtitleDataset) -> u64 {
    let mut hasher = Xxh3::new();

    hasher.update(&(dataset.lines.len() as u64).to_le_bytes());
    for line in &dataset.lines {
        hash_f64(&mut hasher, line.start_time);
        hash_f64(&mut hasher, line.end_time);
        hash_str(&mut hasher, &line.text);
        hash_str(&mut hasher, &line.style);
        hasher.update(&(line.word_timings.len() as u64).to_le_bytes());
        for word in &line.word_timings {
            hash_str(&mut hasher, &word.word);
            hash_f64(&mut hasher, word.start_time);
            hash_f64(&mut hasher, word.end_time);
        }
    }

    hasher.update(&(dataset.karaoke.len() as u64).to_le_bytes());
    for info in &dataset.karaoke {
        hash_f64(&mut hasher, info.start_time);
        hash_f64(&mut hasher, info.end_time);
        hash_str(&mut hasher, &info.text);
        hasher.update(&(info.syllable_count as u64).to_le_bytes());
        for &duration in &info.syllable_timings {
            hash_f64(&mut hasher, duration);
        }
        for syllable in &info.syllable_texts {
            hash_str(&mut hasher, syllable);
        }
        hash_str(&mut hasher, &info.style_overrides);
    }

    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{KaraokeTimingInfo, SubtitleLine};

    fn dataset(text: &str) -> SubtitleDataset {
        SubtitleDataset::new(vec![SubtitleLine::new(1.0, 3.0, text).unwrap()], Vec::new())
    }

    #[test]
    fn test_quantize_to_milliseconds() {
        assert_eq!(quantize(1.5), 1500);
        assert_eq!(quantize(1.0004), 1000);
        assert_eq!(quantize(1.0006), 1001);
    }

    #[test]
    fn test_nearby_timestamps_share_a_key() {
        let a = CacheKey::new(2.0001, (1920, 1080), 7);
        let b = CacheKey::new(1.9999, (1920, 1080), 7);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new(2.0001, (1280, 720), 7));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_eq!(dataset_fingerprint(&dataset("Hello")), dataset_fingerprint(&dataset("Hello")));
        assert_ne!(dataset_fingerprint(&dataset("Hello")), dataset_fingerprint(&dataset("Hullo")));
    }

    #[test]
    fn test_fingerprint_includes_karaoke() {
        let plain = dataset("Hello");
        let mut sung = plain.clone();
        sung.karaoke
            .push(KaraokeTimingInfo::new(1.0, 3.0, "Hello", 1, vec![2.0]).unwrap());
        assert_ne!(dataset_fingerprint(&plain), dataset_fingerprint(&sung));
    }
}
