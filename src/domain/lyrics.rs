//! Bilingual LRC lyric parsing.
//!
//! Two bilingual encodings are supported:
//! 1. Repeated timestamp — two lines sharing one `[MM:SS.xx]` tag become the
//!    primary/secondary pair.
//! 2. Single line split — `[MM:SS.xx]primary / secondary`.
//!
//! Metadata tags (`[ti:]`, `[ar:]`, `[al:]`, `[by:]`) are collected into a
//! flat string map used for default-filename derivation.

use regex::Regex;
use std::collections::BTreeMap;

/// One timed lyric line. `secondary` is empty when the line is monolingual.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLine {
    pub start: f64,
    pub primary: String,
    pub secondary: String,
}

/// Flat tag -> value map ("ti", "ar", "al", "by").
pub type LyricMetadata = BTreeMap<String, String>;

/// Parse LRC content into sorted timed lines plus metadata.
///
/// Lines without a timestamp or with empty text are skipped; lines whose
/// primary text ends up empty are dropped.
pub fn parse_bilingual_lrc(content: &str) -> (Vec<TimedLine>, LyricMetadata) {
    let time_re = Regex::new(r"\[(\d{2}):(\d{2})\.(\d{2,3})\]").unwrap();
    let meta_re = Regex::new(r"\[(ti|ar|al|by):([^\]]*)\]").unwrap();

    // Keyed by start time in milliseconds so lines sharing a timestamp group
    // together and the map stays sorted.
    let mut timed: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    let mut metadata = LyricMetadata::new();

    for line in content.lines() {
        if let Some(meta) = meta_re.captures(line) {
            let value = meta[2].trim();
            if !value.is_empty() {
                metadata.insert(meta[1].to_string(), value.to_string());
            }
            continue;
        }

        let Some(time) = time_re.captures(line) else {
            continue;
        };
        let minutes: u64 = time[1].parse().unwrap_or(0);
        let seconds: u64 = time[2].parse().unwrap_or(0);
        // Two-digit fractions are centiseconds; pad to milliseconds.
        let mut fraction = time[3].to_string();
        while fraction.len() < 3 {
            fraction.push('0');
        }
        let millis: u64 = fraction.parse().unwrap_or(0);
        let start_ms = (minutes * 60 + seconds) * 1000 + millis;

        let text = line[time.get(0).unwrap().end()..].trim();
        if !text.is_empty() {
            timed.entry(start_ms).or_default().push(text.to_string());
        }
    }

    let mut lines = Vec::with_capacity(timed.len());
    for (start_ms, texts) in timed {
        let (primary, secondary) = match texts.len() {
            0 => continue,
            1 => match texts[0].split_once('/') {
                Some((first, rest)) => (first.trim().to_string(), rest.trim().to_string()),
                None => (texts[0].trim().to_string(), String::new()),
            },
            _ => (texts[0].trim().to_string(), texts[1].trim().to_string()),
        };
        if primary.is_empty() {
            continue;
        }
        lines.push(TimedLine {
            start: start_ms as f64 / 1000.0,
            primary,
            secondary,
        });
    }

    (lines, metadata)
}
