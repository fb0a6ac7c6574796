//! Word-timing input.
//!
//! Transcribers hand back word timings in a few shapes: a flat word list,
//! a `{ "words": [...] }` document, or segments that each carry their own
//! `words`. Everything downstream only needs the flattened, start-sorted view.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::TimelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    #[serde(alias = "word")]
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Flatten any supported transcript shape into start-sorted word timings.
pub fn flatten_words(value: &Value) -> Vec<WordTiming> {
    let mut words = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                match item.get("words") {
                    Some(segment_words) => collect_words(segment_words, &mut words),
                    None => push_word(item, &mut words),
                }
            }
        }
        Value::Object(doc) => {
            let top_level = doc.get("words").and_then(Value::as_array);
            match top_level {
                Some(list) if !list.is_empty() => collect_words(&doc["words"], &mut words),
                _ => {
                    if let Some(segments) = doc.get("segments").and_then(Value::as_array) {
                        for segment in segments {
                            if let Some(segment_words) = segment.get("words") {
                                collect_words(segment_words, &mut words);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }

    words.sort_by(|a, b| a.start.total_cmp(&b.start));
    words
}

fn collect_words(list: &Value, out: &mut Vec<WordTiming>) {
    if let Some(items) = list.as_array() {
        for item in items {
            push_word(item, out);
        }
    }
}

fn push_word(item: &Value, out: &mut Vec<WordTiming>) {
    let text = item
        .get("word")
        .or_else(|| item.get("text"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    let start = item.get("start").and_then(Value::as_f64);
    let end = item.get("end").and_then(Value::as_f64);

    // Aligners leave some tokens (numerals, symbols) without timing.
    match (start, end) {
        (Some(start), Some(end)) if !text.is_empty() && start.is_finite() && end.is_finite() => {
            out.push(WordTiming::new(text, start, end));
        }
        _ => debug!(word = %text, "skipping word without usable timing"),
    }
}

pub fn parse_word_timings(json: &str) -> Result<Vec<WordTiming>, TimelineError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| TimelineError::json("parsing word timings", e))?;
    Ok(flatten_words(&value))
}

pub fn load_word_timings(path: &Path) -> Result<Vec<WordTiming>, TimelineError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| TimelineError::io(format!("reading {}", path.display()), e))?;
    parse_word_timings(&data)
}

/// Compact `[[word, start, end], ...]` view sent to the scene planner.
pub fn compact_words(words: &[WordTiming]) -> Value {
    Value::Array(
        words
            .iter()
            .map(|w| serde_json::json!([w.text, w.start, w.end]))
            .collect(),
    )
}

pub fn transcript_text(words: &[WordTiming]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(first word start, last word end)`, or `None` without words.
pub fn narration_span(words: &[WordTiming]) -> Option<(f64, f64)> {
    let start = words.iter().map(|w| w.start).min_by(|a, b| a.total_cmp(b))?;
    let end = words.iter().map(|w| w.end).max_by(|a, b| a.total_cmp(b))?;
    Some((start, end))
}
