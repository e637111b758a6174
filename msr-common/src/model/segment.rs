//! Segments and highlights produced by the segmentation engine

use serde::{Deserialize, Serialize};

/// Segmentation strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStrategy {
    Sentence,
    Paragraph,
    #[default]
    Adaptive,
}

impl SegmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStrategy::Sentence => "sentence",
            SegmentStrategy::Paragraph => "paragraph",
            SegmentStrategy::Adaptive => "adaptive",
        }
    }

    /// Parse a strategy name, accepting the plural spellings older clients
    /// send. Unknown names fall back to `Adaptive`.
    pub fn parse_lossy(s: &str) -> SegmentStrategy {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" | "sentences" => SegmentStrategy::Sentence,
            "paragraph" | "paragraphs" => SegmentStrategy::Paragraph,
            _ => SegmentStrategy::Adaptive,
        }
    }
}

impl std::fmt::Display for SegmentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of highlight the segmenter extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Quote,
    Emphasis,
    Exclaim,
    Question,
    Ellipsis,
}

/// One highlight within a segment, in character offsets relative to the
/// segment's own text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub start_char: usize,
    pub end_char: usize,
    pub kind: HighlightKind,
    /// Weight in [0,1]
    pub weight: f64,
}

/// One addressable unit of text
///
/// Indices are dense `0..N-1`; `start_char`/`end_char` are offsets into the
/// normalized input; `separator` records any text stripped between this
/// segment and the next so concatenation reconstructs the input exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Stable within a session
    pub id: String,
    pub index: usize,
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
    pub word_count: usize,
    pub est_duration_seconds: f64,
    /// Cumulative start time (sum of prior durations)
    pub start_seconds: f64,
    pub highlights: Vec<Highlight>,
    /// Stripped text between this segment and the next (or trailing)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub separator: String,
}
