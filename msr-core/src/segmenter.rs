//! Text segmentation engine
//!
//! Splits narrative text into addressable units with highlight metadata and
//! timing estimates. All offsets are in characters (not bytes) over the
//! NFC-normalized input; each segment records the separator text stripped
//! after it so that concatenating `text + separator` in order reconstructs
//! the normalized input.

use unicode_normalization::UnicodeNormalization;

use msr_common::model::{Highlight, HighlightKind, Segment, SegmentStrategy};

/// Default words-per-minute used for duration estimates
pub const DEFAULT_READING_WPM: u32 = 200;

/// Default maximum characters per segment
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 500;

/// Terminal punctuation ending a sentence
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Language-aware text segmenter
#[derive(Debug, Clone)]
pub struct Segmenter {
    strategy: SegmentStrategy,
    max_chunk_chars: usize,
    reading_wpm: u32,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SegmentStrategy::Adaptive, DEFAULT_MAX_CHUNK_CHARS, DEFAULT_READING_WPM)
    }
}

impl Segmenter {
    pub fn new(strategy: SegmentStrategy, max_chunk_chars: usize, reading_wpm: u32) -> Self {
        Self {
            strategy,
            max_chunk_chars: max_chunk_chars.max(1),
            reading_wpm: reading_wpm.max(1),
        }
    }

    pub fn with_strategy(strategy: SegmentStrategy) -> Self {
        Self::new(strategy, DEFAULT_MAX_CHUNK_CHARS, DEFAULT_READING_WPM)
    }

    /// Override the reading speed (words per minute) for duration estimates.
    pub fn with_reading_wpm(mut self, wpm: u32) -> Self {
        self.reading_wpm = wpm.max(1);
        self
    }

    /// Strategy that will actually run for this input.
    ///
    /// Adaptive picks paragraph splitting when the text contains at least
    /// two paragraph breaks, sentence splitting otherwise.
    pub fn effective_strategy(&self, text: &str) -> SegmentStrategy {
        match self.strategy {
            SegmentStrategy::Adaptive => {
                if count_paragraph_breaks(text) >= 2 {
                    SegmentStrategy::Paragraph
                } else {
                    SegmentStrategy::Sentence
                }
            }
            other => other,
        }
    }

    /// Segment `text` into addressable units.
    ///
    /// Never fails on valid UTF-8. Empty or whitespace-only input returns an
    /// empty list.
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        let normalized: String = text.nfc().collect();
        if normalized.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = normalized.chars().collect();
        let strategy = self.effective_strategy(&normalized);

        let mut spans = match strategy {
            SegmentStrategy::Sentence => sentence_spans(&chars),
            SegmentStrategy::Paragraph => paragraph_spans(&chars),
            // effective_strategy never returns Adaptive
            SegmentStrategy::Adaptive => sentence_spans(&chars),
        };

        spans = enforce_max_chunk(&chars, spans, self.max_chunk_chars);

        if spans.is_empty() {
            return Vec::new();
        }

        // Leading whitespace belongs to the first segment so that the
        // concatenation invariant holds from offset zero.
        spans[0].start = 0;

        let wps = f64::from(self.reading_wpm) / 60.0;
        let mut segments = Vec::with_capacity(spans.len());
        let mut cursor_seconds = 0.0;

        for (index, span) in spans.iter().enumerate() {
            let seg_text: String = chars[span.start..span.end].iter().collect();
            let sep_end = spans.get(index + 1).map(|s| s.start).unwrap_or(chars.len());
            let separator: String = chars[span.end..sep_end].iter().collect();

            let words = word_count(&seg_text);
            let est_duration_seconds = words as f64 / wps;
            let highlights = extract_highlights(&seg_text);

            segments.push(Segment {
                id: format!("seg-{}", index),
                index,
                text: seg_text,
                start_char: span.start,
                end_char: span.end,
                word_count: words,
                est_duration_seconds,
                start_seconds: cursor_seconds,
                highlights,
                separator,
            });
            cursor_seconds += est_duration_seconds;
        }

        segments
    }

    /// Total estimated duration of a segment list, in seconds.
    pub fn total_duration(segments: &[Segment]) -> f64 {
        segments.iter().map(|s| s.est_duration_seconds).sum()
    }
}

/// Half-open character span of segment content
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Count runs of two or more newline characters.
fn count_paragraph_breaks(text: &str) -> usize {
    let mut breaks = 0;
    let mut newline_run = 0;
    for c in text.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run == 2 {
                breaks += 1;
            }
        } else if c != '\r' {
            newline_run = 0;
        }
    }
    breaks
}

/// Split on terminal punctuation, keeping the terminator run with the
/// preceding segment. Consecutive terminators collapse into one boundary.
fn sentence_spans(chars: &[char]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if SENTENCE_TERMINATORS.contains(&chars[i]) {
            // Extend over the whole terminator run
            let mut end = i + 1;
            while end < chars.len() && SENTENCE_TERMINATORS.contains(&chars[end]) {
                end += 1;
            }
            push_trimmed(chars, start, end, &mut spans);
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }

    push_trimmed(chars, start, chars.len(), &mut spans);
    spans
}

/// Split on runs of two or more newline characters.
fn paragraph_spans(chars: &[char]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\n' {
            // Measure the newline run (tolerating \r)
            let mut j = i + 1;
            let mut newlines = 1;
            while j < chars.len() && (chars[j] == '\n' || chars[j] == '\r') {
                if chars[j] == '\n' {
                    newlines += 1;
                }
                j += 1;
            }
            if newlines >= 2 {
                push_trimmed(chars, start, i, &mut spans);
                start = j;
                i = j;
                continue;
            }
            i = j;
        } else {
            i += 1;
        }
    }

    push_trimmed(chars, start, chars.len(), &mut spans);
    spans
}

/// Trim a raw span to its content and push it if non-empty.
///
/// Whitespace-only spans are dropped here; their character range falls into
/// the preceding segment's separator when separators are computed from the
/// gaps between surviving spans.
fn push_trimmed(chars: &[char], mut start: usize, mut end: usize, spans: &mut Vec<Span>) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start < end {
        spans.push(Span { start, end });
    }
}

/// Split any span longer than `max_chars`: first by sentence, then at the
/// nearest whitespace before the limit, finally hard at the limit.
fn enforce_max_chunk(chars: &[char], spans: Vec<Span>, max_chars: usize) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());

    for span in spans {
        if span.end - span.start <= max_chars {
            out.push(span);
            continue;
        }

        // Sub-segment by sentence within this span; still-over pieces fall
        // back to whitespace splitting.
        for mut piece in sentence_spans(&chars[span.start..span.end]) {
            piece.start += span.start;
            piece.end += span.start;
            if piece.end - piece.start <= max_chars {
                out.push(piece);
            } else {
                split_at_whitespace(chars, piece, max_chars, &mut out);
            }
        }
    }

    out
}

/// Greedy split of one span into pieces of at most `max_chars`, preferring
/// the last whitespace before the limit.
fn split_at_whitespace(chars: &[char], span: Span, max_chars: usize, out: &mut Vec<Span>) {
    let mut start = span.start;

    while span.end - start > max_chars {
        let limit = start + max_chars;

        // Last whitespace position within the window, if any
        let ws = (start..=limit).rev().find(|&i| chars[i].is_whitespace());

        let (piece_end, next_start) = match ws {
            Some(w) if w > start => {
                // Break before the whitespace; it lands in the separator
                let mut next = w;
                while next < span.end && chars[next].is_whitespace() {
                    next += 1;
                }
                (w, next)
            }
            // No usable whitespace: hard split at the limit
            _ => (limit, limit),
        };

        push_trimmed(chars, start, piece_end, out);
        start = next_start;
    }

    push_trimmed(chars, start, span.end, out);
}

/// Count words: whitespace-separated runs for alphabetic scripts, one word
/// per character for CJK runs.
pub fn word_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    let mut word_has_alnum = false;

    for c in text.chars() {
        if is_cjk(c) {
            if in_word && word_has_alnum {
                count += 1;
            }
            in_word = false;
            word_has_alnum = false;
            count += 1;
        } else if c.is_whitespace() {
            if in_word && word_has_alnum {
                count += 1;
            }
            in_word = false;
            word_has_alnum = false;
        } else {
            in_word = true;
            if c.is_alphanumeric() {
                word_has_alnum = true;
            }
        }
    }
    if in_word && word_has_alnum {
        count += 1;
    }
    count
}

/// CJK unified ideographs plus kana
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
    )
}

/// Scan a segment's text for highlight spans (offsets relative to the text).
pub fn extract_highlights(text: &str) -> Vec<Highlight> {
    let chars: Vec<char> = text.chars().collect();
    let mut highlights = Vec::new();

    // Paired quotes: "…" and 「…」
    find_quote_pairs(&chars, '"', '"', &mut highlights);
    find_quote_pairs(&chars, '「', '」', &mut highlights);

    // Punctuation runs and ellipses
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '…' {
            highlights.push(highlight(i, i + 1, HighlightKind::Ellipsis, 0.4));
            i += 1;
        } else if c == '.' {
            let mut end = i + 1;
            while end < chars.len() && chars[end] == '.' {
                end += 1;
            }
            if end - i >= 3 {
                highlights.push(highlight(i, end, HighlightKind::Ellipsis, 0.4));
            }
            i = end;
        } else if c == '!' || c == '！' {
            let mut end = i + 1;
            while end < chars.len() && (chars[end] == '!' || chars[end] == '！') {
                end += 1;
            }
            highlights.push(highlight(i, end, HighlightKind::Exclaim, 0.9));
            i = end;
        } else if c == '?' || c == '？' {
            let mut end = i + 1;
            while end < chars.len() && (chars[end] == '?' || chars[end] == '？') {
                end += 1;
            }
            highlights.push(highlight(i, end, HighlightKind::Question, 0.6));
            i = end;
        } else {
            i += 1;
        }
    }

    // ASCII all-caps words of length >= 3
    let mut word_start = None;
    for (i, &c) in chars.iter().enumerate().chain(std::iter::once((chars.len(), &' '))) {
        let is_word_char = c.is_ascii_alphabetic();
        match (word_start, is_word_char) {
            (None, true) => word_start = Some(i),
            (Some(start), false) => {
                let len = i - start;
                if len >= 3 && chars[start..i].iter().all(|ch| ch.is_ascii_uppercase()) {
                    highlights.push(highlight(start, i, HighlightKind::Emphasis, 0.7));
                }
                word_start = None;
            }
            _ => {}
        }
    }

    highlights.sort_by_key(|h| (h.start_char, h.end_char));
    highlights
}

fn find_quote_pairs(chars: &[char], open: char, close: char, out: &mut Vec<Highlight>) {
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == open {
            if let Some(j) = (i + 1..chars.len()).find(|&j| chars[j] == close) {
                out.push(highlight(i, j + 1, HighlightKind::Quote, 0.5));
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
}

fn highlight(start: usize, end: usize, kind: HighlightKind, weight: f64) -> Highlight {
    Highlight {
        start_char: start,
        end_char: end,
        kind,
        weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|s| format!("{}{}", s.text, s.separator))
            .collect()
    }

    #[test]
    fn test_empty_input_returns_no_segments() {
        let seg = Segmenter::default();
        assert!(seg.segment("").is_empty());
        assert!(seg.segment("   \n\n  ").is_empty());
    }

    #[test]
    fn test_sentence_split_keeps_terminators() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Sentence);
        let segments = seg.segment("Hello there. How are you? Fine!");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Hello there.");
        assert_eq!(segments[1].text, "How are you?");
        assert_eq!(segments[2].text, "Fine!");
    }

    #[test]
    fn test_consecutive_terminators_collapse() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Sentence);
        let segments = seg.segment("What?! Really?!? Yes.");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "What?!");
        assert_eq!(segments[1].text, "Really?!?");
    }

    #[test]
    fn test_cjk_sentence_split() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Sentence);
        let segments = seg.segment("今天天氣真好！我很開心。");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "今天天氣真好！");
        assert_eq!(segments[1].text, "我很開心。");
        assert!(segments[0].word_count >= 6);
    }

    #[test]
    fn test_paragraph_split() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Paragraph);
        let segments = seg.segment("Para 1.\n\nPara 2.\n\nPara 3.");
        assert_eq!(segments.len(), 3);
        for s in &segments {
            assert!(s.word_count >= 1);
        }
        assert_eq!(segments[1].text, "Para 2.");
    }

    #[test]
    fn test_adaptive_picks_paragraph_with_enough_breaks() {
        let seg = Segmenter::default();
        let text = "One.\n\nTwo.\n\nThree.";
        assert_eq!(seg.effective_strategy(text), SegmentStrategy::Paragraph);

        let single = "One. Two. Three.";
        assert_eq!(seg.effective_strategy(single), SegmentStrategy::Sentence);
    }

    #[test]
    fn test_indices_are_dense_and_starts_increase() {
        let seg = Segmenter::default();
        let segments = seg.segment("A. B. C. D.");
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!(s.id, format!("seg-{}", i));
        }
        for pair in segments.windows(2) {
            assert!(pair[0].start_char < pair[1].start_char);
        }
    }

    #[test]
    fn test_reconstruction_sentence() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Sentence);
        let text = "First one. Second!  Third?\nTail without terminator";
        assert_eq!(reconstruct(&seg.segment(text)), text);
    }

    #[test]
    fn test_reconstruction_paragraph() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Paragraph);
        let text = "Para one line.\n\n\nPara two.\n\nPara three trailing.\n\n";
        assert_eq!(reconstruct(&seg.segment(text)), text);
    }

    #[test]
    fn test_max_chunk_one_char_still_reconstructs() {
        let seg = Segmenter::new(SegmentStrategy::Adaptive, 1, DEFAULT_READING_WPM);
        let text = "ab cd.";
        let segments = seg.segment(text);
        for s in &segments {
            assert!(s.text.chars().count() <= 1, "segment too long: {:?}", s.text);
        }
        assert_eq!(reconstruct(&segments), text);
    }

    #[test]
    fn test_long_sentence_splits_at_whitespace() {
        let seg = Segmenter::new(SegmentStrategy::Sentence, 20, DEFAULT_READING_WPM);
        let text = "this is a rather long sentence without any terminator to split";
        let segments = seg.segment(text);
        assert!(segments.len() > 1);
        for s in &segments {
            assert!(s.text.chars().count() <= 20);
        }
        assert_eq!(reconstruct(&segments), text);
    }

    #[test]
    fn test_durations_are_cumulative() {
        let seg = Segmenter::default();
        let segments = seg.segment("one two three. four five six.");
        assert_eq!(segments[0].start_seconds, 0.0);
        let expected = segments[0].est_duration_seconds;
        assert!((segments[1].start_seconds - expected).abs() < 1e-9);
        // 3 words at 200 wpm = 0.9 seconds
        assert!((segments[0].est_duration_seconds - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_reading_wpm_override() {
        let seg = Segmenter::default().with_reading_wpm(100);
        let segments = seg.segment("one two three.");
        assert!((segments[0].est_duration_seconds - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_highlight_quote() {
        let hs = extract_highlights("She said \"never again\" firmly.");
        let quote = hs.iter().find(|h| h.kind == HighlightKind::Quote).unwrap();
        assert!((quote.weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_highlight_cjk_quote() {
        let hs = extract_highlights("他說「好」然後走了");
        assert!(hs.iter().any(|h| h.kind == HighlightKind::Quote));
    }

    #[test]
    fn test_highlight_exclaim_and_question() {
        let hs = extract_highlights("What! Really? 好！嗎？");
        let exclaims = hs.iter().filter(|h| h.kind == HighlightKind::Exclaim).count();
        let questions = hs.iter().filter(|h| h.kind == HighlightKind::Question).count();
        assert_eq!(exclaims, 2);
        assert_eq!(questions, 2);
    }

    #[test]
    fn test_highlight_ellipsis_forms() {
        let hs = extract_highlights("Wait… or maybe...");
        let ellipses: Vec<_> = hs
            .iter()
            .filter(|h| h.kind == HighlightKind::Ellipsis)
            .collect();
        assert_eq!(ellipses.len(), 2);
        for e in ellipses {
            assert!((e.weight - 0.4).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_highlight_all_caps_emphasis() {
        let hs = extract_highlights("This is VERY important but OK is too short? no, two chars");
        let emphasis: Vec<_> = hs
            .iter()
            .filter(|h| h.kind == HighlightKind::Emphasis)
            .collect();
        assert_eq!(emphasis.len(), 1);
        assert!((emphasis[0].weight - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_word_count_mixed_scripts() {
        assert_eq!(word_count("hello world"), 2);
        assert_eq!(word_count("今天天氣"), 4);
        assert_eq!(word_count("read 書 now"), 3);
        assert_eq!(word_count("！"), 0);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_whitespace_only_middle_ranges_absorbed() {
        let seg = Segmenter::with_strategy(SegmentStrategy::Paragraph);
        let text = "A.\n\n   \n\nB.";
        let segments = seg.segment(text);
        assert_eq!(segments.len(), 2);
        assert_eq!(reconstruct(&segments), text);
    }
}
