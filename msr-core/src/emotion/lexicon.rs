//! Keyword lexicon scoring over the seven emotion labels
//!
//! The lexicon covers English and Traditional-Chinese keywords plus the
//! emoji the mobile clients commonly send. Scoring is plain substring
//! occurrence counting; the intent is a cheap, deterministic fallback that a
//! remote classifier can replace wholesale.

use msr_common::model::{EmotionLabel, EmotionReading, EmotionSource};
use msr_common::time::now_unix;

/// Per-label keyword lists
fn keywords(label: EmotionLabel) -> &'static [&'static str] {
    match label {
        EmotionLabel::Happy => &[
            "happy", "joy", "delighted", "pleased", "cheerful", "glad", "wonderful",
            "开心", "開心", "快樂", "快乐", "高興", "高兴", "喜悅", "😊", "😄", "🎉",
        ],
        EmotionLabel::Sad => &[
            "sad", "unhappy", "depressed", "melancholy", "sorrowful", "grief", "cry",
            "難過", "难过", "傷心", "伤心", "悲傷", "😢", "😞",
        ],
        EmotionLabel::Angry => &[
            "angry", "furious", "enraged", "mad", "irritated", "rage",
            "生氣", "生气", "憤怒", "愤怒", "😠", "😡",
        ],
        EmotionLabel::Fear => &[
            "afraid", "scared", "terrified", "fear", "anxious", "dread",
            "害怕", "恐懼", "恐惧", "緊張", "紧张", "😨",
        ],
        EmotionLabel::Surprise => &[
            "surprised", "astonished", "amazed", "unexpected", "sudden",
            "驚訝", "惊讶", "驚喜", "😲", "✨",
        ],
        EmotionLabel::Disgust => &[
            "disgusting", "gross", "revolting", "nauseating",
            "噁心", "恶心", "討厭", "讨厌", "🤢",
        ],
        EmotionLabel::Neutral => &[],
    }
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
fn occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Score text against the lexicon and produce a reading.
///
/// No keyword hit collapses to `neutral` with intensity 0.5.
pub fn score_text(text: &str) -> EmotionReading {
    let lowered = text.to_lowercase();

    let mut scores: Vec<(EmotionLabel, usize)> = EmotionLabel::ALL
        .iter()
        .filter(|l| **l != EmotionLabel::Neutral)
        .map(|l| {
            let hits = keywords(*l)
                .iter()
                .map(|k| occurrences(&lowered, k))
                .sum::<usize>();
            (*l, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();

    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| (a.0 as u8).cmp(&(b.0 as u8))));

    let ts = now_unix();
    match scores.first().copied() {
        None => EmotionReading::new(
            EmotionLabel::Neutral,
            0.5,
            vec![],
            "lexicon:no-match",
            EmotionSource::Text,
            0.3,
            ts,
        ),
        Some((primary, hits)) => {
            let secondary: Vec<EmotionLabel> =
                scores.iter().skip(1).take(3).map(|(l, _)| *l).collect();
            let intensity = 0.5 + 0.1 * hits as f64;
            let confidence = 0.4 + 0.15 * hits as f64;
            EmotionReading::new(
                primary,
                intensity,
                secondary,
                format!("lexicon:{} hits={}", primary, hits),
                EmotionSource::Text,
                confidence,
                ts,
            )
        }
    }
}
