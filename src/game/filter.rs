/*!
 * Text filters applied to candidate sentences.
 *
 * This module provides the pure text functions the candidate sources rely on:
 * - Trailing filler particle stripping
 * - Anchor character extraction for chain mode
 * - Length window checks
 * - Coarse rhetorical classification of a sentence
 */

use serde::{Deserialize, Serialize};

/// Sentence-final particles that end an utterance without adding content
pub const FILLER_PARTICLES: [char; 16] = [
    '啊', '呢', '吗', '吧', '呀', '嘛', '哦', '哎', '嗯', '呐', '呵', '呦', '诶', '哈', '哟', '了',
];

const QUESTION_MARKERS: [&str; 4] = ["?", "？", "吗", "呢"];
const COMMAND_WORDS: [&str; 7] = ["去", "来", "给我", "快", "立刻", "马上", "传"];
const POSITIVE_WORDS: [&str; 8] = ["好", "愿意", "可以", "是", "对", "喜欢", "爱", "高兴"];
const NEGATIVE_WORDS: [&str; 8] = ["不", "没", "别", "莫", "拒绝", "难过", "恨", "讨厌"];

/// Coarse rhetorical type of a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentenceType {
    Question,
    Command,
    Positive,
    Negative,
    Neutral,
}

impl SentenceType {
    /// Label shown next to a candidate
    pub fn label(&self) -> &'static str {
        match self {
            Self::Question => "疑问句",
            Self::Command => "命令句",
            Self::Positive => "积极句",
            Self::Negative => "消极句",
            Self::Neutral => "普通句",
        }
    }
}

/// Inclusive bounds on the stripped character length of a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

impl LengthBounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(&self, text: &str) -> bool {
        length_window(text, self.min, self.max)
    }
}

/// Remove at most one trailing filler particle
pub fn strip_trailing_filler(text: &str) -> &str {
    match text.chars().next_back() {
        Some(last) if FILLER_PARTICLES.contains(&last) => &text[..text.len() - last.len_utf8()],
        _ => text,
    }
}

/// Last character of the filler-stripped text
pub fn anchor_char(text: &str) -> Option<char> {
    strip_trailing_filler(text).chars().next_back()
}

/// Whether the filler-stripped text has between `min` and `max` characters
pub fn length_window(text: &str, min: usize, max: usize) -> bool {
    let len = strip_trailing_filler(text).chars().count();
    (min..=max).contains(&len)
}

/// Classify a sentence; checks run in a fixed priority order
pub fn classify(text: &str) -> SentenceType {
    let contains_any = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if text.is_empty() {
        SentenceType::Neutral
    } else if contains_any(&QUESTION_MARKERS) {
        SentenceType::Question
    } else if contains_any(&COMMAND_WORDS) {
        SentenceType::Command
    } else if contains_any(&POSITIVE_WORDS) {
        SentenceType::Positive
    } else if contains_any(&NEGATIVE_WORDS) {
        SentenceType::Negative
    } else {
        SentenceType::Neutral
    }
}
