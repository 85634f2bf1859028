/*!
 * Domain models shared by the engine, the services and the display layer.
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Game mode, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// 字幕接龙: the next sentence starts with the last character of the previous one
    Chain,
    /// 字幕押韵: the next sentence rhymes with the previous one
    Rhyme,
    /// 奇妙对话: the next sentence answers the previous one
    Dialogue,
}

impl GameMode {
    /// Title shown by the adapter
    pub fn title(&self) -> &'static str {
        match self {
            Self::Chain => "字幕接龙",
            Self::Rhyme => "字幕押韵",
            Self::Dialogue => "奇妙对话",
        }
    }

    /// File name offered for the merged video
    pub fn export_file_name(&self) -> &'static str {
        match self {
            Self::Chain => "接龙视频.mp4",
            Self::Rhyme => "押韵视频.mp4",
            Self::Dialogue => "对话视频.mp4",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chain => "chain",
            Self::Rhyme => "rhyme",
            Self::Dialogue => "dialogue",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for GameMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "chain" => Ok(Self::Chain),
            "rhyme" => Ok(Self::Rhyme),
            "dialogue" => Ok(Self::Dialogue),
            _ => Err(anyhow::anyhow!("Invalid game mode: {}", s)),
        }
    }
}

/// One subtitle line from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceCandidate {
    /// Corpus (drama) the line belongs to
    pub corpus_id: String,
    /// Episode within the corpus
    pub episode_id: String,
    /// Subtitle text
    pub text: String,
    /// Start time in seconds
    pub start_seconds: f64,
    /// End time in seconds
    pub end_seconds: f64,
    /// Dialogue-mode match score in 0..1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

/// Identity of a sentence: a corpus cannot hold two lines starting at the same
/// instant of the same episode
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SentenceKey {
    pub corpus_id: String,
    pub episode_id: String,
    pub start_millis: i64,
}

impl SentenceCandidate {
    /// Create a new candidate without a match score
    pub fn new(
        corpus_id: impl Into<String>,
        episode_id: impl Into<String>,
        text: impl Into<String>,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Self {
        Self {
            corpus_id: corpus_id.into(),
            episode_id: episode_id.into(),
            text: text.into(),
            start_seconds,
            end_seconds,
            match_score: None,
        }
    }

    /// Attach a match score
    pub fn with_score(mut self, score: f64) -> Self {
        self.match_score = Some(score);
        self
    }

    pub fn key(&self) -> SentenceKey {
        SentenceKey {
            corpus_id: self.corpus_id.clone(),
            episode_id: self.episode_id.clone(),
            start_millis: (self.start_seconds * 1000.0).round() as i64,
        }
    }

    /// Value identity used for selection highlighting
    pub fn is_same_line(&self, other: &SentenceCandidate) -> bool {
        self.key() == other.key()
    }

    /// Check the attribute constraints, returning the violated one
    pub fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("empty text".to_string());
        }
        let negative = |t: f64| t.is_nan() || t < 0.0;
        if negative(self.start_seconds) || negative(self.end_seconds) {
            return Err(format!(
                "negative time {}..{}",
                self.start_seconds, self.end_seconds
            ));
        }
        if self.end_seconds < self.start_seconds {
            return Err(format!(
                "end {} before start {}",
                self.end_seconds, self.start_seconds
            ));
        }
        if let Some(score) = self.match_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(format!("match score {} outside 0..1", score));
            }
        }
        Ok(())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Opaque handle to a rendered video segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipReference(String);

impl ClipReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One confirmed step of the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The confirmed sentence
    pub sentence: SentenceCandidate,
    /// 1-based position in the session
    pub step: usize,
    /// Clip rendered for the sentence
    pub clip: ClipReference,
}

/// Set of corpus ids eligible for sampling and searching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusSelection(BTreeSet<String>);

impl CorpusSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, corpus_id: &str) -> bool {
        self.0.contains(corpus_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Add the corpus if absent, remove it if present
    pub fn toggle(&mut self, corpus_id: &str) {
        if !self.0.remove(corpus_id) {
            self.0.insert(corpus_id.to_string());
        }
    }

    /// Select every corpus of the catalog, or clear the selection when all
    /// of them are already selected
    pub fn toggle_all(&mut self, corpora: &[CorpusInfo]) {
        let all_selected = !corpora.is_empty() && corpora.iter().all(|c| self.0.contains(&c.id));
        if all_selected {
            self.0.clear();
        } else {
            self.0 = corpora.iter().map(|c| c.id.clone()).collect();
        }
    }

    /// Comma-joined form used by the backend's `drama_ids` parameter
    pub fn to_param(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for CorpusSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Episode numbering of a corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRange {
    pub start: u32,
    pub end: u32,
}

/// One selectable corpus partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub episodes: Option<EpisodeRange>,
}

/// Per-corpus statistics reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub episode_count: usize,
    pub subtitle_count: usize,
}

/// Backend status and corpus catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatus {
    pub status: String,
    #[serde(rename = "dramas", default)]
    pub corpora: Vec<CorpusInfo>,
    #[serde(rename = "drama_stats", default)]
    pub stats: HashMap<String, CorpusStats>,
    #[serde(default)]
    pub total_episodes: usize,
    #[serde(default)]
    pub total_subtitles: usize,
}

impl CatalogStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Selection holding every corpus of the catalog
    pub fn select_all(&self) -> CorpusSelection {
        self.corpora.iter().map(|c| c.id.clone()).collect()
    }

    /// Display name of a corpus, falling back to its id
    pub fn corpus_name<'a>(&'a self, corpus_id: &'a str) -> &'a str {
        self.corpora
            .iter()
            .find(|c| c.id == corpus_id)
            .map(|c| c.name.as_str())
            .unwrap_or(corpus_id)
    }
}
