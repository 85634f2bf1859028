/*!
 * In-memory backend for tests and offline play.
 *
 * `MockBackend` serves a fixed list of sentences and simulates the behaviors
 * the engine has to cope with:
 * - `MockBehavior::Working` - every call succeeds
 * - `MockBehavior::Failing` - every call fails
 * - `MockBehavior::FailingClips` - clip rendering fails, everything else works
 * - `MockBehavior::FailingMerge` - merging fails, everything else works
 * - `MockBehavior::Slow` - every call succeeds after a delay
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::game::filter::{anchor_char, classify, length_window};
use crate::models::{
    CatalogStatus, ClipReference, CorpusInfo, CorpusSelection, CorpusStats, SentenceCandidate,
};
use crate::services::{
    CatalogService, ClipMerger, ClipRenderer, DialogueResponder, RhymeFinder, SentenceSampler,
    SentenceSearch,
};

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    Working,
    Failing,
    FailingClips,
    FailingMerge,
    /// Succeeds after `delay_ms`
    Slow { delay_ms: u64 },
}

/// Record of the calls the backend received
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub samples: usize,
    /// `(query, anchored)` of every search
    pub searches: Vec<(String, bool)>,
    pub rhymes: usize,
    pub dialogues: usize,
    pub renders: usize,
    /// Clip lists of every merge request
    pub merges: Vec<Vec<ClipReference>>,
    pub catalog: usize,
}

/// In-memory backend serving a fixed corpus
#[derive(Debug, Clone)]
pub struct MockBackend {
    sentences: Vec<SentenceCandidate>,
    names: BTreeMap<String, String>,
    behavior: MockBehavior,
    /// Anchored searches return nothing, forcing the plain-query fallback
    blind_anchored_search: bool,
    /// When set, samples are drawn at random instead of in corpus order
    sample_rng: Option<Arc<Mutex<StdRng>>>,
    calls: Arc<Mutex<CallLog>>,
}

impl MockBackend {
    /// Create a working backend serving `sentences`
    pub fn new(sentences: Vec<SentenceCandidate>) -> Self {
        Self {
            sentences,
            names: BTreeMap::new(),
            behavior: MockBehavior::Working,
            blind_anchored_search: false,
            sample_rng: None,
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Backend serving the built-in demo corpus
    pub fn demo() -> Self {
        Self::new(demo_corpus())
            .with_corpus_name("zhenhuan", "甄嬛传")
            .with_corpus_name("lurk", "潜伏")
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_corpus_name(mut self, id: &str, name: &str) -> Self {
        self.names.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_blind_anchored_search(mut self) -> Self {
        self.blind_anchored_search = true;
        self
    }

    /// Draw random samples from `rng`, so every prompt refresh shows a new batch
    pub fn with_shuffled_samples(mut self, rng: StdRng) -> Self {
        self.sample_rng = Some(Arc::new(Mutex::new(rng)));
        self
    }

    /// Snapshot of the calls received so far
    pub fn calls(&self) -> CallLog {
        self.calls.lock().clone()
    }

    async fn enter(&self, clip_call: bool, merge_call: bool) -> Result<(), ServiceError> {
        match self.behavior {
            MockBehavior::Working => Ok(()),
            MockBehavior::Failing => Err(ServiceError::ApiError {
                status_code: 500,
                message: "Simulated backend failure".to_string(),
            }),
            MockBehavior::FailingClips if clip_call => Err(ServiceError::ApiError {
                status_code: 500,
                message: "视频片段生成失败".to_string(),
            }),
            MockBehavior::FailingMerge if merge_call => Err(ServiceError::ApiError {
                status_code: 500,
                message: "视频片段合并失败".to_string(),
            }),
            MockBehavior::FailingClips | MockBehavior::FailingMerge => Ok(()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(())
            }
        }
    }

    fn in_corpora<'a>(
        &'a self,
        corpora: &'a CorpusSelection,
    ) -> impl Iterator<Item = &'a SentenceCandidate> + 'a {
        self.sentences
            .iter()
            .filter(move |s| corpora.is_empty() || corpora.contains(&s.corpus_id))
    }
}

#[async_trait]
impl SentenceSampler for MockBackend {
    async fn sample_random(
        &self,
        count: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        self.calls.lock().samples += 1;
        self.enter(false, false).await?;
        let eligible: Vec<&SentenceCandidate> = self
            .in_corpora(corpora)
            .filter(|s| length_window(&s.text, 3, 8))
            .collect();
        let sample = match &self.sample_rng {
            Some(rng) => eligible
                .choose_multiple(&mut *rng.lock(), count)
                .map(|s| (*s).clone())
                .collect(),
            None => eligible.into_iter().take(count).cloned().collect(),
        };
        Ok(sample)
    }
}

#[async_trait]
impl SentenceSearch for MockBackend {
    async fn search(
        &self,
        query: &str,
        anchored: bool,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        self.calls.lock().searches.push((query.to_string(), anchored));
        self.enter(false, false).await?;

        if anchored && self.blind_anchored_search {
            return Ok(Vec::new());
        }

        let pattern = if anchored { Regex::new(query).ok() } else { None };
        Ok(self
            .in_corpora(corpora)
            .filter(|s| match &pattern {
                Some(re) => re.is_match(&s.text),
                None => s.text.contains(query),
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RhymeFinder for MockBackend {
    async fn find_rhyming(
        &self,
        text: &str,
        min_length: usize,
        max_length: usize,
        limit: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        self.calls.lock().rhymes += 1;
        self.enter(false, false).await?;

        // Same final character stands in for same final rhyme
        let Some(last) = anchor_char(text) else {
            return Ok(Vec::new());
        };
        Ok(self
            .in_corpora(corpora)
            .filter(|s| s.text != text)
            .filter(|s| anchor_char(&s.text) == Some(last))
            .filter(|s| length_window(&s.text, min_length, max_length))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DialogueResponder for MockBackend {
    async fn find_dialogue_responses(
        &self,
        text: &str,
        corpus_id: &str,
        episode_id: &str,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        self.calls.lock().dialogues += 1;
        self.enter(false, false).await?;

        let source_type = classify(text);
        let mut responses: Vec<SentenceCandidate> = self
            .in_corpora(corpora)
            .filter(|s| !(s.corpus_id == corpus_id && s.episode_id == episode_id))
            .map(|s| {
                let score = if classify(&s.text) == source_type { 0.3 } else { 0.8 };
                s.clone().with_score(score)
            })
            .collect();
        responses.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        responses.truncate(8);
        Ok(responses)
    }
}

#[async_trait]
impl ClipRenderer for MockBackend {
    async fn render_clip(
        &self,
        corpus_id: &str,
        episode_id: &str,
        start: f64,
        end: f64,
        padding: f64,
    ) -> Result<ClipReference, ServiceError> {
        self.calls.lock().renders += 1;
        self.enter(true, false).await?;
        Ok(ClipReference::new(format!(
            "mock://clips/{}/{}/{:.3}-{:.3}+{}",
            corpus_id, episode_id, start, end, padding
        )))
    }
}

#[async_trait]
impl ClipMerger for MockBackend {
    async fn merge_clips(&self, clips: &[ClipReference]) -> Result<ClipReference, ServiceError> {
        let merge_number = {
            let mut calls = self.calls.lock();
            calls.merges.push(clips.to_vec());
            calls.merges.len()
        };
        self.enter(false, true).await?;
        if clips.len() < 2 {
            return Err(ServiceError::ApiError {
                status_code: 400,
                message: "至少需要两个视频片段URL".to_string(),
            });
        }
        Ok(ClipReference::new(format!(
            "mock://merged/{}-{}-clips.mp4",
            merge_number,
            clips.len()
        )))
    }
}

#[async_trait]
impl CatalogService for MockBackend {
    async fn catalog_status(&self) -> Result<CatalogStatus, ServiceError> {
        self.calls.lock().catalog += 1;
        self.enter(false, false).await?;

        let mut stats: BTreeMap<String, (std::collections::BTreeSet<&str>, usize)> = BTreeMap::new();
        for sentence in &self.sentences {
            let entry = stats.entry(sentence.corpus_id.clone()).or_default();
            entry.0.insert(sentence.episode_id.as_str());
            entry.1 += 1;
        }

        let corpora = stats
            .keys()
            .map(|id| CorpusInfo {
                id: id.clone(),
                name: self.names.get(id).cloned().unwrap_or_else(|| id.clone()),
                episodes: None,
            })
            .collect();
        let stats: std::collections::HashMap<String, CorpusStats> = stats
            .into_iter()
            .map(|(id, (episodes, subtitles))| {
                (
                    id,
                    CorpusStats {
                        episode_count: episodes.len(),
                        subtitle_count: subtitles,
                    },
                )
            })
            .collect();

        Ok(CatalogStatus {
            status: "ok".to_string(),
            corpora,
            total_episodes: stats.values().map(|s| s.episode_count).sum(),
            total_subtitles: stats.values().map(|s| s.subtitle_count).sum(),
            stats,
        })
    }
}

/// Small two-corpus sample used by demos and tests
pub fn demo_corpus() -> Vec<SentenceCandidate> {
    let lines: [(&str, &str, &str, f64); 20] = [
        ("zhenhuan", "后宫·甄嬛传01", "臣妾做不到啊", 12.0),
        ("zhenhuan", "后宫·甄嬛传01", "到底是谁干的", 20.5),
        ("zhenhuan", "后宫·甄嬛传01", "谁在外面", 31.0),
        ("zhenhuan", "后宫·甄嬛传01", "面子要紧", 40.2),
        ("zhenhuan", "后宫·甄嬛传01", "紧要关头", 48.0),
        ("zhenhuan", "后宫·甄嬛传02", "头疼得厉害", 5.0),
        ("zhenhuan", "后宫·甄嬛传02", "害得我好苦", 14.0),
        ("zhenhuan", "后宫·甄嬛传02", "你怎么来了", 22.0),
        ("zhenhuan", "后宫·甄嬛传02", "走着瞧吧", 30.0),
        ("zhenhuan", "后宫·甄嬛传02", "我们走", 39.0),
        ("zhenhuan", "后宫·甄嬛传02", "好好活着", 47.5),
        ("lurk", "潜伏E01", "走一步看一步", 3.0),
        ("lurk", "潜伏E01", "走吧", 9.0),
        ("lurk", "潜伏E01", "步步为营", 15.0),
        ("lurk", "潜伏E01", "营救计划失败了", 21.0),
        ("lurk", "潜伏E02", "你好吗", 2.0),
        ("lurk", "潜伏E02", "不许动", 8.5),
        ("lurk", "潜伏E02", "动手吧", 14.0),
        ("lurk", "潜伏E02", "我愿意等", 20.0),
        ("lurk", "潜伏E02", "等一等", 26.0),
    ];

    lines
        .iter()
        .map(|(corpus, episode, text, start)| {
            SentenceCandidate::new(*corpus, *episode, *text, *start, start + 2.5)
        })
        .collect()
}
