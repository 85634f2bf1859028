/*!
 * Backend collaborators consumed by the session engine.
 *
 * Each collaborator is a small async trait so the engine can be driven by
 * any backend:
 * - `http`: the subtitle backend's JSON API
 * - `mock`: an in-memory corpus for tests and offline play
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::models::{CatalogStatus, ClipReference, CorpusSelection, SentenceCandidate};

pub mod http;
pub mod mock;

/// Random-sentence sampler
#[async_trait]
pub trait SentenceSampler: Send + Sync + Debug {
    /// Return `count` random sentences from the selected corpora
    async fn sample_random(
        &self,
        count: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError>;
}

/// Search/Index service
#[async_trait]
pub trait SentenceSearch: Send + Sync + Debug {
    /// Search the selected corpora
    ///
    /// # Arguments
    /// * `query` - Plain substring, or an anchored pattern such as `^走` when `anchored` is set
    /// * `anchored` - Whether `query` is a pattern rather than a literal
    /// * `corpora` - Corpus partitions to search
    async fn search(
        &self,
        query: &str,
        anchored: bool,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError>;
}

/// Rhyme service
#[async_trait]
pub trait RhymeFinder: Send + Sync + Debug {
    /// Sentences whose final rhyme matches `text`
    async fn find_rhyming(
        &self,
        text: &str,
        min_length: usize,
        max_length: usize,
        limit: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError>;
}

/// Dialogue service
#[async_trait]
pub trait DialogueResponder: Send + Sync + Debug {
    /// Plausible responses to `text`, spoken in `corpus_id`/`episode_id`
    async fn find_dialogue_responses(
        &self,
        text: &str,
        corpus_id: &str,
        episode_id: &str,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError>;
}

/// Clip renderer
#[async_trait]
pub trait ClipRenderer: Send + Sync + Debug {
    /// Render `start..end` of an episode with `padding` seconds on both sides
    async fn render_clip(
        &self,
        corpus_id: &str,
        episode_id: &str,
        start: f64,
        end: f64,
        padding: f64,
    ) -> Result<ClipReference, ServiceError>;
}

/// Clip merger
#[async_trait]
pub trait ClipMerger: Send + Sync + Debug {
    /// Concatenate clips in order
    async fn merge_clips(&self, clips: &[ClipReference]) -> Result<ClipReference, ServiceError>;
}

/// Backend status and corpus catalog
#[async_trait]
pub trait CatalogService: Send + Sync + Debug {
    async fn catalog_status(&self) -> Result<CatalogStatus, ServiceError>;
}

/// A backend implementing every collaborator
pub trait SubtitleBackend:
    SentenceSampler
    + SentenceSearch
    + RhymeFinder
    + DialogueResponder
    + ClipRenderer
    + ClipMerger
    + CatalogService
{
}

impl<T> SubtitleBackend for T where
    T: SentenceSampler
        + SentenceSearch
        + RhymeFinder
        + DialogueResponder
        + ClipRenderer
        + ClipMerger
        + CatalogService
{
}

/// Handles to every collaborator, shareable across tasks
#[derive(Debug, Clone)]
pub struct Services {
    pub sampler: Arc<dyn SentenceSampler>,
    pub search: Arc<dyn SentenceSearch>,
    pub rhyme: Arc<dyn RhymeFinder>,
    pub dialogue: Arc<dyn DialogueResponder>,
    pub renderer: Arc<dyn ClipRenderer>,
    pub merger: Arc<dyn ClipMerger>,
    pub catalog: Arc<dyn CatalogService>,
}

impl Services {
    /// Route every collaborator to the same backend
    pub fn from_backend<B: SubtitleBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            sampler: backend.clone(),
            search: backend.clone(),
            rhyme: backend.clone(),
            dialogue: backend.clone(),
            renderer: backend.clone(),
            merger: backend.clone(),
            catalog: backend,
        }
    }
}
