/*!
 * Candidate sources, one per game mode.
 *
 * A source produces the sentences offered after the current one:
 * - `ChainSource`: sentences starting with the current sentence's anchor character
 * - `RhymeSource`: sentences rhyming with the current sentence
 * - `DialogueSource`: sentences answering the current sentence
 *
 * All three draw their opening prompts from the random-sentence sampler.
 */

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::GameConfig;
use crate::errors::GameError;
use crate::game::filter::{LengthBounds, anchor_char};
use crate::models::{CorpusSelection, GameMode, SentenceCandidate};
use crate::services::{DialogueResponder, RhymeFinder, SentenceSampler, SentenceSearch, Services};

/// Strategy producing candidate sentences for one game mode
#[async_trait]
pub trait CandidateSource: Send + Sync + Debug {
    /// Mode this source implements
    fn mode(&self) -> GameMode;

    /// Sampler used for opening prompts
    fn sampler(&self) -> &Arc<dyn SentenceSampler>;

    /// Candidates that may follow `sentence`
    ///
    /// An empty result is not an error: it means no continuation was found.
    async fn fetch_next(
        &self,
        sentence: &SentenceCandidate,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, GameError>;

    /// Random opening sentences
    async fn fetch_prompts(
        &self,
        corpora: &CorpusSelection,
        count: usize,
    ) -> Result<Vec<SentenceCandidate>, GameError> {
        ensure_corpora(corpora)?;
        let prompts = self.sampler().sample_random(count, corpora).await?;
        debug!("Sampled {} prompts from {} corpora", prompts.len(), corpora.len());
        Ok(prompts)
    }
}

fn ensure_corpora(corpora: &CorpusSelection) -> Result<(), GameError> {
    if corpora.is_empty() {
        Err(GameError::EmptyCorpusSelection)
    } else {
        Ok(())
    }
}

/// Chain mode: continue with a sentence starting with the anchor character
#[derive(Debug)]
pub struct ChainSource {
    sampler: Arc<dyn SentenceSampler>,
    search: Arc<dyn SentenceSearch>,
    window: LengthBounds,
    display_cap: usize,
    rng: Mutex<StdRng>,
}

impl ChainSource {
    pub fn new(
        sampler: Arc<dyn SentenceSampler>,
        search: Arc<dyn SentenceSearch>,
        window: LengthBounds,
        display_cap: usize,
    ) -> Self {
        Self::with_rng(sampler, search, window, display_cap, StdRng::from_os_rng())
    }

    /// Create a source drawing its samples from `rng`
    pub fn with_rng(
        sampler: Arc<dyn SentenceSampler>,
        search: Arc<dyn SentenceSearch>,
        window: LengthBounds,
        display_cap: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            sampler,
            search,
            window,
            display_cap,
            rng: Mutex::new(rng),
        }
    }

    fn continues(&self, candidate: &SentenceCandidate, anchor: char) -> bool {
        candidate.text.starts_with(anchor) && self.window.accepts(&candidate.text)
    }

    /// Uniform sample without replacement, capped to the display count
    fn sample(&self, mut candidates: Vec<SentenceCandidate>) -> Vec<SentenceCandidate> {
        candidates.shuffle(&mut *self.rng.lock());
        candidates.truncate(self.display_cap);
        candidates
    }
}

#[async_trait]
impl CandidateSource for ChainSource {
    fn mode(&self) -> GameMode {
        GameMode::Chain
    }

    fn sampler(&self) -> &Arc<dyn SentenceSampler> {
        &self.sampler
    }

    async fn fetch_next(
        &self,
        sentence: &SentenceCandidate,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, GameError> {
        ensure_corpora(corpora)?;
        let anchor = anchor_char(&sentence.text).ok_or_else(|| GameError::NoAnchorChar {
            text: sentence.text.clone(),
        })?;

        let pattern = format!("^{}", regex::escape(&anchor.to_string()));
        let anchored = self.search.search(&pattern, true, corpora).await?;
        let total = anchored.len();
        let mut matches: Vec<SentenceCandidate> = anchored
            .into_iter()
            .filter(|c| self.continues(c, anchor))
            .collect();
        debug!("Anchored search for {:?}: {} results, {} kept", anchor, total, matches.len());

        if matches.is_empty() {
            // Approximation: prefix-filter an unanchored search locally
            let plain = self.search.search(&anchor.to_string(), false, corpora).await?;
            let total = plain.len();
            matches = plain
                .into_iter()
                .filter(|c| self.continues(c, anchor))
                .collect();
            debug!("Plain search for {:?}: {} results, {} kept", anchor, total, matches.len());
        }

        if matches.is_empty() {
            info!("No sentence starts with {:?}", anchor);
            return Ok(matches);
        }
        Ok(self.sample(matches))
    }
}

/// Rhyme mode: delegate to the rhyme service
#[derive(Debug)]
pub struct RhymeSource {
    sampler: Arc<dyn SentenceSampler>,
    rhyme: Arc<dyn RhymeFinder>,
    window: LengthBounds,
    limit: usize,
}

impl RhymeSource {
    pub fn new(
        sampler: Arc<dyn SentenceSampler>,
        rhyme: Arc<dyn RhymeFinder>,
        window: LengthBounds,
        limit: usize,
    ) -> Self {
        Self {
            sampler,
            rhyme,
            window,
            limit,
        }
    }
}

#[async_trait]
impl CandidateSource for RhymeSource {
    fn mode(&self) -> GameMode {
        GameMode::Rhyme
    }

    fn sampler(&self) -> &Arc<dyn SentenceSampler> {
        &self.sampler
    }

    async fn fetch_next(
        &self,
        sentence: &SentenceCandidate,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, GameError> {
        ensure_corpora(corpora)?;
        let rhymes = self
            .rhyme
            .find_rhyming(
                &sentence.text,
                self.window.min,
                self.window.max,
                self.limit,
                corpora,
            )
            .await?;
        debug!("Rhyme service returned {} sentences", rhymes.len());
        Ok(rhymes)
    }
}

/// Dialogue mode: delegate to the dialogue service, keeping its order
#[derive(Debug)]
pub struct DialogueSource {
    sampler: Arc<dyn SentenceSampler>,
    dialogue: Arc<dyn DialogueResponder>,
}

impl DialogueSource {
    pub fn new(sampler: Arc<dyn SentenceSampler>, dialogue: Arc<dyn DialogueResponder>) -> Self {
        Self { sampler, dialogue }
    }
}

#[async_trait]
impl CandidateSource for DialogueSource {
    fn mode(&self) -> GameMode {
        GameMode::Dialogue
    }

    fn sampler(&self) -> &Arc<dyn SentenceSampler> {
        &self.sampler
    }

    async fn fetch_next(
        &self,
        sentence: &SentenceCandidate,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, GameError> {
        ensure_corpora(corpora)?;
        let responses = self
            .dialogue
            .find_dialogue_responses(
                &sentence.text,
                &sentence.corpus_id,
                &sentence.episode_id,
                corpora,
            )
            .await?;
        debug!("Dialogue service returned {} responses", responses.len());
        Ok(responses)
    }
}

/// Build the source for `mode` from the configured services
pub fn build_source(mode: GameMode, services: &Services, config: &GameConfig) -> Arc<dyn CandidateSource> {
    match mode {
        GameMode::Chain => Arc::new(ChainSource::new(
            services.sampler.clone(),
            services.search.clone(),
            config.chain_window(),
            config.display_cap,
        )),
        GameMode::Rhyme => Arc::new(RhymeSource::new(
            services.sampler.clone(),
            services.rhyme.clone(),
            config.rhyme_window(),
            config.rhyme_limit,
        )),
        GameMode::Dialogue => Arc::new(DialogueSource::new(
            services.sampler.clone(),
            services.dialogue.clone(),
        )),
    }
}
