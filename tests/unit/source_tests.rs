/*!
 * Tests for the per-mode candidate sources
 */

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use subchain::app_config::GameConfig;
use subchain::errors::GameError;
use subchain::game::filter::LengthBounds;
use subchain::game::source::{CandidateSource, ChainSource, DialogueSource, RhymeSource, build_source};
use subchain::models::{CorpusSelection, GameMode, SentenceCandidate};
use subchain::services::mock::{MockBackend, MockBehavior};

use crate::common::{self, TEST_SEED, all_corpora, demo_line};

fn chain_source(backend: &MockBackend, display_cap: usize) -> ChainSource {
    let backend = Arc::new(backend.clone());
    ChainSource::with_rng(
        backend.clone(),
        backend,
        LengthBounds::new(3, 8),
        display_cap,
        StdRng::seed_from_u64(TEST_SEED),
    )
}

fn texts(candidates: &[SentenceCandidate]) -> Vec<&str> {
    let mut texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
    texts.sort();
    texts
}

/// A sentence ending in 走 is continued only by sentences starting with 走
#[tokio::test]
async fn test_chainSource_withSentenceEndingInZou_shouldOnlyOfferZouPrefix() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);

    let next = source.fetch_next(&demo_line("我们走"), &all_corpora()).await.unwrap();

    assert!(next.iter().all(|c| c.text.starts_with('走')));
    // 走吧 starts with 走 but is one character once 吧 is stripped
    assert_eq!(texts(&next), vec!["走一步看一步", "走着瞧吧"]);
    assert_eq!(backend.calls().searches, vec![("^走".to_string(), true)]);
}

/// When the anchored search finds nothing, the plain query is tried and prefix-filtered
#[tokio::test]
async fn test_chainSource_withEmptyAnchoredSearch_shouldFallBackToPlainQuery() {
    let backend = MockBackend::demo().with_blind_anchored_search();
    let source = chain_source(&backend, 8);

    let next = source.fetch_next(&demo_line("我们走"), &all_corpora()).await.unwrap();

    assert_eq!(texts(&next), vec!["走一步看一步", "走着瞧吧"]);
    assert_eq!(
        backend.calls().searches,
        vec![("^走".to_string(), true), ("走".to_string(), false)]
    );
}

/// No continuation is an empty result, not an error, and only after both queries
#[tokio::test]
async fn test_chainSource_withNoContinuation_shouldReturnEmptyAfterFallback() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);

    let next = source.fetch_next(&demo_line("到底是谁干的"), &all_corpora()).await.unwrap();

    assert!(next.is_empty());
    assert_eq!(backend.calls().searches.len(), 2);
}

#[tokio::test]
async fn test_chainSource_withOnlyFiller_shouldFailWithNoAnchorChar() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);
    let sentence = SentenceCandidate::new("lurk", "潜伏E01", "嗯", 1.0, 2.0);

    let result = source.fetch_next(&sentence, &all_corpora()).await;

    assert!(matches!(result, Err(GameError::NoAnchorChar { ref text }) if text == "嗯"));
    assert!(backend.calls().searches.is_empty());
}

#[tokio::test]
async fn test_chainSource_withEmptySelection_shouldFailBeforeSearching() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);

    let result = source.fetch_next(&demo_line("我们走"), &CorpusSelection::new()).await;

    assert!(matches!(result, Err(GameError::EmptyCorpusSelection)));
    assert!(backend.calls().searches.is_empty());
}

/// Only the selected corpora are searched
#[tokio::test]
async fn test_chainSource_withOneCorpus_shouldStayInsideIt() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);
    let lurk: CorpusSelection = ["lurk"].into_iter().collect();

    let next = source.fetch_next(&demo_line("我们走"), &lurk).await.unwrap();

    assert_eq!(texts(&next), vec!["走一步看一步"]);
}

/// The same seed gives the same sample, and the display cap is honoured
#[tokio::test]
async fn test_chainSource_withSeededRng_shouldSampleDeterministically() {
    let backend = MockBackend::demo();
    let first = chain_source(&backend, 1)
        .fetch_next(&demo_line("我们走"), &all_corpora())
        .await
        .unwrap();
    let second = chain_source(&backend, 1)
        .fetch_next(&demo_line("我们走"), &all_corpora())
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_chainSource_withFailingSearch_shouldReportCollaboratorUnavailable() {
    let backend = MockBackend::demo().with_behavior(MockBehavior::Failing);
    let source = chain_source(&backend, 8);

    let result = source.fetch_next(&demo_line("我们走"), &all_corpora()).await;

    assert!(matches!(result, Err(GameError::CollaboratorUnavailable(_))));
}

#[tokio::test]
async fn test_fetchPrompts_shouldUseSampler() {
    let backend = MockBackend::demo();
    let source = chain_source(&backend, 8);

    let prompts = source.fetch_prompts(&all_corpora(), 3).await.unwrap();

    assert_eq!(prompts.len(), 3);
    assert_eq!(backend.calls().samples, 1);
}

#[tokio::test]
async fn test_rhymeSource_shouldDelegateToRhymeService() {
    let backend = MockBackend::demo();
    let shared = Arc::new(backend.clone());
    let source = RhymeSource::new(shared.clone(), shared, LengthBounds::new(3, 20), 8);

    let next = source.fetch_next(&demo_line("等一等"), &all_corpora()).await.unwrap();

    assert_eq!(texts(&next), vec!["我愿意等"]);
    assert_eq!(backend.calls().rhymes, 1);
    assert!(backend.calls().searches.is_empty());
}

/// Dialogue responses keep the service's order, best score first
#[tokio::test]
async fn test_dialogueSource_shouldKeepServiceOrder() {
    let backend = MockBackend::demo();
    let shared = Arc::new(backend.clone());
    let source = DialogueSource::new(shared.clone(), shared);
    let question = demo_line("你好吗");

    let next = source.fetch_next(&question, &all_corpora()).await.unwrap();

    assert!(!next.is_empty());
    assert!(next.len() <= 8);
    assert!(next.iter().all(|c| c.match_score.is_some()));
    assert!(
        next.windows(2)
            .all(|w| w[0].match_score >= w[1].match_score)
    );
    assert!(
        next.iter()
            .all(|c| !(c.corpus_id == question.corpus_id && c.episode_id == question.episode_id))
    );
}

#[test]
fn test_buildSource_shouldMatchMode() {
    let backend = MockBackend::demo();
    let services = common::services_for(&backend);
    let config = GameConfig::default();

    for mode in [GameMode::Chain, GameMode::Rhyme, GameMode::Dialogue] {
        assert_eq!(build_source(mode, &services, &config).mode(), mode);
    }
}
