/*!
 * Tests for the terminal rendering helpers
 */

use subchain::display::{candidate_line, empty_hint, format_episode, format_time, render_catalog, render_snapshot};
use subchain::game::session::SessionState;
use subchain::models::{GameMode, SentenceCandidate};
use subchain::services::CatalogService;
use subchain::services::mock::MockBackend;

use crate::common::{self, play_line, started};

#[test]
fn test_formatTime_shouldUseMinutesAndPaddedSeconds() {
    assert_eq!(format_time(9.99), "0:09");
    assert_eq!(format_time(61.0), "1:01");
    assert_eq!(format_time(3725.0), "62:05");
}

#[test]
fn test_formatEpisode_withDigits_shouldUseFirstRun() {
    assert_eq!(format_episode("潜伏E02"), "第02集");
    assert_eq!(format_episode("S01E07"), "第01集");
    assert_eq!(format_episode("特别篇"), "特别篇");
}

#[tokio::test]
async fn test_candidateLine_shouldUseCorpusName() {
    let catalog = MockBackend::demo().catalog_status().await.unwrap();
    let line = candidate_line(&common::demo_line("走吧"), GameMode::Chain, Some(&catalog));

    assert!(line.starts_with("走吧"));
    assert!(line.contains("潜伏"));
    assert!(line.contains("第01集"));
    assert!(line.contains("0:09"));
    assert!(!line.contains("句"));
}

/// Dialogue lines carry the sentence type and the match score
#[test]
fn test_candidateLine_inDialogue_shouldShowTypeAndScore() {
    let candidate = SentenceCandidate::new("lurk", "潜伏E02", "你好吗", 2.0, 4.0).with_score(0.8);
    let line = candidate_line(&candidate, GameMode::Dialogue, None);

    assert!(line.contains("lurk"));
    assert!(line.contains("疑问句"));
    assert!(line.contains("80%"));
}

#[test]
fn test_emptyHint_shouldOnlyApplyToListStates() {
    assert!(empty_hint(SessionState::AwaitingPromptSelection).is_some());
    assert!(empty_hint(SessionState::InProgress).is_some());
    assert!(empty_hint(SessionState::ConfirmingNext).is_none());
}

#[tokio::test]
async fn test_renderSnapshot_shouldListChainAndCandidates() {
    let backend = MockBackend::demo();
    let mut engine = started(GameMode::Chain, &backend).await;
    play_line(&mut engine, "谁在外面").await;

    let screen = render_snapshot(&engine.snapshot(), None);

    assert!(screen.contains("字幕接龙"));
    assert!(screen.contains("1. 谁在外面"));
    assert!(screen.contains("[1] 面子要紧"));
}

#[tokio::test]
async fn test_renderSnapshot_withNoContinuation_shouldShowHint() {
    let backend = MockBackend::demo();
    let mut engine = started(GameMode::Chain, &backend).await;
    play_line(&mut engine, "到底是谁干的").await;

    let screen = render_snapshot(&engine.snapshot(), None);

    assert!(screen.contains(empty_hint(SessionState::InProgress).unwrap()));
}

#[tokio::test]
async fn test_renderCatalog_shouldListCorpora() {
    let catalog = MockBackend::demo().catalog_status().await.unwrap();
    let screen = render_catalog(&catalog);

    assert!(screen.contains("甄嬛传 (zhenhuan): 2 集, 11 条字幕"));
    assert!(screen.contains("潜伏 (lurk): 2 集, 9 条字幕"));
}
