/*!
 * Tests for the terminal controller
 */

use subchain::app_config::Config;
use subchain::app_controller::{Controller, PlayerCommand};
use subchain::game::session::SessionState;
use subchain::models::{CorpusSelection, GameMode};
use subchain::services::CatalogService;
use subchain::services::mock::MockBackend;

use crate::common;

fn controller(backend: &MockBackend) -> Controller {
    Controller::with_services(Config::default(), common::services_for(backend))
}

#[test]
fn test_playerCommand_shouldParseShortcuts() {
    assert_eq!("3".parse::<PlayerCommand>().unwrap(), PlayerCommand::Select(3));
    assert_eq!(" y ".parse::<PlayerCommand>().unwrap(), PlayerCommand::Confirm);
    assert_eq!("N".parse::<PlayerCommand>().unwrap(), PlayerCommand::Cancel);
    assert_eq!("c".parse::<PlayerCommand>().unwrap(), PlayerCommand::RetryClip);
    assert_eq!("refresh".parse::<PlayerCommand>().unwrap(), PlayerCommand::Refresh);
    assert_eq!("b".parse::<PlayerCommand>().unwrap(), PlayerCommand::Back);
    assert_eq!("e".parse::<PlayerCommand>().unwrap(), PlayerCommand::Export);
    assert_eq!("g".parse::<PlayerCommand>().unwrap(), PlayerCommand::NewGame);
    assert_eq!("?".parse::<PlayerCommand>().unwrap(), PlayerCommand::Help);
    assert_eq!("quit".parse::<PlayerCommand>().unwrap(), PlayerCommand::Quit);
}

#[test]
fn test_playerCommand_withZeroOrUnknown_shouldFail() {
    assert!("0".parse::<PlayerCommand>().is_err());
    assert!("xyz".parse::<PlayerCommand>().is_err());
}

/// Explicit ids win, then configured ids, then the whole catalog
#[tokio::test]
async fn test_initialSelection_shouldFollowPrecedence() {
    let backend = MockBackend::demo();
    let catalog = backend.catalog_status().await.unwrap();

    let mut config = Config::default();
    let from_catalog = Controller::with_services(config.clone(), common::services_for(&backend))
        .initial_selection(None, Some(&catalog))
        .unwrap();
    assert_eq!(from_catalog.to_param(), "lurk,zhenhuan");

    config.default_corpora = vec!["zhenhuan".to_string()];
    let configured = Controller::with_services(config, common::services_for(&backend));
    assert_eq!(
        configured.initial_selection(None, Some(&catalog)).unwrap().to_param(),
        "zhenhuan"
    );
    assert_eq!(
        configured
            .initial_selection(Some(common::lurk_only()), Some(&catalog))
            .unwrap()
            .to_param(),
        "lurk"
    );
}

#[test]
fn test_initialSelection_withNothingAvailable_shouldFail() {
    let backend = MockBackend::demo();
    let result = controller(&backend).initial_selection(Some(CorpusSelection::new()), None);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_applyCommand_shouldDriveEngine() {
    let backend = MockBackend::demo();
    let controller = controller(&backend);
    let mut engine = controller.new_engine(GameMode::Chain, common::all_corpora());

    assert!(controller.apply_command(&mut engine, PlayerCommand::NewGame).unwrap());
    controller.settle(&mut engine).await;

    // 谁在外面 is the third prompt
    assert!(controller.apply_command(&mut engine, PlayerCommand::Select(3)).unwrap());
    assert_eq!(engine.session().state(), SessionState::ConfirmingStart);
    controller.settle(&mut engine).await;

    assert!(controller.apply_command(&mut engine, PlayerCommand::Confirm).unwrap());
    controller.settle(&mut engine).await;
    assert_eq!(engine.session().log()[0].sentence.text, "谁在外面");

    // Out of range is ignored
    assert!(controller.apply_command(&mut engine, PlayerCommand::Select(9)).unwrap());
    assert_eq!(engine.session().state(), SessionState::InProgress);

    assert!(!controller.apply_command(&mut engine, PlayerCommand::Quit).unwrap());
}

#[tokio::test]
async fn test_applyCommand_inWrongState_shouldReturnError() {
    let backend = MockBackend::demo();
    let controller = controller(&backend);
    let mut engine = controller.new_engine(GameMode::Rhyme, common::all_corpora());

    assert!(controller.apply_command(&mut engine, PlayerCommand::Confirm).is_err());
    assert!(controller.apply_command(&mut engine, PlayerCommand::Export).is_err());
}

/// Selecting again while a selection awaits confirmation keeps the pending one
#[tokio::test]
async fn test_applyCommand_selectWhileConfirming_shouldKeepPendingSelection() {
    let backend = MockBackend::demo();
    let controller = controller(&backend);
    let mut engine = controller.new_engine(GameMode::Chain, common::all_corpora());

    controller.apply_command(&mut engine, PlayerCommand::NewGame).unwrap();
    controller.settle(&mut engine).await;
    controller.apply_command(&mut engine, PlayerCommand::Select(3)).unwrap();
    controller.settle(&mut engine).await;

    assert!(controller.apply_command(&mut engine, PlayerCommand::Select(1)).unwrap());
    assert_eq!(engine.session().state(), SessionState::ConfirmingStart);
    assert_eq!(engine.session().pending_selection().unwrap().text, "谁在外面");
    assert!(!engine.has_pending_work());
    assert_eq!(engine.session().last_error(), None);
}

/// Offline controllers serve the demo corpus and shuffle their prompts
#[tokio::test]
async fn test_offline_shouldPlayOnDemoCorpus() {
    let controller = Controller::offline(Config::default());

    let catalog = controller.status().await.unwrap();
    assert_eq!(catalog.corpus_name("lurk"), "潜伏");

    let corpora = controller.initial_selection(None, Some(&catalog)).unwrap();
    let mut engine = controller.new_engine(GameMode::Chain, corpora);
    controller.apply_command(&mut engine, PlayerCommand::NewGame).unwrap();
    controller.settle(&mut engine).await;
    assert_eq!(engine.session().prompt_candidates().len(), 8);
}
