/*!
 * Tests for error types and conversions
 */

use subchain::errors::{AppError, GameError, ServiceError};
use subchain::game::session::SessionState;

#[test]
fn test_serviceError_requestFailed_shouldDisplayCorrectly() {
    let error = ServiceError::RequestFailed("Connection reset".to_string());
    let display = format!("{}", error);
    assert!(display.contains("API request failed"));
    assert!(display.contains("Connection reset"));
}

#[test]
fn test_serviceError_apiError_shouldDisplayStatusAndMessage() {
    let error = ServiceError::ApiError {
        status_code: 404,
        message: "视频片段不存在".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("404"));
    assert!(display.contains("视频片段不存在"));
}

#[test]
fn test_gameError_fromServiceError_shouldWrapAsCollaboratorUnavailable() {
    let error: GameError = ServiceError::ConnectionError("refused".to_string()).into();
    assert!(matches!(error, GameError::CollaboratorUnavailable(_)));
    assert!(error.to_string().contains("refused"));
}

#[test]
fn test_gameError_invalidTransition_shouldNameActionAndState() {
    let error = GameError::InvalidTransition {
        action: "export",
        state: SessionState::ConfirmingNext,
    };
    let display = error.to_string();
    assert!(display.contains("export"));
    assert!(display.contains("ConfirmingNext"));
}

#[test]
fn test_gameError_notEnoughClips_shouldShowCounts() {
    let error = GameError::NotEnoughClips {
        required: 2,
        available: 1,
    };
    assert_eq!(error.to_string(), "Export needs at least 2 clips, have 1");
}

#[test]
fn test_appError_fromGameError_shouldWrapCorrectly() {
    let error: AppError = GameError::EmptyCorpusSelection.into();
    assert!(matches!(error, AppError::Game(GameError::EmptyCorpusSelection)));
    assert!(error.to_string().starts_with("Game error"));
}

#[test]
fn test_appError_fromIoError_shouldBecomeFileError() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "conf.json");
    let error: AppError = io.into();
    assert!(matches!(error, AppError::File(_)));
}

#[test]
fn test_appError_fromAnyhow_shouldBecomeUnknown() {
    let error: AppError = anyhow::anyhow!("something odd").into();
    assert!(matches!(error, AppError::Unknown(ref m) if m == "something odd"));
}
