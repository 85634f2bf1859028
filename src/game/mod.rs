/*!
 * Game logic: candidate filtering, candidate sources, the session aggregate,
 * the session engine and clip export.
 */

pub mod engine;
pub mod export;
pub mod filter;
pub mod session;
pub mod source;

pub use engine::{EngineSettings, GameEngine, RequestKind, Update};
pub use export::{ExportArtifact, ExportCoordinator, MIN_EXPORT_CLIPS, MergePlan};
pub use filter::{LengthBounds, SentenceType, anchor_char, classify, length_window, strip_trailing_filler};
pub use session::{ClipStatus, GameSession, SessionSnapshot, SessionState};
pub use source::{CandidateSource, ChainSource, DialogueSource, RhymeSource, build_source};
