/*!
 * The session aggregate owned by the engine.
 *
 * `GameSession` gathers everything a game screen shows: the prompts, the
 * accepted chain and its clips, the pending selection and the next
 * candidates. Only the engine mutates it; adapters read it through
 * accessors or through a `SessionSnapshot`.
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::export::ExportArtifact;
use crate::models::{ClipReference, CorpusSelection, GameMode, LogEntry, SentenceCandidate};

/// State of the session machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    NotStarted,
    /// Prompts loaded or loading, none chosen
    AwaitingPromptSelection,
    /// A prompt is chosen, its clip is rendering or ready
    ConfirmingStart,
    /// A chain exists, next candidates loaded or loading
    InProgress,
    /// A continuation is chosen, its clip is rendering or ready
    ConfirmingNext,
    /// Merge request in flight
    Exporting,
}

/// Render status of the pending selection's clip
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipStatus {
    /// No clip, either nothing is pending or the render failed
    #[default]
    Absent,
    Loading,
    Ready(ClipReference),
}

impl ClipStatus {
    pub fn ready(&self) -> Option<&ClipReference> {
        match self {
            Self::Ready(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Mutable aggregate of one game session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub(crate) id: Uuid,
    pub(crate) mode: GameMode,
    pub(crate) corpus_selection: CorpusSelection,
    pub(crate) state: SessionState,
    pub(crate) prompt_candidates: Vec<SentenceCandidate>,
    pub(crate) next_candidates: Vec<SentenceCandidate>,
    pub(crate) pending_selection: Option<SentenceCandidate>,
    pub(crate) pending_clip: ClipStatus,
    pub(crate) log: Vec<LogEntry>,
    pub(crate) clip_accumulator: Vec<ClipReference>,
    pub(crate) last_error: Option<String>,
    pub(crate) export_artifact: Option<ExportArtifact>,
}

impl GameSession {
    pub fn new(mode: GameMode, corpus_selection: CorpusSelection) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            corpus_selection,
            state: SessionState::NotStarted,
            prompt_candidates: Vec::new(),
            next_candidates: Vec::new(),
            pending_selection: None,
            pending_clip: ClipStatus::Absent,
            log: Vec::new(),
            clip_accumulator: Vec::new(),
            last_error: None,
            export_artifact: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Short id used in log lines
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn corpus_selection(&self) -> &CorpusSelection {
        &self.corpus_selection
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn prompt_candidates(&self) -> &[SentenceCandidate] {
        &self.prompt_candidates
    }

    pub fn next_candidates(&self) -> &[SentenceCandidate] {
        &self.next_candidates
    }

    pub fn pending_selection(&self) -> Option<&SentenceCandidate> {
        self.pending_selection.as_ref()
    }

    pub fn pending_clip(&self) -> &ClipStatus {
        &self.pending_clip
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn clip_accumulator(&self) -> &[ClipReference] {
        &self.clip_accumulator
    }

    /// The most recently confirmed sentence
    pub fn current_sentence(&self) -> Option<&SentenceCandidate> {
        self.log.last().map(|entry| &entry.sentence)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn export_artifact(&self) -> Option<&ExportArtifact> {
        self.export_artifact.as_ref()
    }

    /// Append a confirmed step, keeping the log and the accumulator parallel
    pub(crate) fn push_step(&mut self, sentence: SentenceCandidate, clip: ClipReference) {
        let step = self.log.len() + 1;
        self.clip_accumulator.push(clip.clone());
        self.log.push(LogEntry {
            sentence,
            step,
            clip,
        });
    }

    /// Drop the last confirmed step
    pub(crate) fn pop_step(&mut self) -> Option<LogEntry> {
        self.clip_accumulator.pop();
        self.log.pop()
    }

    /// Forget the whole chain
    pub(crate) fn clear_chain(&mut self) {
        self.log.clear();
        self.clip_accumulator.clear();
        self.next_candidates.clear();
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending_selection = None;
        self.pending_clip = ClipStatus::Absent;
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.log.len() == self.clip_accumulator.len()
            && self
                .log
                .iter()
                .zip(&self.clip_accumulator)
                .enumerate()
                .all(|(i, (entry, clip))| entry.step == i + 1 && &entry.clip == clip)
    }
}

/// Read-only view handed to adapters after every transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: GameSession,
    pub prompts_loading: bool,
    pub next_loading: bool,
    pub clip_loading: bool,
    pub exporting: bool,
}

impl SessionSnapshot {
    /// Candidates the adapter should offer in the current state
    pub fn offered(&self) -> &[SentenceCandidate] {
        match self.session.state {
            SessionState::AwaitingPromptSelection | SessionState::ConfirmingStart => {
                &self.session.prompt_candidates
            }
            SessionState::InProgress | SessionState::ConfirmingNext | SessionState::Exporting => {
                &self.session.next_candidates
            }
            SessionState::NotStarted => &[],
        }
    }

    pub fn can_confirm(&self) -> bool {
        matches!(
            self.session.state,
            SessionState::ConfirmingStart | SessionState::ConfirmingNext
        ) && self.session.pending_clip.ready().is_some()
    }

    pub fn can_export(&self) -> bool {
        self.session.state == SessionState::InProgress
            && self.session.clip_accumulator.len() >= crate::game::export::MIN_EXPORT_CLIPS
    }
}
