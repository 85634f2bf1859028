/*!
 * Session engine driving one game.
 *
 * The engine is the only writer of its `GameSession`. UI actions are plain
 * methods that validate the transition, mutate the session and launch the
 * collaborator calls the transition needs. Each call runs in its own task and
 * reports back over a channel; `next_update` applies one response at a time.
 *
 * Four request slots exist (prompts, next candidates, clip render, merge) and
 * each holds at most one outstanding request, identified by a ticket. Refresh
 * actions are suppressed while their slot is busy; transitions that change a
 * slot's input abort the outstanding request and issue a new one, so late
 * responses never land on a newer state.
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::app_config::GameConfig;
use crate::errors::{GameError, ServiceError};
use crate::game::export::{ExportArtifact, ExportCoordinator};
use crate::game::session::{ClipStatus, GameSession, SessionSnapshot, SessionState};
use crate::game::source::{CandidateSource, build_source};
use crate::models::{ClipReference, CorpusSelection, GameMode, SentenceCandidate};
use crate::services::{ClipRenderer, Services};

/// Kind of outstanding collaborator request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Prompts,
    NextCandidates,
    ClipRender,
    Merge,
}

/// What an applied collaborator response changed
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Prompts replaced; zero means the adapter should hint a refresh
    PromptsLoaded { count: usize },
    /// Next candidates replaced; zero means no continuation was found
    NextCandidatesLoaded { count: usize },
    ClipReady(ClipReference),
    ExportReady(ExportArtifact),
    Failed { kind: RequestKind, message: String },
}

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub prompt_count: usize,
    pub clip_padding_secs: f64,
}

impl From<&GameConfig> for EngineSettings {
    fn from(config: &GameConfig) -> Self {
        Self {
            prompt_count: config.prompt_count,
            clip_padding_secs: config.clip_padding_secs,
        }
    }
}

enum Outcome {
    Prompts(Result<Vec<SentenceCandidate>, GameError>),
    Next(Result<Vec<SentenceCandidate>, GameError>),
    Clip(Result<ClipReference, GameError>),
    Merge(Result<ExportArtifact, GameError>),
}

impl Outcome {
    /// Failed outcome for a request of `kind`
    fn failed(kind: RequestKind, error: GameError) -> Self {
        match kind {
            RequestKind::Prompts => Self::Prompts(Err(error)),
            RequestKind::NextCandidates => Self::Next(Err(error)),
            RequestKind::ClipRender => Self::Clip(Err(error)),
            RequestKind::Merge => Self::Merge(Err(error)),
        }
    }

    fn kind(&self) -> RequestKind {
        match self {
            Self::Prompts(_) => RequestKind::Prompts,
            Self::Next(_) => RequestKind::NextCandidates,
            Self::Clip(_) => RequestKind::ClipRender,
            Self::Merge(_) => RequestKind::Merge,
        }
    }
}

struct Completion {
    ticket: u64,
    outcome: Outcome,
}

struct InFlight {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Aborts the wrapped request when the reporting task is aborted
struct AbortOnDrop(JoinHandle<Outcome>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct Slots {
    prompts: Option<InFlight>,
    next: Option<InFlight>,
    clip: Option<InFlight>,
    merge: Option<InFlight>,
}

impl Slots {
    fn get_mut(&mut self, kind: RequestKind) -> &mut Option<InFlight> {
        match kind {
            RequestKind::Prompts => &mut self.prompts,
            RequestKind::NextCandidates => &mut self.next,
            RequestKind::ClipRender => &mut self.clip,
            RequestKind::Merge => &mut self.merge,
        }
    }

    fn busy(&self, kind: RequestKind) -> bool {
        match kind {
            RequestKind::Prompts => self.prompts.is_some(),
            RequestKind::NextCandidates => self.next.is_some(),
            RequestKind::ClipRender => self.clip.is_some(),
            RequestKind::Merge => self.merge.is_some(),
        }
    }

    fn any_busy(&self) -> bool {
        self.prompts.is_some() || self.next.is_some() || self.clip.is_some() || self.merge.is_some()
    }
}

/// Session state machine for one game
pub struct GameEngine {
    session: GameSession,
    source: Arc<dyn CandidateSource>,
    renderer: Arc<dyn ClipRenderer>,
    exporter: ExportCoordinator,
    settings: EngineSettings,
    slots: Slots,
    last_ticket: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl GameEngine {
    /// Create an engine from explicit collaborators
    pub fn new(
        source: Arc<dyn CandidateSource>,
        renderer: Arc<dyn ClipRenderer>,
        exporter: ExportCoordinator,
        corpora: CorpusSelection,
        settings: EngineSettings,
    ) -> Self {
        let session = GameSession::new(source.mode(), corpora);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(SessionSnapshot {
            session: session.clone(),
            prompts_loading: false,
            next_loading: false,
            clip_loading: false,
            exporting: false,
        });

        info!("Created {} session {}", session.mode(), session.short_id());

        Self {
            session,
            source,
            renderer,
            exporter,
            settings,
            slots: Slots::default(),
            last_ticket: 0,
            completions_tx,
            completions_rx,
            snapshots,
        }
    }

    /// Create an engine for `mode` backed by `services`
    pub fn for_mode(
        mode: GameMode,
        services: &Services,
        config: &GameConfig,
        corpora: CorpusSelection,
    ) -> Self {
        Self::new(
            build_source(mode, services, config),
            services.renderer.clone(),
            ExportCoordinator::new(services.merger.clone()),
            corpora,
            EngineSettings::from(config),
        )
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn is_busy(&self, kind: RequestKind) -> bool {
        self.slots.busy(kind)
    }

    /// Whether any collaborator request is outstanding
    pub fn has_pending_work(&self) -> bool {
        self.slots.any_busy()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            prompts_loading: self.slots.busy(RequestKind::Prompts),
            next_loading: self.slots.busy(RequestKind::NextCandidates),
            clip_loading: self.slots.busy(RequestKind::ClipRender),
            exporting: self.slots.busy(RequestKind::Merge),
        }
    }

    /// Receive a fresh snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Replace the corpus selection used by subsequent fetches
    pub fn set_corpus_selection(&mut self, corpora: CorpusSelection) {
        debug!("Corpus selection set to [{}]", corpora.to_param());
        self.session.corpus_selection = corpora;
        self.publish();
    }

    /// Start a new game from any state
    pub fn start_game(&mut self) -> Result<(), GameError> {
        self.require_corpora()?;

        for kind in [
            RequestKind::Prompts,
            RequestKind::NextCandidates,
            RequestKind::ClipRender,
            RequestKind::Merge,
        ] {
            self.abort(kind);
        }
        self.session.clear_chain();
        self.session.clear_pending();
        self.session.prompt_candidates.clear();
        self.session.export_artifact = None;
        self.set_state(SessionState::AwaitingPromptSelection);
        self.launch_prompts();
        self.publish();
        Ok(())
    }

    /// Re-draw the prompts; returns false when a prompt fetch is already in flight
    pub fn refresh_prompts(&mut self) -> Result<bool, GameError> {
        self.require_state("refresh prompts", &[SessionState::AwaitingPromptSelection])?;
        if self.slots.busy(RequestKind::Prompts) {
            debug!("Prompt fetch already in flight, refresh suppressed");
            return Ok(false);
        }
        self.require_corpora()?;
        self.launch_prompts();
        self.publish();
        Ok(true)
    }

    /// Tentatively choose an opening sentence
    pub fn select_start(&mut self, candidate: SentenceCandidate) -> Result<(), GameError> {
        self.require_state("select a prompt", &[SessionState::AwaitingPromptSelection])?;
        self.begin_confirmation(candidate, SessionState::ConfirmingStart);
        Ok(())
    }

    /// Tentatively choose a continuation
    pub fn select_next(&mut self, candidate: SentenceCandidate) -> Result<(), GameError> {
        self.require_state("select a continuation", &[SessionState::InProgress])?;
        self.begin_confirmation(candidate, SessionState::ConfirmingNext);
        Ok(())
    }

    /// Drop the pending selection without touching the chain
    pub fn cancel_selection(&mut self) -> Result<(), GameError> {
        let back_to = match self.session.state {
            SessionState::ConfirmingStart => SessionState::AwaitingPromptSelection,
            SessionState::ConfirmingNext => SessionState::InProgress,
            state => {
                return Err(GameError::InvalidTransition {
                    action: "cancel a selection",
                    state,
                });
            }
        };
        self.abort(RequestKind::ClipRender);
        self.session.clear_pending();
        self.set_state(back_to);
        self.publish();
        Ok(())
    }

    /// Render the pending selection's clip again after a failed render
    pub fn retry_clip(&mut self) -> Result<bool, GameError> {
        self.require_state(
            "retry the clip",
            &[SessionState::ConfirmingStart, SessionState::ConfirmingNext],
        )?;
        if self.slots.busy(RequestKind::ClipRender) || self.session.pending_clip.ready().is_some() {
            return Ok(false);
        }
        let Some(candidate) = self.session.pending_selection.clone() else {
            return Ok(false);
        };
        self.session.pending_clip = ClipStatus::Loading;
        self.launch_clip(candidate);
        self.publish();
        Ok(true)
    }

    /// Accept the pending selection into the chain and fetch what may follow it
    pub fn confirm_selection(&mut self) -> Result<(), GameError> {
        self.require_state(
            "confirm a selection",
            &[SessionState::ConfirmingStart, SessionState::ConfirmingNext],
        )?;
        let clip = self
            .session
            .pending_clip
            .ready()
            .cloned()
            .ok_or(GameError::ClipNotReady)?;
        let sentence = self
            .session
            .pending_selection
            .take()
            .ok_or(GameError::ClipNotReady)?;

        if self.session.state == SessionState::ConfirmingStart {
            self.abort(RequestKind::Prompts);
        }
        self.session.pending_clip = ClipStatus::Absent;
        self.session.push_step(sentence.clone(), clip);
        info!(
            "Session {} step {}: {}",
            self.session.short_id(),
            self.session.log.len(),
            sentence.text
        );
        self.set_state(SessionState::InProgress);
        self.session.next_candidates.clear();
        self.launch_next(sentence);
        self.publish();
        Ok(())
    }

    /// Re-fetch the next candidates; returns false when a fetch is already in flight
    pub fn refresh_next(&mut self) -> Result<bool, GameError> {
        self.require_state("refresh continuations", &[SessionState::InProgress])?;
        if self.slots.busy(RequestKind::NextCandidates) {
            debug!("Next-candidates fetch already in flight, refresh suppressed");
            return Ok(false);
        }
        self.require_corpora()?;
        let Some(current) = self.session.current_sentence().cloned() else {
            return Ok(false);
        };
        self.launch_next(current);
        self.publish();
        Ok(true)
    }

    /// Undo the last confirmed step
    pub fn go_back(&mut self) -> Result<(), GameError> {
        self.require_state("go back", &[SessionState::InProgress])?;

        if self.session.log.len() <= 1 {
            self.abort(RequestKind::NextCandidates);
            self.session.clear_chain();
            self.set_state(SessionState::AwaitingPromptSelection);
            self.launch_prompts();
        } else {
            if let Some(removed) = self.session.pop_step() {
                debug!("Removed step {}: {}", removed.step, removed.sentence.text);
            }
            self.session.next_candidates.clear();
            if let Some(current) = self.session.current_sentence().cloned() {
                self.launch_next(current);
            }
        }
        self.publish();
        Ok(())
    }

    /// Merge the accumulated clips into one video
    pub fn request_export(&mut self) -> Result<(), GameError> {
        self.require_state("export", &[SessionState::InProgress])?;
        let plan = ExportCoordinator::plan(&self.session)?;

        self.session.last_error = None;
        self.set_state(SessionState::Exporting);
        let exporter = self.exporter.clone();
        self.launch(RequestKind::Merge, async move {
            Outcome::Merge(exporter.execute(plan).await)
        });
        self.publish();
        Ok(())
    }

    // =========================================================================
    // Collaborator responses
    // =========================================================================

    /// Wait for the next collaborator response and apply it
    ///
    /// Returns `None` once no request is outstanding.
    pub async fn next_update(&mut self) -> Option<Update> {
        while self.slots.any_busy() {
            let completion = self.completions_rx.recv().await?;
            if let Some(update) = self.apply(completion) {
                return Some(update);
            }
        }
        None
    }

    /// Apply responses until no request is outstanding
    pub async fn settle(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    fn apply(&mut self, completion: Completion) -> Option<Update> {
        let kind = completion.outcome.kind();
        let slot = self.slots.get_mut(kind);
        if slot.as_ref().map(|in_flight| in_flight.ticket) != Some(completion.ticket) {
            debug!("Dropping stale {:?} response #{}", kind, completion.ticket);
            return None;
        }
        *slot = None;

        let update = match completion.outcome {
            Outcome::Prompts(Ok(prompts)) => {
                let count = prompts.len();
                self.session.prompt_candidates = prompts;
                if count == 0 {
                    info!("No prompts returned");
                }
                Update::PromptsLoaded { count }
            }
            Outcome::Prompts(Err(error)) => {
                if self.session.prompt_candidates.is_empty()
                    && self.session.state == SessionState::AwaitingPromptSelection
                {
                    self.set_state(SessionState::NotStarted);
                }
                self.fail(kind, error)
            }
            Outcome::Next(Ok(candidates)) => {
                let count = candidates.len();
                self.session.next_candidates = candidates;
                Update::NextCandidatesLoaded { count }
            }
            Outcome::Next(Err(error)) => self.fail(kind, error),
            Outcome::Clip(Ok(clip)) => {
                self.session.pending_clip = ClipStatus::Ready(clip.clone());
                Update::ClipReady(clip)
            }
            Outcome::Clip(Err(error)) => {
                self.session.pending_clip = ClipStatus::Absent;
                self.fail(kind, error)
            }
            Outcome::Merge(result) => {
                if self.session.state == SessionState::Exporting {
                    self.set_state(SessionState::InProgress);
                }
                match result {
                    Ok(artifact) => {
                        self.session.export_artifact = Some(artifact.clone());
                        Update::ExportReady(artifact)
                    }
                    Err(error) => self.fail(kind, error),
                }
            }
        };

        self.publish();
        Some(update)
    }

    fn fail(&mut self, kind: RequestKind, error: GameError) -> Update {
        let message = error.to_string();
        warn!("Session {} {:?} failed: {}", self.session.short_id(), kind, message);
        self.session.last_error = Some(message.clone());
        Update::Failed { kind, message }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), GameError> {
        if allowed.contains(&self.session.state) {
            Ok(())
        } else {
            Err(GameError::InvalidTransition {
                action,
                state: self.session.state,
            })
        }
    }

    fn require_corpora(&mut self) -> Result<(), GameError> {
        if self.session.corpus_selection.is_empty() {
            let error = GameError::EmptyCorpusSelection;
            self.session.last_error = Some(error.to_string());
            self.publish();
            return Err(error);
        }
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.session.state != state {
            debug!("Session {}: {:?} -> {:?}", self.session.short_id(), self.session.state, state);
            self.session.state = state;
        }
    }

    fn begin_confirmation(&mut self, candidate: SentenceCandidate, state: SessionState) {
        self.session.pending_selection = Some(candidate.clone());
        self.session.pending_clip = ClipStatus::Loading;
        self.set_state(state);
        self.launch_clip(candidate);
        self.publish();
    }

    fn launch_prompts(&mut self) {
        self.session.last_error = None;
        let source = self.source.clone();
        let corpora = self.session.corpus_selection.clone();
        let count = self.settings.prompt_count;
        self.launch(RequestKind::Prompts, async move {
            Outcome::Prompts(source.fetch_prompts(&corpora, count).await)
        });
    }

    fn launch_next(&mut self, sentence: SentenceCandidate) {
        self.session.last_error = None;
        let source = self.source.clone();
        let corpora = self.session.corpus_selection.clone();
        self.launch(RequestKind::NextCandidates, async move {
            Outcome::Next(source.fetch_next(&sentence, &corpora).await)
        });
    }

    fn launch_clip(&mut self, sentence: SentenceCandidate) {
        self.session.last_error = None;
        let renderer = self.renderer.clone();
        let padding = self.settings.clip_padding_secs;
        self.launch(RequestKind::ClipRender, async move {
            let clip = renderer
                .render_clip(
                    &sentence.corpus_id,
                    &sentence.episode_id,
                    sentence.start_seconds,
                    sentence.end_seconds,
                    padding,
                )
                .await
                .map_err(GameError::from);
            Outcome::Clip(clip)
        });
    }

    /// Run `request` in its own task, superseding any request of the same kind
    fn launch<F>(&mut self, kind: RequestKind, request: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.abort(kind);
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        let tx = self.completions_tx.clone();
        let handle = tokio::spawn(async move {
            // A panicking collaborator still reports, so its slot is released
            let mut inner = AbortOnDrop(tokio::spawn(request));
            let outcome = match (&mut inner.0).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = if e.is_panic() { "panicked" } else { "was cancelled" };
                    let error = ServiceError::RequestFailed(format!("{:?} request {}", kind, reason));
                    Outcome::failed(kind, GameError::from(error))
                }
            };
            // The receiver lives as long as the engine
            let _ = tx.send(Completion { ticket, outcome });
        });
        debug!("Launched {:?} request #{}", kind, ticket);
        *self.slots.get_mut(kind) = Some(InFlight { ticket, handle });
    }

    fn abort(&mut self, kind: RequestKind) {
        if let Some(in_flight) = self.slots.get_mut(kind).take() {
            debug!("Aborting {:?} request #{}", kind, in_flight.ticket);
            in_flight.handle.abort();
        }
    }

    fn publish(&self) {
        debug_assert!(self.session.is_consistent());
        self.snapshots.send_replace(self.snapshot());
    }
}

impl Drop for GameEngine {
    fn drop(&mut self) {
        for kind in [
            RequestKind::Prompts,
            RequestKind::NextCandidates,
            RequestKind::ClipRender,
            RequestKind::Merge,
        ] {
            self.abort(kind);
        }
    }
}
