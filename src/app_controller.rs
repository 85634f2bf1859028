use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app_config::Config;
use crate::display;
use crate::errors::GameError;
use crate::game::engine::{GameEngine, RequestKind, Update};
use crate::game::export::ExportArtifact;
use crate::game::session::SessionState;
use crate::models::{CatalogStatus, ClipReference, CorpusSelection, GameMode, SentenceCandidate};
use crate::services::Services;
use crate::services::http::HttpBackend;
use crate::services::mock::MockBackend;

// @module: Application controller for the terminal game

/// One line of player input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// 1-based index into the offered candidates
    Select(usize),
    Confirm,
    Cancel,
    RetryClip,
    Refresh,
    Back,
    Export,
    NewGame,
    Help,
    Quit,
}

impl FromStr for PlayerCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim().to_lowercase();
        if let Ok(index) = input.parse::<usize>() {
            return if index == 0 {
                Err(anyhow!("Candidates are numbered from 1"))
            } else {
                Ok(Self::Select(index))
            };
        }
        match input.as_str() {
            "y" | "yes" => Ok(Self::Confirm),
            "n" | "no" => Ok(Self::Cancel),
            "c" | "clip" => Ok(Self::RetryClip),
            "r" | "refresh" => Ok(Self::Refresh),
            "b" | "back" => Ok(Self::Back),
            "e" | "export" => Ok(Self::Export),
            "g" | "new" => Ok(Self::NewGame),
            "?" | "h" | "help" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            _ => Err(anyhow!("Unknown command: {}", s.trim())),
        }
    }
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Collaborators the engines are built on
    services: Services,
    // @field: HTTP backend used for downloads, absent when running on other services
    downloader: Option<Arc<HttpBackend>>,
}

impl Controller {
    // @method: Create a controller talking to the configured backend
    pub fn with_config(config: Config) -> Result<Self> {
        let backend = Arc::new(
            HttpBackend::new(&config.backend.endpoint, config.backend.timeout_secs)
                .context("Failed to create backend client")?,
        );
        let services = Services::from_backend(backend.clone());
        Ok(Self {
            config,
            services,
            downloader: Some(backend),
        })
    }

    /// Create a controller on explicit services; merged videos are not downloaded
    pub fn with_services(config: Config, services: Services) -> Self {
        Self {
            config,
            services,
            downloader: None,
        }
    }

    /// Create a controller playing on the built-in demo corpus, without a backend
    pub fn offline(config: Config) -> Self {
        let backend = MockBackend::demo().with_shuffled_samples(StdRng::from_os_rng());
        Self::with_services(config, Services::from_backend(Arc::new(backend)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the corpus catalog
    pub async fn status(&self) -> Result<CatalogStatus> {
        let catalog = self
            .services
            .catalog
            .catalog_status()
            .await
            .context("Failed to fetch backend status")?;
        debug!("Backend reports {} corpora", catalog.corpora.len());
        Ok(catalog)
    }

    /// Corpus selection for a new game: explicit ids, then configured ids, then every corpus
    pub fn initial_selection(
        &self,
        requested: Option<CorpusSelection>,
        catalog: Option<&CatalogStatus>,
    ) -> Result<CorpusSelection> {
        let selection = requested
            .filter(|s| !s.is_empty())
            .or_else(|| self.config.default_selection())
            .or_else(|| catalog.map(CatalogStatus::select_all))
            .unwrap_or_default();

        if selection.is_empty() {
            return Err(GameError::EmptyCorpusSelection.into());
        }
        if let Some(catalog) = catalog {
            for id in selection.iter().filter(|id| !catalog.corpora.iter().any(|c| c.id == *id)) {
                warn!("Corpus '{}' is not listed by the backend", id);
            }
        }
        Ok(selection)
    }

    /// Build an engine for `mode`
    pub fn new_engine(&self, mode: GameMode, corpora: CorpusSelection) -> GameEngine {
        GameEngine::for_mode(mode, &self.services, &self.config.game, corpora)
    }

    /// One-shot search, optionally rendering the clip of result `clip` (1-based)
    pub async fn run_search(
        &self,
        query: &str,
        regex: bool,
        corpora: &CorpusSelection,
        clip: Option<usize>,
    ) -> Result<(Vec<SentenceCandidate>, Option<ClipReference>)> {
        if regex {
            regex::Regex::new(query).with_context(|| format!("Invalid regular expression: {}", query))?;
        }

        let spinner = Self::spinner("搜索中...");
        let results = self.services.search.search(query, regex, corpora).await;
        spinner.finish_and_clear();
        let results = results.context("Search failed")?;
        info!("Found {} results for '{}'", results.len(), query);

        let clip = match clip {
            Some(index) => {
                let sentence = index
                    .checked_sub(1)
                    .and_then(|i| results.get(i))
                    .ok_or_else(|| anyhow!("No result #{} (found {})", index, results.len()))?;
                let spinner = Self::spinner("生成视频片段...");
                let rendered = self
                    .services
                    .renderer
                    .render_clip(
                        &sentence.corpus_id,
                        &sentence.episode_id,
                        sentence.start_seconds,
                        sentence.end_seconds,
                        self.config.game.clip_padding_secs,
                    )
                    .await;
                spinner.finish_and_clear();
                Some(rendered.context("Clip rendering failed")?)
            }
            None => None,
        };

        Ok((results, clip))
    }

    /// Apply one player command; returns false when the player quits
    pub fn apply_command(&self, engine: &mut GameEngine, command: PlayerCommand) -> Result<bool, GameError> {
        match command {
            PlayerCommand::Select(index) => {
                let snapshot = engine.snapshot();
                let chosen = index.checked_sub(1).and_then(|i| snapshot.offered().get(i));
                let Some(candidate) = chosen.cloned() else {
                    warn!("No candidate #{} (offered {})", index, snapshot.offered().len());
                    return Ok(true);
                };
                match engine.session().state() {
                    SessionState::AwaitingPromptSelection => engine.select_start(candidate)?,
                    SessionState::ConfirmingStart | SessionState::ConfirmingNext => {
                        warn!("Confirm (y) or cancel (n) the pending selection first");
                    }
                    _ => engine.select_next(candidate)?,
                }
            }
            PlayerCommand::Confirm => engine.confirm_selection()?,
            PlayerCommand::Cancel => engine.cancel_selection()?,
            PlayerCommand::RetryClip => {
                if !engine.retry_clip()? {
                    info!("Clip is already rendering or ready");
                }
            }
            PlayerCommand::Refresh => {
                let refreshed = match engine.session().state() {
                    SessionState::InProgress => engine.refresh_next()?,
                    _ => engine.refresh_prompts()?,
                };
                if !refreshed {
                    info!("Still loading, please wait");
                }
            }
            PlayerCommand::Back => engine.go_back()?,
            PlayerCommand::Export => engine.request_export()?,
            PlayerCommand::NewGame => engine.start_game()?,
            PlayerCommand::Help => println!("{}", display::HELP),
            PlayerCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Apply responses until the engine is idle, showing a spinner meanwhile
    pub async fn settle(&self, engine: &mut GameEngine) -> Vec<Update> {
        if !engine.has_pending_work() {
            return Vec::new();
        }
        let spinner = Self::spinner(Self::pending_message(engine));
        let mut updates = Vec::new();
        while let Some(update) = engine.next_update().await {
            debug!("Applied {:?}", update);
            spinner.set_message(Self::pending_message(engine));
            updates.push(update);
        }
        spinner.finish_and_clear();
        updates
    }

    /// Write a merged video to the download directory
    pub async fn download_artifact(&self, artifact: &ExportArtifact) -> Result<Option<PathBuf>> {
        let Some(backend) = &self.downloader else {
            info!("Merged video available at {}", artifact.reference);
            return Ok(None);
        };

        let dir = self.config.resolve_download_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create download directory: {}", dir.display()))?;
        let target = dir.join(&artifact.file_name);

        let spinner = Self::spinner("下载视频...");
        let written = backend.download(&artifact.reference, &target).await;
        spinner.finish_and_clear();
        let bytes = written.with_context(|| format!("Failed to download {}", artifact.reference))?;

        info!("Saved {} ({} bytes)", target.display(), bytes);
        Ok(Some(target))
    }

    /// Interactive game loop on stdin
    pub async fn run_game(&self, mode: GameMode, corpora: CorpusSelection) -> Result<()> {
        let catalog = match self.status().await {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!("Corpus names unavailable: {:#}", e);
                None
            }
        };

        let mut engine = self.new_engine(mode, corpora);
        engine.start_game()?;
        println!("{}", display::HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            for update in self.settle(&mut engine).await {
                self.report(&update).await;
            }
            println!("{}", display::render_snapshot(&engine.snapshot(), catalog.as_ref()));

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<PlayerCommand>() {
                Ok(command) => command,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            match self.apply_command(&mut engine, command) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => warn!("{}", e),
            }
        }

        info!("Game over after {} steps", engine.session().log().len());
        Ok(())
    }

    async fn report(&self, update: &Update) {
        match update {
            Update::ExportReady(artifact) => {
                if let Err(e) = self.download_artifact(artifact).await {
                    error!("{:#}", e);
                }
            }
            Update::Failed { kind, message } => error!("{:?} failed: {}", kind, message),
            _ => {}
        }
    }

    fn pending_message(engine: &GameEngine) -> &'static str {
        if engine.is_busy(RequestKind::Merge) {
            "合成视频中..."
        } else if engine.is_busy(RequestKind::ClipRender) {
            "生成视频片段..."
        } else {
            "加载中..."
        }
    }

    fn spinner(message: &'static str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}
