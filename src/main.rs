// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::PathBuf;

use subchain::app_config::{Config, LogLevel};
use subchain::app_controller::Controller;
use subchain::display;
use subchain::models::{CorpusSelection, GameMode};

/// CLI Wrapper for GameMode to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGameMode {
    Chain,
    Rhyme,
    Dialogue,
}

impl From<CliGameMode> for GameMode {
    fn from(cli_mode: CliGameMode) -> Self {
        match cli_mode {
            CliGameMode::Chain => GameMode::Chain,
            CliGameMode::Rhyme => GameMode::Rhyme,
            CliGameMode::Dialogue => GameMode::Dialogue,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a game in the terminal
    Play {
        /// Game mode
        #[arg(short, long, value_enum, default_value = "chain")]
        mode: CliGameMode,

        /// Corpus ids to play with, comma separated (default: config, then all)
        #[arg(short, long, value_delimiter = ',')]
        corpus: Vec<String>,
    },

    /// Search subtitle lines
    Search {
        /// Text or regular expression to look for
        #[arg(value_name = "QUERY")]
        query: String,

        /// Treat the query as a regular expression
        #[arg(short, long)]
        regex: bool,

        /// Corpus ids to search, comma separated (default: config, then all)
        #[arg(short, long, value_delimiter = ',')]
        corpus: Vec<String>,

        /// Render the clip of result N (1-based)
        #[arg(long, value_name = "N")]
        clip: Option<usize>,
    },

    /// Show the backend status and corpus list
    Status,

    /// Generate shell completions for subchain
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// subchain - subtitle chaining games
///
/// Builds short videos out of TV subtitle lines by chaining, rhyming or
/// answering one line with the next.
#[derive(Parser, Debug)]
#[command(name = "subchain")]
#[command(version)]
#[command(about = "Subtitle chaining games on a drama corpus")]
#[command(long_about = "subchain plays subtitle games against a subtitle backend and merges the chosen clips into one video.

EXAMPLES:
    subchain play                               # Chain game on every corpus
    subchain play -m rhyme -c zhenhuan          # Rhyme game on one corpus
    subchain play --offline                     # Chain game on the demo corpus
    subchain search 臣妾                        # Plain search
    subchain search -r '^走' --clip 1           # Regex search, render the first clip
    subchain status                             # List corpora
    subchain completions bash > subchain.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Subtitle backend URL, overrides the config file
    #[arg(short, long, global = true, env = "SUBCHAIN_ENDPOINT")]
    endpoint: Option<String>,

    /// Play on the built-in demo corpus instead of a backend
    #[arg(long, global = true)]
    offline: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the effective level is set through max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subchain", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = cli.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    let config = load_config(&cli)?;
    let controller = if cli.offline {
        info!("Offline mode: using the built-in demo corpus");
        Controller::offline(config)
    } else {
        Controller::with_config(config)?
    };

    match cli.command {
        Commands::Play { mode, corpus } => {
            let catalog = controller.status().await;
            if let Err(e) = &catalog {
                warn!("{:#}", e);
            }
            let corpora = controller.initial_selection(requested(corpus), catalog.as_ref().ok())?;
            info!("Playing {} on [{}]", GameMode::from(mode), corpora.to_param());
            controller.run_game(mode.into(), corpora).await
        }
        Commands::Search {
            query,
            regex,
            corpus,
            clip,
        } => {
            let catalog = controller.status().await.ok();
            let corpora = controller.initial_selection(requested(corpus), catalog.as_ref())?;
            let (results, rendered) = controller.run_search(&query, regex, &corpora, clip).await?;
            if results.is_empty() {
                println!("没有找到结果");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "  [{}] {}",
                    i + 1,
                    display::candidate_line(result, GameMode::Chain, catalog.as_ref())
                );
            }
            if let Some(clip) = rendered {
                println!("视频片段: {}", clip);
            }
            Ok(())
        }
        Commands::Status => {
            let catalog = controller.status().await?;
            print!("{}", display::render_catalog(&catalog));
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn requested(corpus: Vec<String>) -> Option<CorpusSelection> {
    if corpus.is_empty() {
        None
    } else {
        Some(corpus.into_iter().filter(|id| !id.trim().is_empty()).collect())
    }
}

/// Load the config file, apply command line overrides and validate the result
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config)?;

    if let Some(endpoint) = &cli.endpoint {
        config.backend.endpoint = endpoint.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}
