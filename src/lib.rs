/*!
 * # subchain - subtitle chaining games
 *
 * A Rust library for building short videos out of TV subtitle lines.
 *
 * ## Features
 *
 * - Three game modes over a subtitle corpus:
 *   - Chain (接龙): each line starts with the last character of the previous one
 *   - Rhyme (押韵): each line rhymes with the previous one
 *   - Dialogue (对话): each line answers the previous one
 * - Clip rendering for every confirmed line
 * - Merging the accumulated clips into one video
 * - Corpus selection across several dramas
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `game`: Game logic:
 *   - `game::filter`: Pure text filters (filler particles, anchor character, classification)
 *   - `game::source`: Candidate sources, one per game mode
 *   - `game::session`: The session aggregate and its snapshots
 *   - `game::engine`: The session state machine
 *   - `game::export`: Clip merging
 * - `services`: Collaborator traits and their implementations:
 *   - `services::http`: Subtitle backend JSON API client
 *   - `services::mock`: In-memory backend for tests and demos
 * - `app_controller`: Terminal game controller
 * - `display`: Terminal rendering helpers
 * - `models`: Shared data types
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod display;
pub mod errors;
pub mod game;
pub mod models;
pub mod services;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, GameError, ServiceError};
pub use game::{GameEngine, GameSession, SessionSnapshot, SessionState, Update};
pub use models::{ClipReference, CorpusSelection, GameMode, SentenceCandidate};
pub use services::Services;
