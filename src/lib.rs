/*!
 * # subtrans - AI subtitle translation with reviewer approval
 *
 * A Rust library for translating SRT subtitles with a chat-completion model
 * and reviewing the result with a human in the loop.
 *
 * ## Features
 *
 * - Batch translation with surrounding context and a per-job glossary
 * - Pause, resume and cancel of running jobs
 * - Quality scan in overlapping windows with a fixed problem taxonomy
 * - Grouped re-translation of defective blocks
 * - Per-block approval, manual edit or skip by a reviewer
 * - OpenAI-compatible providers: Mistral, OpenAI, OpenRouter
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing and rendering
 * - `providers`: Chat-completion clients
 * - `translation`: Batch translation:
 *   - `translation::client`: Prompting the model and parsing its answers
 *   - `translation::orchestrator`: Window loop with fallbacks
 *   - `translation::control`: Pause and cancel flags
 *   - `translation::glossary`: Terms learned during a job
 * - `verification`: Review of a finished translation
 * - `events`: Notifications sent while jobs run
 * - `service`: Entry point owning per-job state
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod errors;
pub mod events;
pub mod language_utils;
pub mod providers;
pub mod service;
pub mod subtitle_processor;
pub mod translation;
pub mod verification;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, ProviderError, SubtitleError, TranslationError, VerificationError};
pub use events::{ChannelEventSink, EventSink, JobEvent};
pub use service::SubtitleService;
pub use subtitle_processor::{SrtBlock, SrtParser};
pub use translation::{TranslationJob, TranslationOutcome, TranslationStyle};
pub use verification::{Decision, Issue, IssueStatus, ProblemType};
