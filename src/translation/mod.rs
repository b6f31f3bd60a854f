/*!
 * Batch translation of subtitle documents through an LLM.
 *
 * - `client`: the `TranslatorClient` seam and its provider-backed implementation
 * - `orchestrator`: windowed translation of a whole document
 * - `glossary`: first-write-wins term map shared across windows
 * - `control`: pause/cancel state of running jobs
 * - `prompts`: translation styles and prompt text
 */

// Re-export main types for easier usage
pub use self::client::{LlmTranslator, TranslatorClient};
pub use self::control::{ControlSignal, RunControl, RunControlStore, RunState};
pub use self::glossary::Glossary;
pub use self::orchestrator::{BatchOptions, BatchTranslator, JobContext, TranslationJob, TranslationOutcome};
pub use self::prompts::TranslationStyle;

// Submodules
pub mod client;
pub mod control;
pub mod glossary;
pub mod orchestrator;
pub mod prompts;
