/*!
 * Common test utilities for the subtrans test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use subtrans::events::JobEvent;
use subtrans::subtitle_processor::SrtBlock;

// Re-export the scripted translator module
pub mod scripted_translator;

pub use scripted_translator::{RecordedBatch, ScriptedTranslator, WindowHold, scripted_translation};

/// Route library logs to the test harness once per binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Time range of the `n`th one-second block
pub fn time_range(n: usize) -> String {
    format!("00:00:{:02},000 --> 00:00:{:02},500", n % 60, n % 60)
}

/// Blocks 1..=count with text "line N"
pub fn numbered_blocks(count: usize) -> Vec<SrtBlock> {
    (1..=count).map(|n| SrtBlock::new(n, time_range(n), format!("line {}", n))).collect()
}

/// SRT text of blocks 1..=count with text "line N"
pub fn numbered_srt(count: usize) -> String {
    subtrans::SrtParser::build(&numbered_blocks(count))
}

/// A short dialogue in SRT form
pub fn sample_srt() -> &'static str {
    "1\n00:00:01,000 --> 00:00:04,000\nGood morning, Mr. Anderson.\n\n\
     2\n00:00:05,000 --> 00:00:09,000\nMorning, Sarah.\nAny messages?\n\n\
     3\n00:00:10,000 --> 00:00:14,000\nJust one. From your brother.\n"
}

/// Every event emitted so far
pub fn drain_events(receiver: &mut UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Block numbers of a slice of blocks
pub fn numbers(blocks: &[SrtBlock]) -> Vec<usize> {
    blocks.iter().map(|block| block.number).collect()
}
