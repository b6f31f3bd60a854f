/*!
 * Tests for SRT parsing and rendering
 */

use anyhow::Result;
use subtrans::errors::SubtitleError;
use subtrans::subtitle_processor::{SrtBlock, SrtParser};
use crate::common;

/// Test parsing a realistic dialogue with a two-line block
#[test]
fn test_parseDocument_withDialogue_shouldKeepNumbersTimesAndLines() -> Result<()> {
    let blocks = SrtParser::parse_document(common::sample_srt())?;

    assert_eq!(common::numbers(&blocks), vec![1, 2, 3]);
    assert_eq!(blocks[1].time, "00:00:05,000 --> 00:00:09,000");
    assert_eq!(blocks[1].text, "Morning, Sarah.\nAny messages?");
    Ok(())
}

/// Test that text with leading and trailing blank lines still parses
#[test]
fn test_parse_withSurroundingWhitespace_shouldIgnoreIt() {
    let content = format!("\n\n\n{}\n\n\n", common::sample_srt());

    assert_eq!(SrtParser::parse(&content).len(), 3);
}

/// Test that gaps in numbering survive a round through the file format
#[test]
fn test_build_withNumberGaps_shouldPreserveNumbers() {
    let blocks = vec![
        SrtBlock::new(2, common::time_range(2), "two"),
        SrtBlock::new(5, common::time_range(5), "five"),
        SrtBlock::new(9, common::time_range(9), "nine"),
    ];

    let parsed = SrtParser::parse(&SrtParser::build(&blocks));

    assert_eq!(parsed, blocks);
}

/// Test that a file read from disk parses like the in-memory text
#[test]
fn test_parseDocument_fromFile_shouldMatchInMemoryParse() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(dir.path(), "movie.srt", &common::numbered_srt(12))?;

    let blocks = SrtParser::parse_document(&std::fs::read_to_string(path)?)?;

    assert_eq!(blocks, common::numbered_blocks(12));
    Ok(())
}

/// Test that content without a single valid record is rejected
#[test]
fn test_parseDocument_withOnlyGarbage_shouldFail() {
    let result = SrtParser::parse_document("WEBVTT\n\nnot srt at all\n");

    assert!(matches!(result, Err(SubtitleError::NoValidBlocks)));
}

/// Test that with_text keeps identity
#[test]
fn test_withText_shouldKeepNumberAndTime() {
    let block = SrtBlock::new(4, common::time_range(4), "hello");

    let translated = block.with_text("bonjour");

    assert_eq!((translated.number, translated.time.as_str()), (4, block.time.as_str()));
    assert_eq!(translated.text, "bonjour");
}
