use std::collections::HashSet;
use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use log::{debug, warn};

use crate::errors::SubtitleError;

// @module: SRT reading and writing

// @const: Record separator (one or more blank lines)
static RECORD_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r?\n[ \t]*\r?\n").expect("record separator regex is valid")
});

// @const: Marker that identifies the time-range line of a record
const TIME_RANGE_MARKER: &str = "-->";

// @struct: Single subtitle record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrtBlock {
    // @field: Block number, the only identity of a block
    pub number: usize,

    // @field: Time range line, kept verbatim
    pub time: String,

    // @field: Subtitle text, lines joined with '\n'
    pub text: String,
}

impl SrtBlock {
    pub fn new(number: usize, time: impl Into<String>, text: impl Into<String>) -> Self {
        SrtBlock {
            number,
            time: time.into(),
            text: text.into(),
        }
    }

    /// Same number and time range, different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        SrtBlock {
            number: self.number,
            time: self.time.clone(),
            text: text.into(),
        }
    }
}

impl fmt::Display for SrtBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.number)?;
        writeln!(f, "{}", self.time)?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Reader and writer for the SRT record format
pub struct SrtParser;

impl SrtParser {
    /// Parse SRT content into blocks sorted by ascending number
    ///
    /// Records without a numeric id line, a time-range line and at least
    /// one text line are skipped.
    pub fn parse(content: &str) -> Vec<SrtBlock> {
        let mut blocks = Vec::new();

        for (record_index, record) in RECORD_SEPARATOR.split(content.trim()).enumerate() {
            let lines: Vec<&str> = record
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();

            if lines.len() < 3 {
                debug!("Skipping record {}: expected at least 3 lines, found {}", record_index, lines.len());
                continue;
            }

            let number = match lines[0].parse::<usize>() {
                Ok(number) => number,
                Err(_) => {
                    debug!("Skipping record {}: '{}' is not a block number", record_index, lines[0]);
                    continue;
                }
            };

            if !lines[1].contains(TIME_RANGE_MARKER) {
                debug!("Skipping record {}: '{}' is not a time range", record_index, lines[1]);
                continue;
            }

            blocks.push(SrtBlock::new(number, lines[1], lines[2..].join("\n")));
        }

        blocks.sort_by_key(|block| block.number);
        blocks
    }

    /// Parse SRT content that is about to enter the pipeline
    ///
    /// Unlike [`SrtParser::parse`], an empty result or a repeated block
    /// number is an error, since numbers key every later stage.
    pub fn parse_document(content: &str) -> Result<Vec<SrtBlock>, SubtitleError> {
        let blocks = Self::parse(content);
        if blocks.is_empty() {
            warn!("No valid subtitle blocks found in content");
            return Err(SubtitleError::NoValidBlocks);
        }

        let mut seen = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if !seen.insert(block.number) {
                return Err(SubtitleError::DuplicateBlockNumber(block.number));
            }
        }

        Ok(blocks)
    }

    /// Serialize blocks back to SRT, one blank line between records
    pub fn build(blocks: &[SrtBlock]) -> String {
        blocks.iter().map(ToString::to_string).collect()
    }
}
