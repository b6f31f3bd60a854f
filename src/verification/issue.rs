use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// @module: Translation issues and reviewer decisions

/// Closed taxonomy of translation defects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemType {
    MeaningLoss,
    GrammarIssues,
    ContextMismatch,
    TechnicalErrors,
    UnnaturalLanguage,
    TooLiteral,
    TooFree,
    InconsistentStyle,
    TooLong,
}

impl ProblemType {
    pub const ALL: [ProblemType; 9] = [
        Self::MeaningLoss,
        Self::GrammarIssues,
        Self::ContextMismatch,
        Self::TechnicalErrors,
        Self::UnnaturalLanguage,
        Self::TooLiteral,
        Self::TooFree,
        Self::InconsistentStyle,
        Self::TooLong,
    ];

    /// Label used in prompts and responses
    pub fn label(&self) -> &'static str {
        match self {
            Self::MeaningLoss => "MEANING_LOSS",
            Self::GrammarIssues => "GRAMMAR_ISSUES",
            Self::ContextMismatch => "CONTEXT_MISMATCH",
            Self::TechnicalErrors => "TECHNICAL_ERRORS",
            Self::UnnaturalLanguage => "UNNATURAL_LANGUAGE",
            Self::TooLiteral => "TOO_LITERAL",
            Self::TooFree => "TOO_FREE",
            Self::InconsistentStyle => "INCONSISTENT_STYLE",
            Self::TooLong => "TOO_LONG",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MeaningLoss => "When important meaning from original is missing",
            Self::GrammarIssues => "Incorrect grammar structure",
            Self::ContextMismatch => "Translation doesn't fit surrounding context",
            Self::TechnicalErrors => "Issues with format, timecodes or markers",
            Self::UnnaturalLanguage => "Sounds mechanical or non-native",
            Self::TooLiteral => "Word-for-word translation that sounds awkward",
            Self::TooFree => "Diverges too much from original meaning",
            Self::InconsistentStyle => "Style differs from rest of translation",
            Self::TooLong => "Translation won't fit timing constraints",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProblemType {
    type Err = String;

    /// Accepts any casing, and spaces or dashes in place of underscores
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|problem| problem.label() == normalized)
            .ok_or_else(|| format!("Unknown problem type: {}", s))
    }
}

/// Review status of an issue
///
/// `Pending` moves to exactly one of the other states and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueStatus {
    #[default]
    Pending,
    Approved,
    /// Part of the status vocabulary; no reviewer decision produces it
    Rejected,
    ManuallyEdited,
    Skipped,
}

impl IssueStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What the reviewer chose for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DecisionKind {
    /// Accept the improved translation, optionally as touched up by the reviewer
    Approve {
        #[serde(default)]
        text: Option<String>,
    },
    /// Replace the translation with reviewer text
    Edit { text: String },
    /// Keep the translation from before the round
    Skip,
}

/// A reviewer decision, addressed by block number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub block_number: usize,
    #[serde(flatten)]
    pub kind: DecisionKind,
}

impl Decision {
    pub fn approve(block_number: usize, text: Option<String>) -> Self {
        Self { block_number, kind: DecisionKind::Approve { text } }
    }

    pub fn edit(block_number: usize, text: impl Into<String>) -> Self {
        Self { block_number, kind: DecisionKind::Edit { text: text.into() } }
    }

    pub fn skip(block_number: usize) -> Self {
        Self { block_number, kind: DecisionKind::Skip }
    }

    /// Status an issue takes when this decision is applied
    pub fn status(&self) -> IssueStatus {
        match self.kind {
            DecisionKind::Approve { .. } => IssueStatus::Approved,
            DecisionKind::Edit { .. } => IssueStatus::ManuallyEdited,
            DecisionKind::Skip => IssueStatus::Skipped,
        }
    }
}

/// A defect found in one translated block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub block_number: usize,
    pub problem_types: BTreeSet<ProblemType>,
    pub original_text: String,
    /// Translation at detection time
    pub current_translation: String,
    pub improved_translation: Option<String>,
    pub status: IssueStatus,
    pub manual_translation: Option<String>,
    /// 1 (unusable) to 10 (perfect)
    pub quality_score: u8,
    pub recommendations: Option<String>,
}

impl Issue {
    pub fn new(
        block_number: usize,
        problem_types: BTreeSet<ProblemType>,
        original_text: impl Into<String>,
        current_translation: impl Into<String>,
        quality_score: u8,
        recommendations: Option<String>,
    ) -> Self {
        Self {
            block_number,
            problem_types,
            original_text: original_text.into(),
            current_translation: current_translation.into(),
            improved_translation: None,
            status: IssueStatus::Pending,
            manual_translation: None,
            quality_score: quality_score.clamp(1, 10),
            recommendations,
        }
    }

    /// Apply a reviewer decision
    ///
    /// Only a pending issue accepts a decision; returns `false` otherwise or
    /// when the decision addresses another block.
    pub fn apply(&mut self, decision: &Decision) -> bool {
        if decision.block_number != self.block_number {
            warn!("Decision for block {} offered to issue on block {}", decision.block_number, self.block_number);
            return false;
        }
        if self.status.is_terminal() {
            warn!("Issue on block {} is already {:?}, ignoring {:?}", self.block_number, self.status, decision.kind);
            return false;
        }

        match &decision.kind {
            DecisionKind::Approve { text } => {
                if let Some(text) = text.as_ref().filter(|t| !t.trim().is_empty()) {
                    self.improved_translation = Some(text.clone());
                }
            }
            DecisionKind::Edit { text } => self.manual_translation = Some(text.clone()),
            DecisionKind::Skip => {}
        }
        self.status = decision.status();
        true
    }

    /// Text the block ends up with, `None` while undecided
    pub fn final_text(&self) -> Option<&str> {
        match self.status {
            IssueStatus::Pending => None,
            IssueStatus::Approved => Some(
                self.improved_translation
                    .as_deref()
                    .unwrap_or(&self.current_translation),
            ),
            IssueStatus::ManuallyEdited => Some(
                self.manual_translation
                    .as_deref()
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or(&self.current_translation),
            ),
            IssueStatus::Skipped | IssueStatus::Rejected => Some(&self.current_translation),
        }
    }
}
