/*!
 * Tests for prompt construction
 */

use std::collections::{BTreeMap, BTreeSet};
use subtrans::translation::prompts::{
    build_retranslation_prompt, build_verification_prompt, translation_system_prompt, TranslationPromptBuilder,
};
use subtrans::translation::TranslationStyle;
use subtrans::verification::{Issue, ProblemType};
use crate::common;

/// Test the window prompt names the exact block range and language
#[test]
fn test_translationPrompt_withWindow_shouldNameRangeAndLanguage() {
    let blocks = common::numbered_blocks(10);
    let terms = BTreeMap::from([("Anderson".to_string(), "Андерсон".to_string())]);

    let prompt = TranslationPromptBuilder::new("Russian")
        .with_known_terms(&terms)
        .with_context_before(&blocks[2..4])
        .with_batch(&blocks[4..8])
        .with_context_after(&blocks[8..10])
        .build();

    assert!(prompt.contains("TRANSLATE ONLY THESE BLOCKS 5-8 TO RUSSIAN:"));
    assert!(prompt.contains("- Anderson -> Андерсон"));
    assert!(!prompt.contains("No known terms yet."));

    let before = prompt.find("CONTEXT BEFORE:").unwrap();
    let batch = prompt.find("TRANSLATE ONLY").unwrap();
    let after = prompt.find("CONTEXT AFTER:").unwrap();
    assert!(before < batch && batch < after);
    assert!(prompt[before..batch].contains("line 3") && prompt[before..batch].contains("line 4"));
    assert!(prompt[after..].contains("line 9") && prompt[after..].contains("line 10"));
}

/// Test the first window of a document has no preceding context
#[test]
fn test_translationPrompt_atDocumentStart_shouldOmitContextBefore() {
    let blocks = common::numbered_blocks(4);

    let prompt = TranslationPromptBuilder::new("French").with_batch(&blocks).build();

    assert!(prompt.starts_with("KNOWN TERMS:\nNo known terms yet."));
    assert!(!prompt.contains("CONTEXT BEFORE:"));
    assert!(!prompt.contains("CONTEXT AFTER:"));
}

/// Test each style gives the model different guidance
#[test]
fn test_translationSystemPrompt_shouldDependOnStyle() {
    let precise = translation_system_prompt("German", TranslationStyle::Precise);
    let creative = translation_system_prompt("German", TranslationStyle::Creative);

    assert_ne!(precise, creative);
    assert!(precise.contains("German"));
    assert!(precise.contains("\"translations\""));
}

/// Test the analysis prompt lists both sides in order
#[test]
fn test_verificationPrompt_shouldListOriginalThenTranslated() {
    let original = common::numbered_blocks(2);
    let translated: Vec<_> = original.iter().map(|b| b.with_text(format!("tr {}", b.number))).collect();

    let prompt = build_verification_prompt(&original, &translated);

    let original_at = prompt.find("ORIGINAL BLOCKS:").unwrap();
    let translated_at = prompt.find("TRANSLATED BLOCKS:").unwrap();
    assert!(original_at < translated_at);
    assert!(prompt[translated_at..].contains("tr 2"));
}

/// Test the re-translation prompt carries problems and recommendations
#[test]
fn test_retranslationPrompt_shouldDescribeEachIssue() {
    let issues = vec![
        Issue::new(5, BTreeSet::from([ProblemType::MeaningLoss]), "five", "cinq?", 3, Some("wrong number".to_string())),
        Issue::new(6, BTreeSet::from([ProblemType::UnnaturalLanguage]), "six", "sixe", 5, None),
    ];
    let blocks = common::numbered_blocks(8);

    let prompt = build_retranslation_prompt(&issues, &blocks[2..4], &blocks[6..8], "French");

    assert!(prompt.contains("blocks 5-6"));
    assert!(prompt.contains("BLOCK 5\nOriginal: five\nCurrent: cinq?"));
    assert!(prompt.contains("Recommendations: wrong number"));
    assert!(prompt.contains("BLOCK 7\nline 7"));
    assert!(prompt.contains("UNCHANGED"));
}
