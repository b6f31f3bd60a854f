/*!
 * Tests for the provider-backed translator client
 */

use std::collections::{BTreeMap, BTreeSet};
use subtrans::errors::TranslationError;
use subtrans::providers::mock::MockProvider;
use subtrans::translation::client::{
    AnalysisRequest, BatchRequest, LlmTranslator, RetranslationRequest, TranslatorClient,
};
use subtrans::translation::TranslationStyle;
use subtrans::verification::{Issue, ProblemType};
use crate::common;

fn batch_request<'a>(
    batch: &'a [subtrans::SrtBlock],
    glossary: &'a BTreeMap<String, String>,
    style: TranslationStyle,
) -> BatchRequest<'a> {
    BatchRequest {
        batch,
        context_before: &[],
        context_after: &[],
        glossary,
        language: "French",
        style,
        seed: Some(7),
    }
}

/// Test a fenced JSON answer becomes translations and terms
#[tokio::test]
async fn test_translateBatch_withFencedJson_shouldReturnTranslationsAndTerms() {
    let provider = MockProvider::scripted([
        "```json\n{\"translations\": [{\"number\": 1, \"time\": \"ignored\", \"text\": \" un \"}, {\"number\": 2, \"text\": \"deux\"}], \"terms\": {\"Sarah\": \"Sarah\"}}\n```",
    ]);
    let translator = LlmTranslator::new(provider.clone(), "test-model");
    let blocks = common::numbered_blocks(2);
    let glossary = BTreeMap::new();

    let result = translator
        .translate_batch(&batch_request(&blocks, &glossary, TranslationStyle::Natural))
        .await
        .unwrap();

    assert_eq!(result.translations.get(&1).map(String::as_str), Some("un"));
    assert_eq!(result.translations.get(&2).map(String::as_str), Some("deux"));
    assert_eq!(result.terms.get("Sarah").map(String::as_str), Some("Sarah"));
    assert_eq!(provider.request_count(), 1);
}

/// Test style sampling and the seed reach the provider
#[tokio::test]
async fn test_translateBatch_shouldSendStyleSamplingAndSeed() {
    let provider = MockProvider::scripted(["{\"translations\": [{\"number\": 1, \"text\": \"un\"}]}"]);
    let translator = LlmTranslator::new(provider.clone(), "test-model");
    let blocks = common::numbered_blocks(1);
    let glossary = BTreeMap::from([("Tom".to_string(), "Thomas".to_string())]);

    translator
        .translate_batch(&batch_request(&blocks, &glossary, TranslationStyle::Creative))
        .await
        .unwrap();

    let request = &provider.requests()[0];
    let (temperature, top_p) = TranslationStyle::Creative.sampling_parameters();
    assert_eq!(request.temperature, Some(temperature));
    assert_eq!(request.top_p, Some(top_p));
    assert_eq!(request.seed, Some(7));
    assert!(request.user_content().contains("- Tom -> Thomas"));
}

/// Test an empty completion is reported as such
#[tokio::test]
async fn test_translateBatch_withEmptyCompletion_shouldFail() {
    let translator = LlmTranslator::new(MockProvider::empty(), "test-model");
    let blocks = common::numbered_blocks(1);
    let glossary = BTreeMap::new();

    let result = translator
        .translate_batch(&batch_request(&blocks, &glossary, TranslationStyle::Natural))
        .await;

    assert!(matches!(result, Err(TranslationError::EmptyResponse)));
}

/// Test a provider failure surfaces as a provider error
#[tokio::test]
async fn test_translateBatch_withFailingProvider_shouldReturnProviderError() {
    let translator = LlmTranslator::new(MockProvider::failing(), "test-model");
    let blocks = common::numbered_blocks(1);
    let glossary = BTreeMap::new();

    let result = translator
        .translate_batch(&batch_request(&blocks, &glossary, TranslationStyle::Natural))
        .await;

    assert!(matches!(result, Err(TranslationError::Provider(_))));
}

/// Test analysis keeps known categories and clamps the score
#[tokio::test]
async fn test_analyze_withMixedLabels_shouldKeepKnownOnes() {
    let provider = MockProvider::scripted([
        "Here you go: {\"blocks\": [\
            {\"blockNumber\": 2, \"problemTypes\": [\"TOO_LITERAL\", \"SPELLING\"], \"qualityScore\": 14, \"recommendations\": \"smoother\"},\
            {\"blockNumber\": 3, \"problemTypes\": [\"SPELLING\"], \"qualityScore\": 2}\
        ]}",
    ]);
    let translator = LlmTranslator::new(provider.clone(), "test-model").with_analysis_parameters(0.1, 0.9);
    let original = common::numbered_blocks(3);

    let reports = translator
        .analyze(&AnalysisRequest { original: &original, translated: &original, language: "French" })
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].block_number, 2);
    assert_eq!(reports[0].problem_types, BTreeSet::from([ProblemType::TooLiteral]));
    assert_eq!(reports[0].quality_score, 10);
    assert_eq!(provider.requests()[0].temperature, Some(0.1));
}

/// Test an unreadable analysis answer yields no issues
#[tokio::test]
async fn test_analyze_withProse_shouldReturnNoReports() {
    let translator = LlmTranslator::new(MockProvider::scripted(["Everything looks fine to me."]), "test-model");
    let blocks = common::numbered_blocks(2);

    let reports = translator
        .analyze(&AnalysisRequest { original: &blocks, translated: &blocks, language: "French" })
        .await
        .unwrap();

    assert!(reports.is_empty());
}

/// Test re-translation keeps only requested, changed blocks
#[tokio::test]
async fn test_retranslate_shouldDropUnchangedAndForeignBlocks() {
    let provider = MockProvider::scripted([
        "BLOCK 4\nmieux quatre\nsur deux lignes\nBLOCK 5\nUNCHANGED\nBLOCK 9\nhors sujet",
    ]);
    let translator = LlmTranslator::new(provider, "test-model");
    let issues = vec![
        Issue::new(4, BTreeSet::from([ProblemType::GrammarIssues]), "four", "quatr", 3, None),
        Issue::new(5, BTreeSet::from([ProblemType::TooLong]), "five", "cinq cinq cinq", 4, None),
    ];

    let improved = translator
        .retranslate(&RetranslationRequest {
            issues: &issues,
            context_before: &[],
            context_after: &[],
            language: "French",
        })
        .await
        .unwrap();

    assert_eq!(improved.len(), 1);
    assert_eq!(improved.get(&4).map(String::as_str), Some("mieux quatre\nsur deux lignes"));
}
