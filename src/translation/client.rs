/*!
 * Translator client: the three kinds of model calls the pipeline makes.
 *
 * - translation mode: a window of blocks plus context and glossary in,
 *   translations and new glossary terms out (JSON)
 * - analysis mode: original and translated blocks in, defect reports out (JSON)
 * - re-translation: one issue group in, `BLOCK n` sections out
 *
 * `TranslatorClient` is the seam the orchestrator and the verification
 * workflow depend on; `LlmTranslator` implements it over any chat `Provider`.
 */

use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::TranslationError;
use crate::providers::Provider;
use crate::providers::openai::{ChatRequest, ChatResponse};
use crate::subtitle_processor::SrtBlock;
use crate::translation::prompts::{self, TranslationPromptBuilder, TranslationStyle};
use crate::verification::issue::{Issue, ProblemType};

/// Input of a translation-mode call
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub batch: &'a [SrtBlock],
    pub context_before: &'a [SrtBlock],
    pub context_after: &'a [SrtBlock],
    pub glossary: &'a BTreeMap<String, String>,
    pub language: &'a str,
    pub style: TranslationStyle,
    pub seed: Option<u64>,
}

/// Output of a translation-mode call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTranslation {
    /// Translated text by block number
    pub translations: BTreeMap<usize, String>,
    /// Terms the model proposes for the glossary
    pub terms: BTreeMap<String, String>,
}

/// Input of an analysis-mode call
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub original: &'a [SrtBlock],
    pub translated: &'a [SrtBlock],
    pub language: &'a str,
}

/// One defective block as reported by analysis
#[derive(Debug, Clone, PartialEq)]
pub struct DefectReport {
    pub block_number: usize,
    pub problem_types: BTreeSet<ProblemType>,
    /// Already clamped to 1..=10
    pub quality_score: u8,
    pub recommendations: Option<String>,
}

/// Input of a re-translation call for one issue group
#[derive(Debug, Clone, Copy)]
pub struct RetranslationRequest<'a> {
    pub issues: &'a [Issue],
    pub context_before: &'a [SrtBlock],
    pub context_after: &'a [SrtBlock],
    pub language: &'a str,
}

/// Model calls used by the translation and verification pipelines
#[async_trait]
pub trait TranslatorClient: Send + Sync {
    /// Translate one window
    ///
    /// Fails on transport errors and on responses that cannot be read as
    /// translations; the caller decides how to fall back.
    async fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<BatchTranslation, TranslationError>;

    /// Report defective blocks; blocks without defects are omitted
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<DefectReport>, TranslationError>;

    /// Improved translations by block number; blocks the model could not
    /// improve are absent
    async fn retranslate(&self, request: &RetranslationRequest<'_>) -> Result<HashMap<usize, String>, TranslationError>;
}

/// `TranslatorClient` backed by a chat-completion provider
#[derive(Debug)]
pub struct LlmTranslator<P> {
    provider: P,
    model: String,
    analysis_temperature: f32,
    analysis_top_p: f32,
}

impl<P> LlmTranslator<P>
where
    P: Provider<Request = ChatRequest, Response = ChatResponse>,
{
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            analysis_temperature: 0.1,
            analysis_top_p: 0.9,
        }
    }

    /// Sampling parameters for analysis and re-translation calls
    pub fn with_analysis_parameters(mut self, temperature: f32, top_p: f32) -> Self {
        self.analysis_temperature = temperature;
        self.analysis_top_p = top_p;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, TranslationError> {
        let response = self.provider.complete(request).await?;
        Ok(P::extract_text(&response))
    }
}

#[async_trait]
impl<P> TranslatorClient for LlmTranslator<P>
where
    P: Provider<Request = ChatRequest, Response = ChatResponse>,
{
    async fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<BatchTranslation, TranslationError> {
        if request.batch.is_empty() {
            return Err(TranslationError::InvalidArgument("Batch cannot be empty".to_string()));
        }
        if request.language.trim().is_empty() {
            return Err(TranslationError::InvalidArgument("Language cannot be empty".to_string()));
        }

        let (temperature, top_p) = request.style.sampling_parameters();
        let user_prompt = TranslationPromptBuilder::new(request.language)
            .with_known_terms(request.glossary)
            .with_context_before(request.context_before)
            .with_batch(request.batch)
            .with_context_after(request.context_after)
            .build();

        let chat_request = ChatRequest::new(&self.model)
            .system(prompts::translation_system_prompt(request.language, request.style))
            .user(user_prompt)
            .temperature(temperature)
            .top_p(top_p)
            .seed(request.seed);

        let text = self.chat(chat_request).await?;
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        parse_translation_response(&text)
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<DefectReport>, TranslationError> {
        let chat_request = ChatRequest::new(&self.model)
            .system(prompts::verification_system_prompt(request.language))
            .user(prompts::build_verification_prompt(request.original, request.translated))
            .temperature(self.analysis_temperature)
            .top_p(self.analysis_top_p);

        let text = self.chat(chat_request).await?;
        match parse_verification_response(&text) {
            Ok(reports) => Ok(reports),
            Err(e) => {
                // no issues for this window
                warn!("Ignoring unreadable analysis response: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn retranslate(&self, request: &RetranslationRequest<'_>) -> Result<HashMap<usize, String>, TranslationError> {
        if request.issues.is_empty() {
            return Ok(HashMap::new());
        }

        let chat_request = ChatRequest::new(&self.model)
            .system(prompts::RETRANSLATION_SYSTEM_PROMPT)
            .user(prompts::build_retranslation_prompt(
                request.issues,
                request.context_before,
                request.context_after,
                request.language,
            ))
            .temperature(self.analysis_temperature)
            .top_p(self.analysis_top_p);

        let text = self.chat(chat_request).await?;
        let wanted: BTreeSet<usize> = request.issues.iter().map(|issue| issue.block_number).collect();
        let improved: HashMap<usize, String> = parse_block_sections(&text)
            .into_iter()
            .filter(|(number, _)| wanted.contains(number))
            .collect();
        debug!("Re-translation returned {} of {} block(s)", improved.len(), wanted.len());
        Ok(improved)
    }
}

static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*BLOCK\s+(\d+)\s*:?\s*$").expect("block header regex is valid")
});

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[\s\S]*\}").expect("json object regex is valid")
});

const UNCHANGED_MARKER: &str = "UNCHANGED";

/// Strip Markdown code fences and keep the outermost JSON object
pub fn clean_json_response(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest.trim();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim();
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

#[derive(Debug, Deserialize)]
struct RawTranslationResponse {
    #[serde(default)]
    translations: Vec<RawTranslatedBlock>,
    #[serde(default)]
    terms: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawTranslatedBlock {
    number: usize,
    // Time ranges always come from the source document
    #[serde(default)]
    #[allow(dead_code)]
    time: Option<String>,
    text: String,
}

/// Parse a translation-mode response
pub fn parse_translation_response(response: &str) -> Result<BatchTranslation, TranslationError> {
    let json = clean_json_response(response);
    let raw: RawTranslationResponse = serde_json::from_str(json)
        .map_err(|e| TranslationError::MalformedResponse(format!("invalid translation JSON: {}", e)))?;

    if raw.translations.is_empty() {
        return Err(TranslationError::MalformedResponse("response contains no translations".to_string()));
    }

    Ok(BatchTranslation {
        translations: raw
            .translations
            .into_iter()
            .filter_map(|block| {
                let text = block.text.trim();
                if text.is_empty() {
                    warn!("Dropping blank translation for block {}", block.number);
                    None
                } else {
                    Some((block.number, text.to_string()))
                }
            })
            .collect(),
        terms: raw.terms.unwrap_or_default().into_iter().collect(),
    })
}

#[derive(Debug, Deserialize)]
struct RawVerificationResult {
    #[serde(default)]
    blocks: Vec<RawBlockReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockReport {
    #[serde(alias = "block_number", alias = "BlockNumber")]
    block_number: usize,
    #[serde(default, alias = "problem_types", alias = "ProblemTypes")]
    problem_types: Vec<String>,
    #[serde(default, alias = "quality_score", alias = "QualityScore")]
    quality_score: Option<f64>,
    #[serde(default, alias = "Recommendations")]
    recommendations: Option<String>,
}

/// Parse an analysis-mode response
///
/// Unknown category labels are dropped, and a block left without any known
/// label is not reported.
pub fn parse_verification_response(response: &str) -> Result<Vec<DefectReport>, TranslationError> {
    let json = JSON_OBJECT
        .find(response)
        .map(|m| m.as_str())
        .ok_or_else(|| TranslationError::MalformedResponse("no JSON object in analysis response".to_string()))?;
    let raw: RawVerificationResult = serde_json::from_str(json)
        .map_err(|e| TranslationError::MalformedResponse(format!("invalid analysis JSON: {}", e)))?;

    let mut reports = Vec::with_capacity(raw.blocks.len());
    for block in raw.blocks {
        let problem_types: BTreeSet<ProblemType> = block
            .problem_types
            .iter()
            .filter_map(|label| match label.parse::<ProblemType>() {
                Ok(problem) => Some(problem),
                Err(e) => {
                    debug!("Block {}: {}", block.block_number, e);
                    None
                }
            })
            .collect();
        if problem_types.is_empty() {
            continue;
        }

        let score = block.quality_score.unwrap_or(1.0).round().clamp(1.0, 10.0) as u8;
        reports.push(DefectReport {
            block_number: block.block_number,
            problem_types,
            quality_score: score,
            recommendations: block.recommendations.filter(|r| !r.trim().is_empty()),
        });
    }
    Ok(reports)
}

/// Parse `BLOCK n` sections of a re-translation response
///
/// Sections marked `UNCHANGED` or left empty are omitted. Text before the
/// first header is ignored.
pub fn parse_block_sections(response: &str) -> BTreeMap<usize, String> {
    let mut result = BTreeMap::new();
    let mut current: Option<(usize, Vec<&str>)> = None;

    for line in response.lines() {
        if let Some(captures) = BLOCK_HEADER.captures(line) {
            finish_section(current.take(), &mut result);
            current = captures[1].parse::<usize>().ok().map(|number| (number, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    finish_section(current, &mut result);

    result
}

fn finish_section(section: Option<(usize, Vec<&str>)>, result: &mut BTreeMap<usize, String>) {
    if let Some((number, lines)) = section {
        let text = lines.join("\n").trim().to_string();
        if !text.is_empty() && text != UNCHANGED_MARKER {
            result.insert(number, text);
        }
    }
}
