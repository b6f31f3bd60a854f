/*!
 * Prompt templates for subtitle translation, analysis and re-translation.
 *
 * Every prompt lists blocks as `BLOCK n:` headers followed by the text, so
 * the model can echo block numbers back and responses can be matched by
 * number rather than position.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::subtitle_processor::SrtBlock;
use crate::verification::issue::{Issue, ProblemType};

/// Translation style, which selects sampling parameters and extra rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStyle {
    /// Stay as close to the source as possible
    Precise,
    /// Idiomatic target language
    #[default]
    Natural,
    /// Free adaptation of tone and references
    Creative,
}

impl TranslationStyle {
    /// Sampling parameters `(temperature, top_p)` for this style
    pub fn sampling_parameters(&self) -> (f32, f32) {
        match self {
            Self::Precise => (0.2, 0.8),
            Self::Natural => (0.4, 0.9),
            Self::Creative => (0.85, 0.95),
        }
    }

    fn instructions(&self, language: &str) -> String {
        match self {
            Self::Precise => "ADDITIONAL PRECISE TRANSLATION RULES:\n\
                1. Maintain maximum accuracy with the original text\n\
                2. Preserve all nuances and details\n\
                3. Keep technical terminology exact\n\
                4. Minimize creative liberties\n\
                5. Ensure literal meaning is preserved"
                .to_string(),
            Self::Natural => format!(
                "ADDITIONAL NATURAL TRANSLATION RULES:\n\
                1. Use natural {language} expressions\n\
                2. Adapt idioms to {language} equivalents\n\
                3. Maintain readability and flow\n\
                4. Use common {language} language patterns\n\
                5. Balance accuracy with naturalness"
            ),
            Self::Creative => format!(
                "ADDITIONAL CREATIVE TRANSLATION RULES:\n\
                1. Preserve the original style and tone\n\
                2. Use expressive {language} language\n\
                3. Adapt cultural references appropriately\n\
                4. Maintain artistic elements\n\
                5. Allow for creative interpretation while keeping the core meaning"
            ),
        }
    }
}

impl std::fmt::Display for TranslationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Precise => "precise",
            Self::Natural => "natural",
            Self::Creative => "creative",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for TranslationStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "precise" => Ok(Self::Precise),
            "natural" => Ok(Self::Natural),
            "creative" => Ok(Self::Creative),
            _ => Err(anyhow::anyhow!("Invalid translation style: {} (expected precise, natural or creative)", s)),
        }
    }
}

/// System prompt for translation mode
pub fn translation_system_prompt(language: &str, style: TranslationStyle) -> String {
    format!(
        "TRANSLATION RULES:\n\
        1. DO NOT ADD ANY ADDITIONAL INFO OR COMMENTS, ONLY THE TRANSLATION IN THE SPECIFIED FORMAT SHOULD BE PROVIDED!!!\n\
        2. Preserve EXACT format: numbers, timecodes, brackets\n\
        3. Never modify technical markers like [MUSIC]\n\
        4. Use formal {language} literary style\n\
        5. Keep line breaks and punctuation\n\
        6. Maintain consistency with surrounding context\n\
        7. Follow punctuation style from previous translated blocks\n\
        8. Never leave any block untranslated\n\
        9. If unsure about context, translate literally\n\
        10. Consider the context for better translation flow\n\
        11. Translate only the blocks listed under TRANSLATE ONLY THESE BLOCKS\n\
        \n\
        RESPONSE FORMAT:\n\
        Return a single JSON object with this exact structure:\n\
        {{\n\
          \"translations\": [{{\"number\": number, \"time\": \"original time range\", \"text\": \"translated text\"}}],\n\
          \"terms\": {{\"source term\": \"translated term\"}}\n\
        }}\n\
        Put names and recurring terms you translated into \"terms\" so later blocks stay consistent.\n\
        \n\
        {}",
        style.instructions(language)
    )
}

/// System prompt for analysis mode, listing the closed defect taxonomy
pub fn verification_system_prompt(language: &str) -> String {
    let mut categories = String::new();
    for problem in ProblemType::ALL {
        let _ = writeln!(categories, "   - {}: {}", problem.label(), problem.description());
    }

    format!(
        "You are reviewing subtitles translated into {language}.\n\
        \n\
        VERIFICATION RULES:\n\
        1. Analyze both original and translated subtitles simultaneously\n\
        2. Identify translation issues using ONLY these categories:\n\
        {categories}\
        3. Rate translation quality from 1 to 10 (1 being extremely poor, 10 being perfect)\n\
        4. Consider the context of surrounding blocks when evaluating and making recommendations\n\
        5. For blocks with issues, provide specific recommendations for improvement, but do not provide the recommended translation\n\
        \n\
        RESPONSE FORMAT:\n\
        You MUST return a valid JSON object with this exact structure:\n\
        {{\n\
          \"blocks\": [\n\
            {{\n\
              \"blockNumber\": number,\n\
              \"problemTypes\": [\"PROBLEM_TYPE1\", \"PROBLEM_TYPE2\"],\n\
              \"qualityScore\": number,\n\
              \"recommendations\": \"Specific recommendations for this block that consider context\"\n\
            }}\n\
          ]\n\
        }}\n\
        \n\
        Only include blocks with issues in the response.\n\
        If all blocks look good, return an empty array for \"blocks\"."
    )
}

/// System prompt for re-translation requests
pub const RETRANSLATION_SYSTEM_PROMPT: &str =
    "You are a professional translator. Your task is to improve the translation of subtitle blocks.";

fn format_blocks(blocks: &[SrtBlock]) -> String {
    blocks
        .iter()
        .map(|block| format!("BLOCK {}:\n{}", block.number, block.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn block_range(blocks: &[SrtBlock]) -> String {
    match (blocks.first(), blocks.last()) {
        (Some(first), Some(last)) if first.number != last.number => format!("{}-{}", first.number, last.number),
        (Some(first), _) => first.number.to_string(),
        _ => String::new(),
    }
}

/// Builder for the user prompt of a translation window
///
/// Context blocks are printed as given: the caller decides whether a
/// context-before block carries its translation or its source text.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder<'a> {
    language: &'a str,
    known_terms: Option<&'a BTreeMap<String, String>>,
    context_before: &'a [SrtBlock],
    batch: &'a [SrtBlock],
    context_after: &'a [SrtBlock],
}

impl<'a> TranslationPromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(language: &'a str) -> Self {
        Self {
            language,
            known_terms: None,
            context_before: &[],
            batch: &[],
            context_after: &[],
        }
    }

    /// Set the glossary snapshot
    pub fn with_known_terms(mut self, terms: &'a BTreeMap<String, String>) -> Self {
        self.known_terms = Some(terms);
        self
    }

    /// Set the blocks preceding the window
    pub fn with_context_before(mut self, blocks: &'a [SrtBlock]) -> Self {
        self.context_before = blocks;
        self
    }

    /// Set the blocks to translate
    pub fn with_batch(mut self, blocks: &'a [SrtBlock]) -> Self {
        self.batch = blocks;
        self
    }

    /// Set the blocks following the window
    pub fn with_context_after(mut self, blocks: &'a [SrtBlock]) -> Self {
        self.context_after = blocks;
        self
    }

    fn known_terms_section(&self) -> String {
        match self.known_terms.filter(|terms| !terms.is_empty()) {
            None => "KNOWN TERMS:\nNo known terms yet.".to_string(),
            Some(terms) => {
                let list = terms
                    .iter()
                    .map(|(source, target)| format!("- {} -> {}", source, target))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("KNOWN TERMS:\n{}", list)
            }
        }
    }

    /// Build the user prompt
    pub fn build(&self) -> String {
        let mut sections = vec![self.known_terms_section()];

        if !self.context_before.is_empty() {
            sections.push(format!("CONTEXT BEFORE:\n{}", format_blocks(self.context_before)));
        }

        sections.push(format!(
            "TRANSLATE ONLY THESE BLOCKS {} TO {}:\n{}",
            block_range(self.batch),
            self.language.to_uppercase(),
            format_blocks(self.batch)
        ));

        if !self.context_after.is_empty() {
            sections.push(format!("CONTEXT AFTER:\n{}", format_blocks(self.context_after)));
        }

        sections.join("\n\n")
    }
}

/// User prompt for analysis mode
pub fn build_verification_prompt(original: &[SrtBlock], translated: &[SrtBlock]) -> String {
    format!(
        "ORIGINAL BLOCKS:\n{}\n\nTRANSLATED BLOCKS:\n{}",
        format_blocks(original),
        format_blocks(translated)
    )
}

/// User prompt asking for better translations of one issue group
pub fn build_retranslation_prompt(
    issues: &[Issue],
    context_before: &[SrtBlock],
    context_after: &[SrtBlock],
    language: &str,
) -> String {
    let context = |blocks: &[SrtBlock]| {
        blocks
            .iter()
            .map(|block| format!("BLOCK {}\n{}", block.number, block.text))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let problem_blocks = issues
        .iter()
        .map(|issue| {
            let problems = issue
                .problem_types
                .iter()
                .map(ProblemType::label)
                .collect::<Vec<_>>()
                .join(", ");
            let mut entry = format!(
                "BLOCK {}\nOriginal: {}\nCurrent: {}\nProblems: {}",
                issue.block_number, issue.original_text, issue.current_translation, problems
            );
            if let Some(recommendations) = issue.recommendations.as_deref().filter(|r| !r.trim().is_empty()) {
                let _ = write!(entry, "\nRecommendations: {}", recommendations);
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n");

    let first = issues.iter().map(|issue| issue.block_number).min().unwrap_or_default();
    let last = issues.iter().map(|issue| issue.block_number).max().unwrap_or_default();
    let expected_format = issues
        .iter()
        .map(|issue| format!("BLOCK {}\n<translation>", issue.block_number))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your task is to improve the translation of the following subtitle blocks.\n\
        The current translation has some issues that need to be addressed.\n\
        \n\
        CONTEXT BEFORE:\n{}\n\
        \n\
        PROBLEMATIC BLOCKS:\n{}\n\
        \n\
        CONTEXT AFTER:\n{}\n\
        \n\
        INSTRUCTIONS:\n\
        - Provide better translations for blocks {}-{} that address all identified issues\n\
        - The new translation MUST be different from the current one\n\
        - Each block should be translated only once\n\
        - Maintain consistency with the context\n\
        - Keep the translation concise and natural in {}\n\
        - Preserve all formatting and technical markers\n\
        - Output ONLY the translated blocks in the following format:\n{}\n\
        - For a block that cannot be improved, output its BLOCK line followed by a single line: UNCHANGED",
        context(context_before),
        problem_blocks,
        context(context_after),
        first,
        last,
        language,
        expected_format
    )
}
