use anyhow::{Result, anyhow};
use isolang::Language;
use log::debug;

/// Language utilities for the target language of a job
///
/// Prompts name the target language in English ("Russian", "French").
/// Users may give an ISO 639-1 or ISO 639-2 code instead, or a name the
/// model understands but ISO does not list ("Brazilian Portuguese").

// ISO 639-2/B codes that differ from their ISO 639-2/T counterparts
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Look up a language by ISO 639-1 or ISO 639-2 (T or B) code
pub fn language_from_code(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == normalized_code)
                .map(|(_, t)| *t)
                .unwrap_or(&normalized_code);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Resolve user input into the English language name used in prompts
///
/// Codes are mapped to their English name, known names are returned in
/// canonical casing, anything else is passed through trimmed.
pub fn resolve_language_name(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Language cannot be empty"));
    }

    if let Some(lang) = language_from_code(trimmed) {
        return Ok(lang.to_name().to_string());
    }

    let mut chars = trimmed.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect::<String>(),
        None => String::new(),
    };
    if let Some(lang) = Language::from_name(&capitalized) {
        return Ok(lang.to_name().to_string());
    }

    debug!("Language '{}' is not an ISO code or name, using it verbatim", trimmed);
    Ok(trimmed.to_string())
}
