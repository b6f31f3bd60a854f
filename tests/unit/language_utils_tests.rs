/*!
 * Tests for language code utilities
 */

use anyhow::Result;
use subtrans::language_utils::{language_from_code, resolve_language_name};

/// Test ISO 639-1 and 639-2 codes resolve to the same language
#[test]
fn test_languageFromCode_withEquivalentCodes_shouldAgree() {
    let from_part1 = language_from_code("de");
    let from_part2t = language_from_code("deu");
    let from_part2b = language_from_code("ger");

    assert!(from_part1.is_some());
    assert_eq!(from_part1, from_part2t);
    assert_eq!(from_part1, from_part2b);
}

/// Test codes are case and whitespace insensitive
#[test]
fn test_languageFromCode_withUppercaseAndSpaces_shouldResolve() {
    assert_eq!(language_from_code(" FR "), language_from_code("fr"));
    assert!(language_from_code("xx").is_none());
    assert!(language_from_code("french").is_none());
}

/// Test names are returned in canonical English form
#[test]
fn test_resolveLanguageName_withCodesAndNames_shouldReturnEnglishName() -> Result<()> {
    assert_eq!(resolve_language_name("ru")?, "Russian");
    assert_eq!(resolve_language_name("spa")?, "Spanish");
    assert_eq!(resolve_language_name("japanese")?, "Japanese");
    Ok(())
}

/// Test blank input is refused
#[test]
fn test_resolveLanguageName_withBlankInput_shouldFail() {
    assert!(resolve_language_name("   ").is_err());
}
