//! Contact recognizers. Every function scans free text, so values embedded in
//! a sentence ("my number is 555-123-4567, thanks") are found.

use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?\d{1,3}[-.\s]?)?(\(?\d{3}\)?[-.\s]?)?(\d{3}[-.\s]?\d{4})")
        .expect("phone pattern is a valid regex")
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("email pattern is a valid regex")
});

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

const NAME_PREFIXES: &[&str] =
    &["my name is", "my name's", "name is", "i'm", "i am", "im", "this is", "call me", "it's", "its"];

const GREETING_PREFIXES: &[&str] = &["hi", "hello", "hey"];

const REFUSAL_PHRASES: &[&str] = &[
    "no thanks",
    "no thank you",
    "skip",
    "n/a",
    "rather not",
    "prefer not",
    "don't want to",
    "dont want to",
    "not now",
    "pass",
];

/// Returns the digits of the first phone-shaped run with 10 to 15 digits.
pub fn validate_phone(text: &str) -> Option<String> {
    PHONE_PATTERN.find_iter(text).find_map(|candidate| {
        let digits: String =
            candidate.as_str().chars().filter(|character| character.is_ascii_digit()).collect();
        (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()).then_some(digits)
    })
}

/// Returns the first `local@domain.tld` address, case preserved.
pub fn validate_email(text: &str) -> Option<String> {
    EMAIL_PATTERN.find(text).map(|found| found.as_str().to_string())
}

/// A name has at least two characters and is not purely numeric.
pub fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.chars().count() >= 2 && !trimmed.chars().all(|character| character.is_ascii_digit())
}

/// Strips greetings and introductions ("hi, I'm Sam") and title-cases the rest.
/// Returns `None` when what is left is not a plausible name.
pub fn extract_name(text: &str) -> Option<String> {
    let mut remainder = text.trim().trim_end_matches(['.', '!', '?']).trim().to_string();

    loop {
        let lowered = remainder.to_ascii_lowercase();
        let stripped = GREETING_PREFIXES
            .iter()
            .chain(NAME_PREFIXES.iter())
            .find_map(|prefix| strip_word_prefix(&lowered, prefix).map(|rest| rest.len()));
        match stripped {
            Some(rest_len) => {
                let start = remainder.len() - rest_len;
                remainder = remainder[start..].trim_start_matches([',', ' ', '-']).to_string();
            }
            None => break,
        }
    }

    let name = remainder
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    is_valid_name(&name).then_some(name)
}

/// Detects "no thanks"-style refusals, or a bare "no" while a contact field
/// is being asked for.
pub fn is_refusal(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    is_refusal_phrase(&lowered)
        || matches!(lowered.trim_end_matches(['.', '!']), "no" | "nope" | "none")
}

/// Refusal phrases that mean "I won't share that" in any state.
pub fn is_refusal_phrase(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    let padded = format!(" {} ", lowered.trim_end_matches(['.', '!']));
    REFUSAL_PHRASES.iter().any(|phrase| padded.contains(&format!(" {phrase} ")))
}

fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(next) if next == ' ' || next == ',' || next == '-' => Some(rest),
        Some(_) => None,
    }
}

fn title_case(word: &str) -> String {
    let mut characters = word.chars();
    match characters.next() {
        Some(first) => {
            first.to_uppercase().chain(characters.flat_map(char::to_lowercase)).collect()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        extract_name, is_refusal, is_refusal_phrase, is_valid_name, validate_email,
        validate_phone,
    };

    #[test]
    fn phone_is_found_inside_a_sentence() {
        assert_eq!(
            validate_phone("my number is 555-123-4567, thanks").as_deref(),
            Some("5551234567")
        );
        assert_eq!(validate_phone("555.123.4567").as_deref(), Some("5551234567"));
        assert_eq!(validate_phone("+1 (555) 123-4567").as_deref(), Some("15551234567"));
        assert_eq!(validate_phone("5551234567").as_deref(), Some("5551234567"));
    }

    #[test]
    fn short_or_missing_numbers_are_rejected() {
        assert_eq!(validate_phone("call 123-4567"), None);
        assert_eq!(validate_phone("table for 4 at 7pm"), None);
        assert_eq!(validate_phone("no phone here"), None);
    }

    #[test]
    fn email_is_scanned_and_case_preserved() {
        assert_eq!(
            validate_email("sure, it's Dana.Smith@Example.com ok").as_deref(),
            Some("Dana.Smith@Example.com")
        );
        assert_eq!(validate_email("dana at example dot com"), None);
        assert_eq!(validate_email("dana@localhost"), None);
    }

    #[test]
    fn names_need_two_chars_and_letters() {
        assert!(is_valid_name("Jo"));
        assert!(!is_valid_name("J"));
        assert!(!is_valid_name("12345"));
        assert!(!is_valid_name("   "));
    }

    #[test]
    fn name_extraction_strips_introductions() {
        assert_eq!(extract_name("my name is sam carter").as_deref(), Some("Sam Carter"));
        assert_eq!(extract_name("Hi, I'm Priya.").as_deref(), Some("Priya"));
        assert_eq!(extract_name("call me Jo").as_deref(), Some("Jo"));
        assert_eq!(extract_name("Imogen").as_deref(), Some("Imogen"));
        assert_eq!(extract_name("hello"), None);
        assert_eq!(extract_name("42"), None);
    }

    #[test]
    fn refusals_are_recognized() {
        assert!(is_refusal("no thanks"));
        assert!(is_refusal("I'd rather not say"));
        assert!(is_refusal("skip"));
        assert!(is_refusal("No."));
        assert!(!is_refusal("notebook"));
        assert!(!is_refusal("Nora"));
        assert!(is_refusal_phrase("no thank you"));
        assert!(!is_refusal_phrase("no"));
    }
}
