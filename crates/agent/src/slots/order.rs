use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use bistro_core::domain::menu::MenuItem;

use super::parse_count;

static SEGMENT_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:,|;|&|\+|\.(?:\s+|$)|\band\b|\bplus\b|\balso\b)\s*")
        .expect("segment separator is a valid regex")
});

const FILLER_WORDS: &[&str] = &[
    "a", "an", "add", "another", "can", "could", "for", "get", "give", "have", "i", "i'd", "id",
    "i'll", "just", "like", "me", "more", "my", "need", "of", "order", "please", "some", "take",
    "the", "to", "us", "want", "we", "we'd", "will", "would", "x",
];

/// A catalog item recognized in an utterance, with its requested quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderItemMatch {
    pub item: MenuItem,
    pub quantity: u32,
}

impl OrderItemMatch {
    pub fn name(&self) -> &str {
        &self.item.name
    }
}

#[derive(Clone, Debug)]
struct CatalogEntry {
    tokens: Vec<String>,
    item: MenuItem,
}

/// Case-insensitive, plural-tolerant lookup over the menu.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
}

impl CatalogIndex {
    pub fn new(items: Vec<MenuItem>) -> Self {
        let entries = items
            .into_iter()
            .map(|item| CatalogEntry { tokens: normalized_tokens(&item.name), item })
            .collect();
        Self { entries }
    }

    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.entries.iter().map(|entry| &entry.item)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized tokens of every item name, for food-vocabulary checks.
    pub fn vocabulary(&self) -> BTreeSet<String> {
        self.entries.iter().flat_map(|entry| entry.tokens.iter().cloned()).collect()
    }

    /// First item whose full name appears in the text.
    pub fn named_in(&self, text: &str) -> Option<&MenuItem> {
        let tokens = normalized_tokens(text);
        self.entries
            .iter()
            .filter(|entry| contains_run(&tokens, &entry.tokens))
            .max_by_key(|entry| entry.tokens.len())
            .map(|entry| &entry.item)
    }

    /// Matches a phrase: exact name, then name inside the phrase, then phrase
    /// inside a name. The first hit wins.
    pub fn match_phrase(&self, phrase: &[String]) -> Option<&MenuItem> {
        if phrase.is_empty() {
            return None;
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.tokens == phrase) {
            return Some(&entry.item);
        }
        if let Some(entry) = self.entries.iter().find(|entry| contains_run(phrase, &entry.tokens))
        {
            return Some(&entry.item);
        }
        if phrase.join(" ").len() < 3 {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| contains_run(&entry.tokens, phrase))
            .map(|entry| &entry.item)
    }
}

/// Splits the utterance into item phrases, reads an optional leading quantity
/// (numeral or one to ten, default 1) and resolves each phrase against the
/// catalog. Unrecognized phrases are dropped.
pub fn extract_order_items(text: &str, catalog: &CatalogIndex) -> Vec<OrderItemMatch> {
    let lowered = text.to_ascii_lowercase();
    let mut matches = Vec::new();

    for segment in SEGMENT_SEPARATOR.split(&lowered) {
        for (quantity, phrase) in quantity_runs(segment) {
            if quantity == 0 {
                continue;
            }
            if let Some(item) = catalog.match_phrase(&phrase) {
                matches.push(OrderItemMatch { item: item.clone(), quantity });
            }
        }
    }
    matches
}

/// Breaks a segment into (quantity, phrase) runs. A new quantity after some
/// phrase words starts a new run, so "2 pizzas 3 espressos" yields two.
fn quantity_runs(segment: &str) -> Vec<(u32, Vec<String>)> {
    let mut runs = Vec::new();
    let mut quantity: Option<u32> = None;
    let mut phrase: Vec<String> = Vec::new();

    for word in raw_words(segment) {
        if let Some(count) = quantity_token(&word) {
            if !phrase.is_empty() {
                runs.push((quantity.unwrap_or(1), std::mem::take(&mut phrase)));
                quantity = Some(count);
            } else if quantity.is_none() {
                quantity = Some(count);
            }
            continue;
        }
        if FILLER_WORDS.contains(&word.as_str()) {
            continue;
        }
        phrase.push(singular(&word));
    }
    if !phrase.is_empty() {
        runs.push((quantity.unwrap_or(1), phrase));
    }
    runs
}

/// Reads "2", "two", "x2" or "2x".
fn quantity_token(word: &str) -> Option<u32> {
    if word.is_empty() {
        return None;
    }
    parse_count(word).or_else(|| {
        let stripped = word.strip_prefix('x').or_else(|| word.strip_suffix('x'))?;
        (!stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()))
            .then(|| stripped.parse().ok())
            .flatten()
    })
}

fn raw_words(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_ascii_alphanumeric() && character != '\'')
        .map(|word| word.trim_matches('\''))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn normalized_tokens(text: &str) -> Vec<String> {
    raw_words(&text.to_ascii_lowercase()).iter().map(|word| singular(word)).collect()
}

fn singular(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// True when `needle` appears as a contiguous token run inside `haystack`.
fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
