use async_trait::async_trait;

use bistro_core::domain::menu::MenuItem;

use crate::slots::order::normalized_tokens;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "do", "does", "have", "in", "is", "it", "me", "of", "on",
    "tell", "the", "what", "what's", "with", "you",
];

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub item: MenuItem,
    pub score: u32,
}

/// Ranked free-text lookup over the menu.
#[async_trait]
pub trait MenuSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit>;
}

/// Scores items by query-token overlap: name hits weigh most, then category,
/// then description and ingredients.
#[derive(Clone, Debug, Default)]
pub struct KeywordMenuSearch {
    items: Vec<MenuItem>,
}

impl KeywordMenuSearch {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    fn score(item: &MenuItem, query: &[String]) -> u32 {
        let name = normalized_tokens(&item.name);
        let category = normalized_tokens(&item.category);
        let body = normalized_tokens(&format!("{} {}", item.description, item.ingredients));

        query
            .iter()
            .map(|token| {
                if name.contains(token) {
                    3
                } else if category.contains(token) {
                    2
                } else if body.contains(token) {
                    1
                } else {
                    0
                }
            })
            .sum()
    }
}

#[async_trait]
impl MenuSearch for KeywordMenuSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let tokens: Vec<String> = normalized_tokens(query)
            .into_iter()
            .filter(|token| token.len() > 1 && !STOP_WORDS.contains(&token.as_str()))
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .items
            .iter()
            .map(|item| SearchHit { score: Self::score(item, &tokens), item: item.clone() })
            .filter(|hit| hit.score > 0)
            .collect();
        hits.sort_by(|left, right| right.score.cmp(&left.score).then(left.item.id.0.cmp(&right.item.id.0)));
        hits.truncate(limit);
        hits
    }
}
