use std::collections::BTreeMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use bistro_core::domain::feedback::Rating;
use bistro_core::domain::menu::{DietaryTag, MenuFilter, MenuItem};
use bistro_core::domain::venue::{Offer, RestaurantInfo};
use bistro_core::errors::BookingError;

use super::{DialogueManager, TurnResult};
use crate::intent::Intent;
use crate::session::Session;

static PRICE_CAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bunder\s*\$?\s*(\d+(?:\.\d{1,2})?)").expect("price cap pattern is a valid regex")
});

static EXCLUDED_INGREDIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:without|no)\s+([a-z][a-z ]*?)(?:\s*(?:,|\.|\?|!|\band\b|\bor\b|$))")
        .expect("ingredient exclusion pattern is a valid regex")
});

static RATING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([1-5])\s*(?:stars?|/\s*5|out\s+of\s+5)?\b")
        .expect("rating pattern is a valid regex")
});

const DIETARY_KEYWORDS: &[(&str, DietaryTag)] = &[
    ("gluten free", DietaryTag::GlutenFree),
    ("gluten-free", DietaryTag::GlutenFree),
    ("vegan", DietaryTag::Vegan),
    ("vegetarian", DietaryTag::Vegetarian),
];

impl DialogueManager {
    /// Single-turn answers that never change the conversation state.
    pub(super) async fn answer_topic(
        &self,
        session: &mut Session,
        utterance: &str,
        intent: Intent,
    ) -> TurnResult {
        match intent {
            Intent::ShowMenu => self.show_menu(utterance).await,
            Intent::ShowOffers => self.show_offers().await,
            Intent::DescribeMenuItem => Ok(self.describe_item(utterance).await),
            Intent::FilterMenu => self.filter_menu(utterance).await,
            Intent::GetAddress => Ok(self
                .venue()
                .await?
                .map(|info| format!("We're located at {}.", info.address))
                .unwrap_or_else(missing_venue)),
            Intent::GetPhone => Ok(self
                .venue()
                .await?
                .map(|info| format!("You can reach {} at {}.", info.name, info.phone))
                .unwrap_or_else(missing_venue)),
            Intent::GetHours => Ok(self
                .venue()
                .await?
                .map(|info| format!("Our opening hours are {}.", info.opening_hours))
                .unwrap_or_else(missing_venue)),
            Intent::GiveFeedback => self.take_feedback(session, utterance).await,
            other => {
                tracing::debug!(intent = %other, "not a topic intent");
                Ok(super::FALLBACK_REPLY.to_string())
            }
        }
    }

    async fn venue(&self) -> Result<Option<RestaurantInfo>, BookingError> {
        self.catalog.restaurant_info().await
    }

    async fn show_menu(&self, utterance: &str) -> TurnResult {
        let items = self.catalog.menu_items().await?;
        if items.is_empty() {
            return Ok("Our menu is being updated right now. Please check back soon.".to_string());
        }

        let lowered = utterance.to_ascii_lowercase();
        let category = items
            .iter()
            .map(|item| item.category.clone())
            .find(|category| mentions_category(&lowered, category));

        match category {
            Some(category) => {
                let selected: Vec<MenuItem> =
                    items.into_iter().filter(|item| item.category == category).collect();
                Ok(format!("Here's our {category} menu:\n{}", render_grouped(&selected)))
            }
            None => Ok(format!("Here's our menu:\n{}", render_grouped(&items))),
        }
    }

    async fn show_offers(&self) -> TurnResult {
        let offers = self.catalog.offers().await?;
        if offers.is_empty() {
            return Ok("We don't have any special offers at the moment.".to_string());
        }
        let now = self.clock.time_of_day();
        let lines: Vec<String> = offers.iter().map(|offer| render_offer(offer, now)).collect();
        Ok(format!("Here are our current offers:\n{}", lines.join("\n")))
    }

    async fn describe_item(&self, utterance: &str) -> String {
        let item = match self.menu.named_in(utterance) {
            Some(item) => Some(item.clone()),
            None => self.search.search(utterance, 1).await.into_iter().next().map(|hit| hit.item),
        };
        match item {
            Some(item) => render_details(&item),
            None => "I couldn't find that dish on our menu. Would you like to see the full menu?"
                .to_string(),
        }
    }

    async fn filter_menu(&self, utterance: &str) -> TurnResult {
        let filter = parse_filter(utterance);
        if filter.is_empty() {
            return Ok("I can filter the menu by vegetarian, vegan or gluten-free dishes, by price \
(for example 'under $10'), or leave out an ingredient ('without cheese'). What would you like?"
                .to_string());
        }

        let items = self.catalog.filter_menu(&filter).await?;
        let description = describe_filter(&filter);
        if items.is_empty() {
            return Ok(format!("Sorry, nothing on our menu is {description}."));
        }
        let lines: Vec<String> = items.iter().map(render_line).collect();
        Ok(format!("Dishes that are {description}:\n{}", lines.join("\n")))
    }

    async fn take_feedback(&self, session: &Session, utterance: &str) -> TurnResult {
        let Some(rating) = parse_rating(utterance) else {
            return Ok("We'd love to hear from you! How would you rate your experience from 1 to 5, \
and is there anything you'd like to tell us?"
                .to_string());
        };

        let feedback_id =
            self.booking.record_feedback(session.customer_id, rating, utterance).await?;
        tracing::info!(
            session_id = %session.id,
            feedback_id = feedback_id.0,
            rating = rating.value(),
            "feedback recorded"
        );
        Ok(format!(
            "Thank you for your feedback! We've noted your {}-star rating.",
            rating.value()
        ))
    }
}

fn missing_venue() -> String {
    "I don't have that information right now. Please try again later.".to_string()
}

fn mentions_category(lowered: &str, category: &str) -> bool {
    let category = category.to_ascii_lowercase();
    let singular = category.strip_suffix('s').unwrap_or(&category);
    lowered
        .split(|character: char| !character.is_ascii_alphanumeric())
        .any(|word| word == category || word == singular || word.strip_suffix('s') == Some(singular))
}

fn render_line(item: &MenuItem) -> String {
    format!("- {}: ${:.2}", item.name, item.price)
}

fn render_grouped(items: &[MenuItem]) -> String {
    let mut by_category: BTreeMap<&str, Vec<&MenuItem>> = BTreeMap::new();
    for item in items {
        by_category.entry(item.category.as_str()).or_default().push(item);
    }
    by_category
        .into_iter()
        .map(|(category, items)| {
            let lines: Vec<String> = items
                .into_iter()
                .map(|item| format!("- {} (${:.2}): {}", item.name, item.price, item.description))
                .collect();
            format!("{category}:\n{}", lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_details(item: &MenuItem) -> String {
    let mut reply = format!(
        "{} (${:.2}, {})\n{}",
        item.name, item.price, item.category, item.description
    );
    if !item.ingredients.is_empty() {
        reply.push_str(&format!("\nIngredients: {}", item.ingredients));
    }
    if !item.nutrition_info.is_empty() {
        reply.push_str(&format!("\nNutrition: {}", item.nutrition_info));
    }
    if !item.preparation_notes.is_empty() {
        reply.push_str(&format!("\nPreparation: {}", item.preparation_notes));
    }
    if !item.dietary_tags.is_empty() {
        let tags: Vec<&str> = item.dietary_tags.iter().map(|tag| tag.label()).collect();
        reply.push_str(&format!("\nSuitable for: {}", tags.join(", ")));
    }
    reply
}

fn render_offer(offer: &Offer, now: chrono::NaiveTime) -> String {
    let mut line = format!("- {}: {}", offer.name, offer.description);
    if offer.discount > Decimal::ZERO {
        line.push_str(&format!(" ({}% off)", offer.discount_percent()));
    }
    if offer.is_happy_hour && offer.is_active_at(now) {
        line.push_str(" - Currently ON!");
    }
    if !offer.is_all_day() {
        line.push_str(&format!(
            " Valid {} to {}.",
            offer.valid_from.format("%H:%M"),
            offer.valid_to.format("%H:%M")
        ));
    }
    line
}

fn parse_filter(utterance: &str) -> MenuFilter {
    let lowered = utterance.to_ascii_lowercase();

    let dietary = DIETARY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, tag)| *tag);

    let max_price = PRICE_CAP
        .captures(&lowered)
        .and_then(|captures| captures.get(1))
        .and_then(|amount| Decimal::from_str(amount.as_str()).ok());

    let exclude_ingredients = EXCLUDED_INGREDIENT
        .captures_iter(&lowered)
        .filter_map(|captures| captures.get(1))
        .map(|ingredient| ingredient.as_str().trim().to_string())
        .filter(|ingredient| !ingredient.is_empty())
        .collect();

    MenuFilter { dietary, max_price, exclude_ingredients }
}

fn describe_filter(filter: &MenuFilter) -> String {
    let mut parts = Vec::new();
    if let Some(tag) = filter.dietary {
        parts.push(tag.label().to_string());
    }
    if let Some(max_price) = filter.max_price {
        parts.push(format!("under ${max_price:.2}"));
    }
    if !filter.exclude_ingredients.is_empty() {
        parts.push(format!("without {}", filter.exclude_ingredients.join(" or ")));
    }
    parts.join(", ")
}

/// First rating digit from 1 to 5 that stands on its own.
fn parse_rating(utterance: &str) -> Option<Rating> {
    let lowered = utterance.to_ascii_lowercase();
    RATING
        .captures_iter(&lowered)
        .filter_map(|captures| captures.get(1))
        .find_map(|digit| digit.as_str().parse::<u8>().ok())
        .and_then(|value| Rating::new(value).ok())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    use bistro_core::domain::menu::DietaryTag;
    use bistro_core::domain::venue::Offer;

    use super::{describe_filter, mentions_category, parse_filter, parse_rating, render_offer};

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn filters_combine_diet_price_and_exclusions() {
        let filter = parse_filter("Any vegan dishes under $11 without onion?");
        assert_eq!(filter.dietary, Some(DietaryTag::Vegan));
        assert_eq!(filter.max_price, Some(Decimal::from(11)));
        assert_eq!(filter.exclude_ingredients, vec!["onion".to_string()]);
        assert_eq!(describe_filter(&filter), "vegan, under $11.00, without onion");

        let gluten = parse_filter("what's gluten-free");
        assert_eq!(gluten.dietary, Some(DietaryTag::GlutenFree));
        assert!(parse_filter("filter please").is_empty());
        assert_eq!(
            parse_filter("under 8.50").max_price,
            Some(Decimal::from_str("8.50").expect("literal"))
        );
    }

    #[test]
    fn ratings_must_be_between_one_and_five() {
        assert_eq!(parse_rating("5 stars, lovely").map(|r| r.value()), Some(5));
        assert_eq!(parse_rating("I'd give it a 4/5").map(|r| r.value()), Some(4));
        assert_eq!(parse_rating("rated 9"), None);
        assert_eq!(parse_rating("great food"), None);
    }

    #[test]
    fn offers_show_discount_and_window() {
        let happy_hour = Offer {
            name: "Happy Hour Drinks".to_string(),
            description: "50% off all draft beers and house wines".to_string(),
            discount: Decimal::from_str("0.50").expect("literal"),
            valid_from: at(16, 0),
            valid_to: at(18, 0),
            is_happy_hour: true,
        };
        let during = render_offer(&happy_hour, at(17, 0));
        assert!(during.contains("(50% off)"));
        assert!(during.contains("Currently ON"));
        assert!(during.contains("Valid 16:00 to 18:00."));
        assert!(!render_offer(&happy_hour, at(12, 0)).contains("Currently ON"));

        let all_day = Offer {
            name: "Family Meal Deal".to_string(),
            description: "2 large pizzas".to_string(),
            discount: Decimal::ZERO,
            valid_from: at(0, 0),
            valid_to: at(23, 59),
            is_happy_hour: false,
        };
        assert_eq!(render_offer(&all_day, at(12, 0)), "- Family Meal Deal: 2 large pizzas");
    }

    #[test]
    fn categories_match_singular_and_plural() {
        assert!(mentions_category("show me the drinks menu", "Drinks"));
        assert!(mentions_category("any pizzas?", "Pizza"));
        assert!(!mentions_category("show me the menu", "Pasta"));
    }
}
