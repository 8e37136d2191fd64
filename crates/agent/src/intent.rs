//! Rule-ordered intent classification.
//!
//! `RULES` is evaluated top to bottom and the first predicate that holds
//! decides the intent. Confirmation and cancellation rules only fire while the
//! session is waiting on the matching confirmation gate.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::validators::{is_refusal, is_refusal_phrase, validate_email, validate_phone};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greet,
    Farewell,
    ShowMenu,
    ShowOffers,
    DescribeMenuItem,
    FilterMenu,
    PlaceOrder,
    ModifyOrder,
    ConfirmOrder,
    CancelOrder,
    MakeReservation,
    ModifyReservation,
    ConfirmReservation,
    CancelReservation,
    GetAddress,
    GetPhone,
    GetHours,
    GiveFeedback,
    ProvidePhoneNumber,
    ProvideEmail,
    ProvideName,
    RefuseInfo,
    GeneralQuery,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::Farewell => "farewell",
            Self::ShowMenu => "show_menu",
            Self::ShowOffers => "show_offers",
            Self::DescribeMenuItem => "describe_menu_item",
            Self::FilterMenu => "filter_menu",
            Self::PlaceOrder => "place_order",
            Self::ModifyOrder => "modify_order",
            Self::ConfirmOrder => "confirm_order",
            Self::CancelOrder => "cancel_order",
            Self::MakeReservation => "make_reservation",
            Self::ModifyReservation => "modify_reservation",
            Self::ConfirmReservation => "confirm_reservation",
            Self::CancelReservation => "cancel_reservation",
            Self::GetAddress => "get_address",
            Self::GetPhone => "get_phone",
            Self::GetHours => "get_hours",
            Self::GiveFeedback => "give_feedback",
            Self::ProvidePhoneNumber => "provide_phone_number",
            Self::ProvideEmail => "provide_email",
            Self::ProvideName => "provide_name",
            Self::RefuseInfo => "refuse_info",
            Self::GeneralQuery => "general_query",
        }
    }

    /// Single-turn informational intents that never touch the session.
    pub fn is_topic(self) -> bool {
        matches!(
            self,
            Self::ShowMenu
                | Self::ShowOffers
                | Self::DescribeMenuItem
                | Self::FilterMenu
                | Self::GetAddress
                | Self::GetPhone
                | Self::GetHours
                | Self::GiveFeedback
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session facts the state-gated rules depend on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassifierContext {
    pub awaiting_order_confirmation: bool,
    pub awaiting_reservation_confirmation: bool,
    pub collecting_contact: bool,
}

/// Normalized view of one utterance.
#[derive(Clone, Debug)]
pub struct Utterance {
    raw: String,
    lowered: String,
    padded: String,
    word_count: usize,
}

impl Utterance {
    pub fn new(text: &str) -> Self {
        let lowered = text.trim().replace('\u{2019}', "'").to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|word| word.trim_matches('\''))
            .filter(|word| !word.is_empty())
            .collect();
        let padded = format!(" {} ", words.join(" "));
        Self { raw: text.to_string(), word_count: words.len(), lowered, padded }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whole-word (or whole-phrase) match.
    pub fn has(&self, phrase: &str) -> bool {
        self.padded.contains(&format!(" {phrase} "))
    }

    pub fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.has(phrase))
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.padded.split_whitespace()
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }
}

struct RuleContext<'a> {
    session: ClassifierContext,
    food_vocabulary: &'a BTreeSet<String>,
}

struct IntentRule {
    intent: Intent,
    matches: fn(&Utterance, &RuleContext<'_>) -> bool,
}

static PRICE_CAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bunder\s*\$?\s*\d").expect("price cap pattern is a valid regex"));

static STAR_RATING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[1-5]\s*(?:stars?|/\s*5|out\s+of\s+5)")
        .expect("star rating pattern is a valid regex")
});

const CONFIRM_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "confirm", "ok", "okay", "correct", "sounds good",
    "go ahead", "please do", "absolutely", "book it", "place order", "place it", "that's right",
    "do it", "perfect",
];

const CANCEL_WORDS: &[&str] = &[
    "no", "nope", "cancel", "don't", "dont", "never mind", "nevermind", "stop", "forget it",
    "not now", "abort",
];

/// Words that cancel when they open the reply, and phrases that cancel
/// wherever they appear. A negation later in an affirmative reply does not.
const LEADING_CANCEL_WORDS: &[&str] = &["no", "nope", "nah", "cancel", "don't", "dont", "stop"];

const CANCEL_PHRASES: &[&str] =
    &["cancel", "never mind", "nevermind", "forget it", "abort", "don't confirm"];

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "greetings", "good morning", "good afternoon",
    "good evening",
];

const FAREWELLS: &[&str] =
    &["bye", "goodbye", "good bye", "see you", "see ya", "farewell", "good night", "that's all"];

const OFFER_WORDS: &[&str] = &[
    "offer", "offers", "deal", "deals", "special", "specials", "happy hour", "discount",
    "discounts", "promotion", "promotions",
];

const DESCRIBE_WORDS: &[&str] = &[
    "describe", "tell me about", "what is", "what's", "whats", "what's in", "ingredients",
    "details", "nutrition", "calories", "how is",
];

const FILTER_WORDS: &[&str] = &[
    "filter", "vegetarian", "vegan", "gluten free", "price", "prices", "cheap", "cheapest",
    "without", "dietary",
];

const MODIFY_ORDER_PHRASES: &[&str] = &[
    "change my order", "modify my order", "modify order", "update my order", "remove from my order",
    "remove from order", "cancel my order", "edit my order",
];

const ORDER_WORDS: &[&str] = &["order", "get me", "buy", "purchase"];

const ORDERING_VERBS: &[&str] =
    &["want", "like", "have", "get", "take", "grab", "need", "add", "bring"];

const FOOD_WORDS: &[&str] = &[
    "pizza", "burger", "pasta", "salad", "soup", "sushi", "sandwich", "steak", "chicken", "fries",
    "coke", "water", "tea", "coffee", "espresso", "cake", "dessert", "drink", "drinks",
];

const MODIFY_RESERVATION_PHRASES: &[&str] = &[
    "change my reservation", "modify my reservation", "modify reservation", "change reservation",
    "cancel my reservation", "cancel reservation", "reschedule", "change my booking",
    "cancel my booking",
];

const RESERVATION_WORDS: &[&str] =
    &["reservation", "reserve", "book a table", "table for", "booking", "book"];

const ADDRESS_WORDS: &[&str] =
    &["address", "location", "where are you", "located", "directions", "where is the restaurant"];

const PHONE_WORDS: &[&str] = &[
    "phone", "phone number", "contact number", "call you", "telephone", "your number",
    "call the restaurant",
];

const HOURS_WORDS: &[&str] =
    &["hours", "open", "opening", "close", "closing", "closed", "what time do you"];

const FEEDBACK_WORDS: &[&str] =
    &["feedback", "rate", "rating", "review", "comment", "comments", "complaint", "rate your service"];

static RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::CancelOrder,
        matches: |u, ctx| ctx.session.awaiting_order_confirmation && leads_with_cancel(u),
    },
    IntentRule {
        intent: Intent::ConfirmOrder,
        matches: |u, ctx| ctx.session.awaiting_order_confirmation && u.has_any(CONFIRM_WORDS),
    },
    IntentRule {
        intent: Intent::CancelOrder,
        matches: |u, ctx| ctx.session.awaiting_order_confirmation && u.has_any(CANCEL_WORDS),
    },
    IntentRule {
        intent: Intent::CancelReservation,
        matches: |u, ctx| ctx.session.awaiting_reservation_confirmation && leads_with_cancel(u),
    },
    IntentRule {
        intent: Intent::ConfirmReservation,
        matches: |u, ctx| {
            ctx.session.awaiting_reservation_confirmation && u.has_any(CONFIRM_WORDS)
        },
    },
    IntentRule {
        intent: Intent::CancelReservation,
        matches: |u, ctx| ctx.session.awaiting_reservation_confirmation && u.has_any(CANCEL_WORDS),
    },
    IntentRule { intent: Intent::Greet, matches: |u, _| u.has_any(GREETINGS) },
    IntentRule { intent: Intent::Farewell, matches: |u, _| u.has_any(FAREWELLS) },
    IntentRule {
        intent: Intent::ShowMenu,
        matches: |u, _| u.has("menu") && !mentions_filter(u),
    },
    IntentRule { intent: Intent::ShowOffers, matches: |u, _| u.has_any(OFFER_WORDS) },
    IntentRule {
        intent: Intent::DescribeMenuItem,
        matches: |u, ctx| u.has_any(DESCRIBE_WORDS) && mentions_food(u, ctx),
    },
    IntentRule { intent: Intent::FilterMenu, matches: |u, _| mentions_filter(u) },
    IntentRule { intent: Intent::ModifyOrder, matches: |u, _| u.has_any(MODIFY_ORDER_PHRASES) },
    IntentRule {
        intent: Intent::PlaceOrder,
        matches: |u, ctx| {
            u.has_any(ORDER_WORDS)
                || (mentions_food(u, ctx)
                    && (has_quantity(u) || u.has_any(ORDERING_VERBS) || is_short_mention(u)))
        },
    },
    IntentRule {
        intent: Intent::ModifyReservation,
        matches: |u, _| u.has_any(MODIFY_RESERVATION_PHRASES),
    },
    IntentRule { intent: Intent::MakeReservation, matches: |u, _| u.has_any(RESERVATION_WORDS) },
    IntentRule { intent: Intent::GetAddress, matches: |u, _| u.has_any(ADDRESS_WORDS) },
    IntentRule {
        intent: Intent::GetPhone,
        matches: |u, _| u.has_any(PHONE_WORDS) && validate_phone(u.raw()).is_none(),
    },
    IntentRule { intent: Intent::GetHours, matches: |u, _| u.has_any(HOURS_WORDS) },
    IntentRule {
        intent: Intent::GiveFeedback,
        matches: |u, _| u.has_any(FEEDBACK_WORDS) || STAR_RATING.is_match(&u.lowered),
    },
    IntentRule {
        intent: Intent::ProvidePhoneNumber,
        matches: |u, _| validate_phone(u.raw()).is_some(),
    },
    IntentRule { intent: Intent::ProvideEmail, matches: |u, _| validate_email(u.raw()).is_some() },
    IntentRule {
        intent: Intent::ProvideName,
        matches: |u, _| {
            u.has_any(&["my name is", "call me", "name's"])
                || (u.has_any(&["i'm", "i am"]) && u.word_count() < 5)
        },
    },
    IntentRule {
        intent: Intent::RefuseInfo,
        matches: |u, ctx| {
            is_refusal_phrase(u.raw()) || (ctx.session.collecting_contact && is_refusal(u.raw()))
        },
    },
];

fn leads_with_cancel(u: &Utterance) -> bool {
    u.words().next().is_some_and(|first| LEADING_CANCEL_WORDS.contains(&first))
        || u.has_any(CANCEL_PHRASES)
}

fn mentions_filter(u: &Utterance) -> bool {
    u.has_any(FILTER_WORDS) || PRICE_CAP.is_match(&u.lowered)
}

fn mentions_food(u: &Utterance, ctx: &RuleContext<'_>) -> bool {
    u.words().any(|word| {
        let singular = singular(word);
        FOOD_WORDS.contains(&word)
            || ctx.food_vocabulary.contains(word)
            || ctx.food_vocabulary.contains(singular)
    })
}

/// "margherita pizza please": a bare food mention, not a question.
fn is_short_mention(u: &Utterance) -> bool {
    u.word_count() <= 5 && !u.raw().contains('?')
}

fn has_quantity(u: &Utterance) -> bool {
    u.words().any(|word| crate::slots::parse_count(word).is_some())
}

fn singular(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

/// Keyword classifier over a fixed rule table, aware of the menu's vocabulary.
#[derive(Clone, Debug, Default)]
pub struct IntentClassifier {
    food_vocabulary: BTreeSet<String>,
}

impl IntentClassifier {
    pub fn new(food_vocabulary: BTreeSet<String>) -> Self {
        Self { food_vocabulary }
    }

    pub fn classify(&self, text: &str, context: ClassifierContext) -> Intent {
        let utterance = Utterance::new(text);
        let rule_context =
            RuleContext { session: context, food_vocabulary: &self.food_vocabulary };
        RULES
            .iter()
            .find(|rule| (rule.matches)(&utterance, &rule_context))
            .map(|rule| rule.intent)
            .unwrap_or(Intent::GeneralQuery)
    }

    /// The rule order, for auditing.
    pub fn rule_order() -> Vec<Intent> {
        RULES.iter().map(|rule| rule.intent).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{ClassifierContext, Intent, IntentClassifier, Utterance};

    fn classifier() -> IntentClassifier {
        let vocabulary: BTreeSet<String> =
            ["margherita", "pizza", "chicken", "alfredo", "espresso", "iced", "tea", "lava", "cake"]
                .into_iter()
                .map(str::to_string)
                .collect();
        IntentClassifier::new(vocabulary)
    }

    fn classify(text: &str) -> Intent {
        classifier().classify(text, ClassifierContext::default())
    }

    #[test]
    fn whole_word_matching_avoids_substrings() {
        let utterance = Utterance::new("Which dishes are vegetarian?");
        assert!(!utterance.has("hi"));
        assert!(utterance.has("vegetarian"));
        assert_eq!(classify("this is nice"), Intent::GeneralQuery);
    }

    #[test]
    fn confirmation_rules_are_gated_on_session_state() {
        let awaiting_order =
            ClassifierContext { awaiting_order_confirmation: true, ..ClassifierContext::default() };
        let awaiting_table = ClassifierContext {
            awaiting_reservation_confirmation: true,
            ..ClassifierContext::default()
        };
        let collecting =
            ClassifierContext { collecting_contact: true, ..ClassifierContext::default() };

        assert_eq!(classifier().classify("yes please", awaiting_order), Intent::ConfirmOrder);
        assert_eq!(classifier().classify("no", awaiting_order), Intent::CancelOrder);
        assert_eq!(classifier().classify("cancel", awaiting_order), Intent::CancelOrder);
        assert_eq!(
            classifier().classify("yes, no problem", awaiting_order),
            Intent::ConfirmOrder
        );
        assert_eq!(
            classifier().classify("sure, don't worry about it", awaiting_order),
            Intent::ConfirmOrder
        );
        assert_eq!(
            classifier().classify("no, I don't want it", awaiting_order),
            Intent::CancelOrder
        );
        assert_eq!(classifier().classify("ok actually cancel", awaiting_order), Intent::CancelOrder);
        assert_eq!(classifier().classify("yes", awaiting_table), Intent::ConfirmReservation);
        assert_eq!(classifier().classify("no", awaiting_table), Intent::CancelReservation);
        assert_eq!(classifier().classify("no", collecting), Intent::RefuseInfo);
        assert_eq!(classify("yes"), Intent::GeneralQuery);
        assert_eq!(classify("no"), Intent::GeneralQuery);
    }

    #[test]
    fn topic_keywords() {
        assert_eq!(classify("hi"), Intent::Greet);
        assert_eq!(classify("Good evening!"), Intent::Greet);
        assert_eq!(classify("ok bye"), Intent::Farewell);
        assert_eq!(classify("can I see the menu"), Intent::ShowMenu);
        assert_eq!(classify("any happy hour deals?"), Intent::ShowOffers);
        assert_eq!(classify("tell me about the chicken alfredo"), Intent::DescribeMenuItem);
        assert_eq!(classify("what is in the lava cake"), Intent::DescribeMenuItem);
        assert_eq!(classify("show me the vegetarian menu"), Intent::FilterMenu);
        assert_eq!(classify("anything under $10?"), Intent::FilterMenu);
        assert_eq!(classify("where are you located"), Intent::GetAddress);
        assert_eq!(classify("what's your phone number"), Intent::GetPhone);
        assert_eq!(classify("when do you open"), Intent::GetHours);
        assert_eq!(classify("I want to leave feedback"), Intent::GiveFeedback);
        assert_eq!(classify("5 stars, lovely food"), Intent::GiveFeedback);
    }

    #[test]
    fn ordering_and_reservations() {
        assert_eq!(classify("I'd like to order"), Intent::PlaceOrder);
        assert_eq!(classify("2 margherita pizza and a coke"), Intent::PlaceOrder);
        assert_eq!(classify("can I get an espresso"), Intent::PlaceOrder);
        assert_eq!(classify("margherita pizza please"), Intent::PlaceOrder);
        assert_eq!(classify("is the pizza spicy?"), Intent::GeneralQuery);
        assert_eq!(classify("please change my order"), Intent::ModifyOrder);
        assert_eq!(classify("book a table for 4 tomorrow at 7pm"), Intent::MakeReservation);
        assert_eq!(classify("I need a reservation"), Intent::MakeReservation);
        assert_eq!(classify("cancel my reservation"), Intent::ModifyReservation);
    }

    #[test]
    fn contact_details_and_refusals() {
        assert_eq!(classify("my number is 555-123-4567"), Intent::ProvidePhoneNumber);
        assert_eq!(classify("dana@example.com"), Intent::ProvideEmail);
        assert_eq!(classify("my name is Dana"), Intent::ProvideName);
        assert_eq!(classify("I'm Dana"), Intent::ProvideName);
        assert_eq!(classify("I am not sure what I am doing here today"), Intent::GeneralQuery);
        assert_eq!(classify("no thanks"), Intent::RefuseInfo);
    }

    #[test]
    fn first_rule_wins() {
        assert_eq!(classify("hi, I'd like to order"), Intent::Greet);
        let order = IntentClassifier::rule_order();
        assert_eq!(order.first(), Some(&Intent::CancelOrder));
        assert_eq!(order.last(), Some(&Intent::RefuseInfo));
        let place = order.iter().position(|i| *i == Intent::PlaceOrder);
        let modify = order.iter().position(|i| *i == Intent::ModifyOrder);
        assert!(modify < place);
    }
}
