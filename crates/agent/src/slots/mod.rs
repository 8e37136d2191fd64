//! Slot extraction: free text in, typed candidate values out. Extractors are
//! best-effort and return `None`/empty rather than errors.

pub mod order;
pub mod reservation;

pub use order::{extract_order_items, CatalogIndex, OrderItemMatch};
pub use reservation::{
    extract_date, extract_party_size, extract_time, PartySizePolicy, ReservationSlots, SlotName,
};

const NUMBER_WORDS: [&str; 10] =
    ["one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten"];

/// Regex alternation for the number words one to ten.
pub(crate) const NUMBER_WORD_ALTERNATION: &str =
    "one|two|three|four|five|six|seven|eight|nine|ten";

pub(crate) fn number_word(word: &str) -> Option<u32> {
    NUMBER_WORDS.iter().position(|candidate| *candidate == word).map(|index| index as u32 + 1)
}

/// Parses a numeral or a number word (one to ten).
pub(crate) fn parse_count(token: &str) -> Option<u32> {
    if token.chars().all(|character| character.is_ascii_digit()) {
        token.parse().ok()
    } else {
        number_word(token)
    }
}

#[cfg(test)]
mod tests {
    use super::{number_word, parse_count};

    #[test]
    fn counts_accept_numerals_and_words() {
        assert_eq!(number_word("three"), Some(3));
        assert_eq!(number_word("ten"), Some(10));
        assert_eq!(number_word("eleven"), None);
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("seven"), Some(7));
        assert_eq!(parse_count("dozen"), None);
        assert_eq!(parse_count(""), None);
    }
}
