use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{number_word, parse_count, NUMBER_WORD_ALTERNATION};

const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

const HOUR_WORDS: &str = "one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve";

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})\b"))
        .expect("day-month pattern is a valid regex")
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"))
        .expect("month-day pattern is a valid regex")
});

static HALF_PAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bhalf\s+past\s+(\d{{1,2}}|{HOUR_WORDS})\b"))
        .expect("half-past pattern is a valid regex")
});

static OCLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}}|{HOUR_WORDS})\s*o'?\s?clock\b"))
        .expect("o'clock pattern is a valid regex")
});

static TWELVE_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b\.?")
        .expect("12-hour pattern is a valid regex")
});

static TWENTY_FOUR_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("24-hour pattern is a valid regex")
});

static BARE_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:at|around|about|by)\s+(\d{{1,2}}|{HOUR_WORDS})\b(?:\s*[:.]\d)?"))
        .expect("bare-hour pattern is a valid regex")
});

static BARE_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d{{1,2}}|{HOUR_WORDS})\s*[.!]?$"))
        .expect("bare-answer pattern is a valid regex")
});

static MERIDIEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([ap])\.?m\b").expect("meridiem pattern is a valid regex"));

static EXPLICIT_PARTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(\d+|{NUMBER_WORD_ALTERNATION})\s+(?:people|persons?|pax|members|guests|adults|of\s+us)\b"
    ))
    .expect("party-size pattern is a valid regex")
});

static STANDALONE_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d+|{NUMBER_WORD_ALTERNATION})\b"))
        .expect("count pattern is a valid regex")
});

static MONTH_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:{MONTHS})$")).expect("month-word pattern is a valid regex")
});

/// Party-size heuristics. Implicit counts above `max_implicit` are ignored
/// unless the utterance says "people".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartySizePolicy {
    pub max_implicit: u32,
}

impl Default for PartySizePolicy {
    fn default() -> Self {
        Self { max_implicit: 10 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotName {
    Date,
    Time,
    PartySize,
}

impl SlotName {
    pub fn label(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::PartySize => "party size",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Partially filled reservation request, accumulated across turns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationSlots {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub party_size: Option<u32>,
}

impl ReservationSlots {
    pub fn extract(text: &str, today: NaiveDate, policy: PartySizePolicy) -> Self {
        Self {
            date: extract_date(text, today),
            time: extract_time(text),
            party_size: extract_party_size(text, policy),
        }
    }

    /// Reads a follow-up answer against the slots already `known`. A lone
    /// number fills the time when only the time is open, otherwise the party
    /// size; an implicit count never replaces a party size already given.
    pub fn extract_followup(
        text: &str,
        today: NaiveDate,
        policy: PartySizePolicy,
        known: &ReservationSlots,
    ) -> Self {
        let lowered = text.trim().to_ascii_lowercase();

        if let Some(captures) = BARE_ANSWER.captures(&lowered) {
            let raw = &captures[1];
            return match (known.time, known.party_size) {
                (None, Some(_)) => Self {
                    time: hour_with_context(raw, None)
                        .and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0)),
                    ..Self::default()
                },
                (_, None) => {
                    Self { party_size: extract_party_size(raw, policy), ..Self::default() }
                }
                (Some(_), Some(_)) => Self::default(),
            };
        }

        let mut slots = Self::extract(text, today, policy);
        if known.party_size.is_some() && !EXPLICIT_PARTY.is_match(&lowered) {
            slots.party_size = None;
        }
        slots
    }

    /// Fills slots from `newer`; a missing value never clears a known one.
    pub fn merge(&mut self, newer: ReservationSlots) {
        if newer.date.is_some() {
            self.date = newer.date;
        }
        if newer.time.is_some() {
            self.time = newer.time;
        }
        if newer.party_size.is_some() {
            self.party_size = newer.party_size;
        }
    }

    pub fn missing(&self) -> Vec<SlotName> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push(SlotName::Date);
        }
        if self.time.is_none() {
            missing.push(SlotName::Time);
        }
        if self.party_size.is_none() {
            missing.push(SlotName::PartySize);
        }
        missing
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.party_size.is_none()
    }

    /// All three slots, once every one is known.
    pub fn complete(&self) -> Option<(NaiveDate, NaiveTime, u32)> {
        Some((self.date?, self.time?, self.party_size?))
    }
}

/// Recognizes "today", "tomorrow", "day after tomorrow", and day/month pairs in
/// either order. Dates already past this year roll to next year; impossible
/// calendar dates give `None`.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.to_ascii_lowercase();
    let padded = format!(" {} ", words_only(&lowered));

    if padded.contains(" day after tomorrow ") {
        return Some(today + Duration::days(2));
    }
    if padded.contains(" tomorrow ") {
        return Some(today + Duration::days(1));
    }
    if padded.contains(" today ") || padded.contains(" tonight ") {
        return Some(today);
    }

    let (day, month) = if let Some(captures) = DAY_MONTH.captures(&lowered) {
        (captures[1].parse::<u32>().ok()?, month_number(&captures[2])?)
    } else if let Some(captures) = MONTH_DAY.captures(&lowered) {
        (captures[2].parse::<u32>().ok()?, month_number(&captures[1])?)
    } else {
        return None;
    };

    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

/// Recognizes "half past N", "N o'clock", 12-hour and 24-hour clock times, and
/// bare hours after "at"/"around"/"about"/"by", normalized to 24-hour time.
pub fn extract_time(text: &str) -> Option<NaiveTime> {
    let lowered = text.to_ascii_lowercase();
    let meridiem = MERIDIEM.captures(&lowered).map(|captures| captures[1].to_string());

    if let Some(captures) = HALF_PAST.captures(&lowered) {
        return hour_with_context(&captures[1], meridiem.as_deref())
            .and_then(|hour| NaiveTime::from_hms_opt(hour, 30, 0));
    }
    if let Some(captures) = OCLOCK.captures(&lowered) {
        return hour_with_context(&captures[1], meridiem.as_deref())
            .and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0));
    }
    if let Some(captures) = TWELVE_HOUR.captures(&lowered) {
        return twelve_hour_time(&captures);
    }
    if let Some(captures) = TWENTY_FOUR_HOUR.captures(&lowered) {
        let hour = captures[1].parse().ok()?;
        let minute = captures[2].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    if let Some(captures) = BARE_HOUR.captures(&lowered) {
        if captures[0].ends_with(|character: char| character.is_ascii_digit())
            && captures[0].contains(['.', ':'])
        {
            return None;
        }
        return hour_with_context(&captures[1], meridiem.as_deref())
            .and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0));
    }
    None
}

/// Prefers an explicit "N people"/"N of us" phrase. Otherwise takes the first
/// standalone count that is not part of a time, price, duration or date, and
/// drops it when it exceeds the policy cap without the word "people".
pub fn extract_party_size(text: &str, policy: PartySizePolicy) -> Option<u32> {
    let lowered = text.to_ascii_lowercase();

    if let Some(captures) = EXPLICIT_PARTY.captures(&lowered) {
        return parse_count(&captures[1]).filter(|size| *size > 0);
    }

    let candidate = STANDALONE_COUNT
        .captures_iter(&lowered)
        .filter_map(|captures| captures.get(1))
        .find(|found| !in_other_phrase(&lowered, found.start(), found.end()))?;

    let size = parse_count(candidate.as_str()).filter(|size| *size > 0)?;
    let says_people = format!(" {} ", words_only(&lowered)).contains(" people ");
    if size > policy.max_implicit && !says_people {
        return None;
    }
    Some(size)
}

fn in_other_phrase(text: &str, start: usize, end: usize) -> bool {
    let before = &text[..start];
    let after = &text[end..];

    let glued_before = before.chars().next_back();
    let glued_after = after.chars().next();
    if glued_before == Some('$') {
        return true;
    }
    if matches!(glued_after, Some(':' | '-' | '/' | '.' | '%'))
        && after.chars().nth(1).is_some_and(|character| character.is_ascii_digit())
    {
        return true;
    }
    if matches!(glued_before, Some(':' | '-' | '/' | '.'))
        && before.chars().rev().nth(1).is_some_and(|character| character.is_ascii_digit())
    {
        return true;
    }
    if glued_after == Some('%') {
        return true;
    }

    let previous = before.split(|c: char| !c.is_ascii_alphanumeric() && c != '\'').rev().find(
        |word| !word.is_empty(),
    );
    let next = after
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '\'')
        .find(|word| !word.is_empty());

    if let Some(previous) = previous {
        if matches!(previous, "at" | "past" | "around" | "about" | "by" | "until" | "till")
            || MONTH_WORD.is_match(previous)
        {
            return true;
        }
    }

    if let Some(next) = next {
        if MERIDIEM_WORDS.contains(&next)
            || next.starts_with("o'clock")
            || next == "oclock"
            || MONTH_WORD.is_match(next)
        {
            return true;
        }
        if matches!(
            next,
            "dollars" | "dollar" | "bucks" | "usd" | "euros" | "percent" | "minutes" | "minute"
                | "mins" | "min" | "hours" | "hour" | "hrs" | "hr" | "days" | "weeks" | "items"
                | "item"
        ) {
            return true;
        }
    }
    false
}

const MERIDIEM_WORDS: [&str; 4] = ["am", "pm", "a", "p"];

fn twelve_hour_time(captures: &Captures<'_>) -> Option<NaiveTime> {
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = match captures.get(2) {
        Some(minute) => minute.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match &captures[3] {
        "p" => hour % 12 + 12,
        _ => hour % 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parses an hour numeral or word and applies an am/pm marker found elsewhere
/// in the utterance.
fn hour_with_context(raw: &str, meridiem: Option<&str>) -> Option<u32> {
    let hour = match raw {
        "eleven" => 11,
        "twelve" => 12,
        word => match number_word(word) {
            Some(hour) => hour,
            None => raw.parse().ok()?,
        },
    };
    if hour > 23 {
        return None;
    }
    Some(match meridiem {
        Some("p") if hour < 12 => hour + 12,
        Some("a") if hour == 12 => 0,
        _ => hour,
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn words_only(text: &str) -> String {
    text.chars()
        .map(|character| if character.is_ascii_alphanumeric() { character } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
