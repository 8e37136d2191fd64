use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub name: String,
    pub description: String,
    /// Fraction of the price taken off, `0.50` for half price.
    pub discount: Decimal,
    pub valid_from: NaiveTime,
    pub valid_to: NaiveTime,
    pub is_happy_hour: bool,
}

impl Offer {
    pub fn is_active_at(&self, now: NaiveTime) -> bool {
        if self.valid_from <= self.valid_to {
            self.valid_from <= now && now <= self.valid_to
        } else {
            now >= self.valid_from || now <= self.valid_to
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.valid_from == NaiveTime::MIN
            && self.valid_to >= NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn discount_percent(&self) -> Decimal {
        (self.discount * Decimal::from(100)).round()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    use super::Offer;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn happy_hour() -> Offer {
        Offer {
            name: "Happy Hour Drinks".to_string(),
            description: "50% off all draft beers and house wines".to_string(),
            discount: Decimal::from_str("0.50").expect("literal"),
            valid_from: at(16, 0),
            valid_to: at(18, 0),
            is_happy_hour: true,
        }
    }

    #[test]
    fn window_is_inclusive() {
        let offer = happy_hour();
        assert!(offer.is_active_at(at(16, 0)));
        assert!(offer.is_active_at(at(18, 0)));
        assert!(!offer.is_active_at(at(18, 1)));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let offer = Offer { valid_from: at(22, 0), valid_to: at(2, 0), ..happy_hour() };
        assert!(offer.is_active_at(at(23, 30)));
        assert!(offer.is_active_at(at(1, 0)));
        assert!(!offer.is_active_at(at(12, 0)));
    }

    #[test]
    fn percent_and_all_day_helpers() {
        let offer = happy_hour();
        assert_eq!(offer.discount_percent(), Decimal::from(50));
        assert!(!offer.is_all_day());

        let all_day = Offer { valid_from: at(0, 0), valid_to: at(23, 59), ..offer };
        assert!(all_day.is_all_day());
    }
}
