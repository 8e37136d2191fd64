use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::menu::MenuItemId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Delivered)
                | (OrderStatus::Confirmed, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.status == next {
            return Ok(());
        }
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    pub fn accepts_lines(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// A line with its price snapshotted at the moment it was added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub item_name: String,
    pub quantity: u32,
    pub price_at_order_time: Decimal,
}

impl OrderLine {
    pub fn line_total(&self) -> Decimal {
        self.price_at_order_time * Decimal::from(self.quantity)
    }
}

/// A line to be written, priced from the catalog at the time of the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrderLine {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub price_snapshot: Decimal,
}

pub fn order_total(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::line_total).sum()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::customer::CustomerId;
    use crate::domain::menu::MenuItemId;
    use crate::errors::DomainError;

    use super::{order_total, Order, OrderId, OrderLine, OrderStatus};

    fn pending() -> Order {
        Order {
            id: OrderId(7),
            customer_id: CustomerId(1),
            status: OrderStatus::Pending,
            total_amount: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    fn line(item: i64, quantity: u32, price: &str) -> OrderLine {
        OrderLine {
            order_id: OrderId(7),
            menu_item_id: MenuItemId(item),
            item_name: format!("item-{item}"),
            quantity,
            price_at_order_time: Decimal::from_str(price).expect("price literal"),
        }
    }

    #[test]
    fn pending_order_can_be_confirmed_then_delivered() {
        let mut order = pending();
        order.transition_to(OrderStatus::Confirmed).expect("pending -> confirmed");
        order.transition_to(OrderStatus::Delivered).expect("confirmed -> delivered");
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[test]
    fn cancelled_order_cannot_be_revived() {
        let mut order = pending();
        order.transition_to(OrderStatus::Cancelled).expect("pending -> cancelled");

        let error = order.transition_to(OrderStatus::Confirmed).expect_err("must be rejected");
        assert_eq!(
            error,
            DomainError::InvalidOrderTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed
            }
        );
    }

    #[test]
    fn total_uses_snapshotted_prices() {
        let lines = vec![line(1, 2, "12.99"), line(6, 3, "3.00")];
        assert_eq!(order_total(&lines), Decimal::from_str("34.98").expect("literal"));
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
            OrderStatus::Delivered,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
