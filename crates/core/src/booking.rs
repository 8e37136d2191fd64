//! Storage-facing contracts consumed by the dialogue layer.
//!
//! Every `BookingEngine` mutation is transactional: it either fully applies or
//! leaves nothing visible to subsequent reads.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::domain::customer::{Customer, CustomerId, CustomerUpdate};
use crate::domain::feedback::{FeedbackId, Rating};
use crate::domain::menu::{MenuFilter, MenuItem, MenuItemId};
use crate::domain::order::{NewOrderLine, Order, OrderId, OrderLine, OrderStatus};
use crate::domain::reservation::{NewReservation, Reservation, ReservationId, ReservationTable};
use crate::domain::venue::{Offer, RestaurantInfo};
use crate::errors::BookingError;

#[async_trait]
pub trait BookingEngine: Send + Sync {
    /// Inserts a customer row unconditionally. Used for per-session guests.
    async fn create_customer(&self, name: &str) -> Result<CustomerId, BookingError>;

    /// Find-or-create keyed by `(name, phone or email)`, falling back to the
    /// most recent customer with that name whose contacts do not contradict.
    async fn ensure_customer(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<CustomerId, BookingError>;

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, BookingError>;

    /// Fails with `DuplicateContact` when a new phone or email belongs to
    /// another customer; the stored record is left untouched.
    async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, BookingError>;

    async fn open_order(&self, customer_id: CustomerId) -> Result<OrderId, BookingError>;

    /// Merges into an existing line for the same item and recomputes the order
    /// total in the same transaction. Returns the new total.
    async fn add_order_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
        quantity: u32,
        price_snapshot: Decimal,
    ) -> Result<Decimal, BookingError>;

    /// Writes every line or none of them, then recomputes the total, all in
    /// one transaction. Returns the new total.
    async fn add_order_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Decimal, BookingError>;

    /// Drops a line entirely and recomputes the total. Returns the new total.
    async fn remove_order_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
    ) -> Result<Decimal, BookingError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, BookingError>;

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, BookingError>;

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BookingError>;

    async fn cancel_order(&self, id: OrderId) -> Result<Order, BookingError> {
        self.set_order_status(id, OrderStatus::Cancelled).await
    }

    /// Tables with `capacity >= party_size` and no live reservation in the
    /// slot, smallest first.
    async fn find_available_tables(
        &self,
        party_size: u32,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<ReservationTable>, BookingError>;

    /// Re-checks the slot at commit time. A lost race yields `SlotTaken`.
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationId, BookingError>;

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, BookingError>;

    async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, BookingError>;

    async fn record_feedback(
        &self,
        customer_id: Option<CustomerId>,
        rating: Rating,
        comments: &str,
    ) -> Result<FeedbackId, BookingError>;
}

/// Read-only reference data: menu, offers and venue details.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn menu_items(&self) -> Result<Vec<MenuItem>, BookingError>;

    async fn menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, BookingError>;

    async fn filter_menu(&self, filter: &MenuFilter) -> Result<Vec<MenuItem>, BookingError> {
        let items = self.menu_items().await?;
        Ok(items.into_iter().filter(|item| filter.matches(item)).collect())
    }

    async fn offers(&self) -> Result<Vec<Offer>, BookingError>;

    async fn restaurant_info(&self) -> Result<Option<RestaurantInfo>, BookingError>;
}
