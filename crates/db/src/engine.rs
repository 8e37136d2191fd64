use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use bistro_core::booking::BookingEngine;
use bistro_core::domain::customer::{Customer, CustomerId, CustomerUpdate};
use bistro_core::domain::feedback::{FeedbackId, Rating};
use bistro_core::domain::menu::MenuItemId;
use bistro_core::domain::order::{NewOrderLine, Order, OrderId, OrderLine, OrderStatus};
use bistro_core::domain::reservation::{
    NewReservation, Reservation, ReservationId, ReservationTable,
};
use bistro_core::errors::BookingError;

use crate::repositories::{
    SqlCustomerRepository, SqlFeedbackRepository, SqlOrderRepository, SqlReservationRepository,
};
use crate::DbPool;

/// `BookingEngine` over SQLite. Each operation runs in its own transaction.
pub struct SqlBookingEngine {
    customers: SqlCustomerRepository,
    orders: SqlOrderRepository,
    reservations: SqlReservationRepository,
    feedback: SqlFeedbackRepository,
}

impl SqlBookingEngine {
    pub fn new(pool: DbPool) -> Self {
        Self {
            customers: SqlCustomerRepository::new(pool.clone()),
            orders: SqlOrderRepository::new(pool.clone()),
            reservations: SqlReservationRepository::new(pool.clone()),
            feedback: SqlFeedbackRepository::new(pool),
        }
    }
}

#[async_trait]
impl BookingEngine for SqlBookingEngine {
    async fn create_customer(&self, name: &str) -> Result<CustomerId, BookingError> {
        Ok(self.customers.create(name).await?)
    }

    async fn ensure_customer(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<CustomerId, BookingError> {
        Ok(self.customers.ensure(name, phone, email).await?)
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, BookingError> {
        Ok(self.customers.find(id).await?)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, BookingError> {
        Ok(self.customers.update(id, update).await?)
    }

    async fn open_order(&self, customer_id: CustomerId) -> Result<OrderId, BookingError> {
        Ok(self.orders.open(customer_id).await?)
    }

    async fn add_order_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
        quantity: u32,
        price_snapshot: Decimal,
    ) -> Result<Decimal, BookingError> {
        Ok(self.orders.add_line(order_id, menu_item_id, quantity, price_snapshot).await?)
    }

    async fn add_order_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Decimal, BookingError> {
        Ok(self.orders.add_lines(order_id, lines).await?)
    }

    async fn remove_order_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
    ) -> Result<Decimal, BookingError> {
        Ok(self.orders.remove_line(order_id, menu_item_id).await?)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, BookingError> {
        Ok(self.orders.find(id).await?)
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, BookingError> {
        Ok(self.orders.lines(id).await?)
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BookingError> {
        Ok(self.orders.set_status(id, status).await?)
    }

    async fn find_available_tables(
        &self,
        party_size: u32,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<ReservationTable>, BookingError> {
        Ok(self.reservations.available_tables(party_size, date, time).await?)
    }

    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationId, BookingError> {
        Ok(self.reservations.create(&request).await?)
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, BookingError> {
        Ok(self.reservations.find(id).await?)
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        Ok(self.reservations.cancel(id).await?)
    }

    async fn record_feedback(
        &self,
        customer_id: Option<CustomerId>,
        rating: Rating,
        comments: &str,
    ) -> Result<FeedbackId, BookingError> {
        Ok(self.feedback.record(customer_id, rating, comments).await?)
    }
}
