//! Domain model, configuration and storage contracts for the bistro assistant.
//!
//! - `domain`: customers, menu, orders, reservations, offers and feedback
//! - `booking`: the `BookingEngine` and `CatalogReader` traits implemented by storage
//! - `errors`: the error taxonomy shared by every layer
//! - `config`: layered application configuration

pub mod booking;
pub mod config;
pub mod domain;
pub mod errors;

pub use booking::{BookingEngine, CatalogReader};
pub use domain::customer::{ContactField, Customer, CustomerId, CustomerUpdate};
pub use domain::feedback::{Feedback, FeedbackId, Rating};
pub use domain::menu::{DietaryTag, MenuFilter, MenuItem, MenuItemId};
pub use domain::order::{order_total, NewOrderLine, Order, OrderId, OrderLine, OrderStatus};
pub use domain::reservation::{
    NewReservation, Reservation, ReservationId, ReservationStatus, ReservationTable, TableId,
};
pub use domain::venue::{Offer, RestaurantInfo};
pub use errors::{ApplicationError, BookingError, DomainError, ErrorClass, InterfaceError};
