use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use bistro_core::domain::customer::ContactField;
use bistro_core::errors::{BookingError, DomainError};

pub mod catalog;
pub mod customer;
pub mod feedback;
pub mod order;
pub mod reservation;

pub use catalog::SqlCatalog;
pub use customer::SqlCustomerRepository;
pub use feedback::SqlFeedbackRepository;
pub use order::SqlOrderRepository;
pub use reservation::SqlReservationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0} is already registered to another customer")]
    DuplicateContact(ContactField),
    #[error("table {table_id} is already booked for {date} at {time}")]
    SlotTaken { table_id: i64, date: String, time: String },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<RepositoryError> for BookingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => BookingError::Store(error.to_string()),
            RepositoryError::Decode(message) => {
                BookingError::Store(format!("stored row could not be decoded: {message}"))
            }
            RepositoryError::NotFound { entity, id } => BookingError::NotFound { entity, id },
            RepositoryError::DuplicateContact(field) => BookingError::DuplicateContact { field },
            RepositoryError::SlotTaken { table_id, date, time } => {
                BookingError::SlotTaken { table_id, date, time }
            }
            RepositoryError::Invalid(message) => BookingError::Validation(message),
            RepositoryError::Domain(error) => BookingError::Domain(error),
        }
    }
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

pub(crate) fn to_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} value {value} is out of range")))
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// The constraint text SQLite reports for a unique violation, if that is what
/// `error` is.
pub(crate) fn unique_violation(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.message().to_string()),
        _ => None,
    }
}

pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
