use thiserror::Error;

use crate::domain::customer::ContactField;
use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Coarse class of a booking failure, used to pick the conversational recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    ValidationFailure,
    NotFound,
    Conflict,
    StoreFailure,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{field} is already registered to another customer")]
    DuplicateContact { field: ContactField },
    #[error("table {table_id} is already booked for {date} at {time}")]
    SlotTaken { table_id: i64, date: String, time: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store failure: {0}")]
    Store(String),
}

impl BookingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::Domain(_) => ErrorClass::ValidationFailure,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::DuplicateContact { .. } | Self::SlotTaken { .. } => ErrorClass::Conflict,
            Self::Store(_) => ErrorClass::StoreFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::StoreFailure
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, session_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, session_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, session_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, session_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "I couldn't process that. Could you rephrase it?",
            Self::Conflict { .. } => {
                "That conflicts with an existing booking or contact. Please try something else."
            }
            Self::ServiceUnavailable { .. } => {
                "Sorry, something went wrong on our side. Please try again in a moment."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, session_id: impl Into<String>) -> InterfaceError {
        let session_id = session_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { session_id: id, .. }
            | InterfaceError::Conflict { session_id: id, .. }
            | InterfaceError::ServiceUnavailable { session_id: id, .. }
            | InterfaceError::Internal { session_id: id, .. } => *id = session_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let session_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), session_id }
            }
            ApplicationError::Booking(error) => {
                let message = error.to_string();
                match error.class() {
                    ErrorClass::ValidationFailure | ErrorClass::NotFound => {
                        Self::BadRequest { message, session_id }
                    }
                    ErrorClass::Conflict => Self::Conflict { message, session_id },
                    ErrorClass::StoreFailure => Self::ServiceUnavailable { message, session_id },
                }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, session_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, session_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::customer::ContactField;
    use crate::errors::{ApplicationError, BookingError, DomainError, ErrorClass, InterfaceError};

    #[test]
    fn booking_errors_map_to_taxonomy() {
        assert_eq!(BookingError::Validation("bad".into()).class(), ErrorClass::ValidationFailure);
        assert_eq!(
            BookingError::NotFound { entity: "order", id: 9 }.class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            BookingError::DuplicateContact { field: ContactField::Phone }.class(),
            ErrorClass::Conflict
        );
        assert_eq!(
            BookingError::SlotTaken {
                table_id: 1,
                date: "2026-05-01".into(),
                time: "19:00".into()
            }
            .class(),
            ErrorClass::Conflict
        );
        assert!(BookingError::Store("disk I/O error".into()).is_retryable());
    }

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "quantity must be positive".to_owned(),
        ))
        .into_interface("session-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref session_id, .. } if session_id == "session-1"
        ));
    }

    #[test]
    fn conflict_has_actionable_user_message() {
        let interface =
            ApplicationError::from(BookingError::DuplicateContact { field: ContactField::Email })
                .into_interface("session-2");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert!(interface.user_message().contains("try something else"));
    }

    #[test]
    fn store_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(BookingError::Store("database is locked".into()))
            .into_interface("session-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "Sorry, something went wrong on our side. Please try again in a moment."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad llm url".to_owned()).into_interface("session-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
