//! Typed per-conversation state.

use std::fmt;

use serde::{Deserialize, Serialize};

use bistro_core::domain::customer::{Customer, CustomerId};
use bistro_core::domain::menu::MenuItemId;
use bistro_core::domain::order::OrderId;
use bistro_core::domain::reservation::ReservationTable;

use crate::intent::ClassifierContext;
use crate::llm::{ChatRole, ChatTurn};
use crate::slots::ReservationSlots;

pub type SessionId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Initial,
    AwaitingName,
    AwaitingPhone,
    AwaitingEmail,
    Ready,
    AwaitingOrderDetails,
    AwaitingOrderConfirmation,
    AwaitingReservationDetails,
    AwaitingReservationConfirmation,
    Concluding,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::AwaitingName => "AWAITING_NAME",
            Self::AwaitingPhone => "AWAITING_PHONE",
            Self::AwaitingEmail => "AWAITING_EMAIL",
            Self::Ready => "READY",
            Self::AwaitingOrderDetails => "AWAITING_ORDER_DETAILS",
            Self::AwaitingOrderConfirmation => "AWAITING_ORDER_CONFIRMATION",
            Self::AwaitingReservationDetails => "AWAITING_RESERVATION_DETAILS",
            Self::AwaitingReservationConfirmation => "AWAITING_RESERVATION_CONFIRMATION",
            Self::Concluding => "CONCLUDING",
        }
    }

    pub fn is_collecting_contact(self) -> bool {
        matches!(self, Self::AwaitingName | Self::AwaitingPhone | Self::AwaitingEmail)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task put on hold until a phone number has been collected. The
/// triggering utterance is kept so its slots are not lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeferredTask {
    Order { utterance: String },
    Reservation { utterance: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingLine {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// Contact fields the customer declined to share in this session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactRefusals {
    pub name: bool,
    pub phone: bool,
    pub email: bool,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    state: ConversationState,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub pending_order_id: Option<OrderId>,
    pub pending_order_lines: Vec<PendingLine>,
    pub pending_reservation: Option<ReservationSlots>,
    pub offered_table: Option<ReservationTable>,
    awaiting_order_confirmation: bool,
    awaiting_reservation_confirmation: bool,
    pub deferred: Option<DeferredTask>,
    pub refusals: ContactRefusals,
    pub history: Vec<ChatTurn>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            state: ConversationState::Initial,
            customer_id: None,
            customer_name: None,
            customer_phone: None,
            customer_email: None,
            pending_order_id: None,
            pending_order_lines: Vec::new(),
            pending_reservation: None,
            offered_table: None,
            awaiting_order_confirmation: false,
            awaiting_reservation_confirmation: false,
            deferred: None,
            refusals: ContactRefusals::default(),
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Moves to `state`; the confirmation flags follow the state.
    pub fn set_state(&mut self, state: ConversationState) {
        self.state = state;
        self.awaiting_order_confirmation = state == ConversationState::AwaitingOrderConfirmation;
        self.awaiting_reservation_confirmation =
            state == ConversationState::AwaitingReservationConfirmation;
    }

    pub fn awaiting_order_confirmation(&self) -> bool {
        self.awaiting_order_confirmation
    }

    pub fn awaiting_reservation_confirmation(&self) -> bool {
        self.awaiting_reservation_confirmation
    }

    pub fn classifier_context(&self) -> ClassifierContext {
        ClassifierContext {
            awaiting_order_confirmation: self.awaiting_order_confirmation,
            awaiting_reservation_confirmation: self.awaiting_reservation_confirmation,
            collecting_contact: self.state.is_collecting_contact(),
        }
    }

    pub fn cache_customer(&mut self, customer: &Customer) {
        self.customer_id = Some(customer.id);
        self.customer_name = Some(customer.name.clone());
        self.customer_phone = customer.phone.clone();
        self.customer_email = customer.email.clone();
    }

    pub fn has_phone(&self) -> bool {
        self.customer_phone.is_some()
    }

    /// True when the cached name is a real name rather than the guest placeholder.
    pub fn has_name(&self, guest_name: &str) -> bool {
        self.customer_name.as_deref().is_some_and(|name| name != guest_name)
    }

    pub fn clear_pending_order(&mut self) {
        self.pending_order_id = None;
        self.pending_order_lines.clear();
        self.awaiting_order_confirmation = false;
    }

    pub fn clear_pending_reservation(&mut self) {
        self.pending_reservation = None;
        self.offered_table = None;
        self.awaiting_reservation_confirmation = false;
    }

    /// Records one exchange and keeps the last `window` exchanges.
    pub fn record_exchange(&mut self, utterance: &str, reply: &str, window: usize) {
        self.history.push(ChatTurn::new(ChatRole::User, utterance));
        self.history.push(ChatTurn::new(ChatRole::Assistant, reply));
        let keep = window.saturating_mul(2);
        if self.history.len() > keep {
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }
    }
}
