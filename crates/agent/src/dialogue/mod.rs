//! Per-turn conversation driver.
//!
//! `DialogueManager::handle_turn` classifies the utterance, runs the handler
//! for the session's current state, and either returns a follow-up question
//! or calls the booking engine. A failing store write restores the session
//! snapshot taken at the start of the turn.

mod contact;
mod info;
mod order;
mod reservation;

use std::sync::Arc;

use bistro_core::booking::{BookingEngine, CatalogReader};
use bistro_core::config::DialogueConfig;
use bistro_core::errors::{ApplicationError, BookingError};

use crate::clock::{Clock, SystemClock};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::LlmClient;
use crate::search::{KeywordMenuSearch, MenuSearch};
use crate::session::{ConversationState, DeferredTask, Session};
use crate::slots::{CatalogIndex, PartySizePolicy};

const FALLBACK_REPLY: &str = "I'm not sure I understood that. I can show you the menu, take an \
order, book a table, or tell you about our hours and location.";

const CAPABILITIES: &str =
    "You can ask to see the menu, place an order, or book a table.";

type TurnResult = Result<String, BookingError>;

/// Tunables taken from the `dialogue` config section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueSettings {
    pub party_size: PartySizePolicy,
    pub history_window: usize,
    pub guest_name: String,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self::from(&DialogueConfig::default())
    }
}

impl From<&DialogueConfig> for DialogueSettings {
    fn from(config: &DialogueConfig) -> Self {
        Self {
            party_size: PartySizePolicy { max_implicit: config.max_implicit_party_size },
            history_window: config.history_window,
            guest_name: config.guest_name.clone(),
        }
    }
}

pub struct DialogueManager {
    booking: Arc<dyn BookingEngine>,
    catalog: Arc<dyn CatalogReader>,
    search: Arc<dyn MenuSearch>,
    llm: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    classifier: IntentClassifier,
    menu: CatalogIndex,
    settings: DialogueSettings,
}

impl DialogueManager {
    /// Loads the menu once to build the item index, the classifier's food
    /// vocabulary and the default keyword search.
    pub async fn new(
        booking: Arc<dyn BookingEngine>,
        catalog: Arc<dyn CatalogReader>,
        llm: Arc<dyn LlmClient>,
        settings: DialogueSettings,
    ) -> Result<Self, BookingError> {
        let items = catalog.menu_items().await?;
        let menu = CatalogIndex::new(items.clone());
        let classifier = IntentClassifier::new(menu.vocabulary());

        Ok(Self {
            booking,
            catalog,
            search: Arc::new(KeywordMenuSearch::new(items)),
            llm,
            clock: Arc::new(SystemClock),
            classifier,
            menu,
            settings,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn MenuSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Runs one turn to completion. Never fails: store errors are reported to
    /// the user and the session is restored to its pre-turn state.
    pub async fn handle_turn(&self, session: &mut Session, utterance: &str) -> String {
        let snapshot = session.clone();
        let state_before = session.state();

        let reply = match self.dispatch(session, utterance).await {
            Ok(reply) => {
                tracing::info!(
                    event_name = "dialogue.turn.completed",
                    session_id = %session.id,
                    state_before = %state_before,
                    state_after = %session.state(),
                    "turn completed"
                );
                reply
            }
            Err(error) => {
                *session = snapshot;
                tracing::warn!(
                    event_name = "dialogue.turn.rolled_back",
                    session_id = %session.id,
                    state = %session.state(),
                    error_class = ?error.class(),
                    error = %error,
                    "turn rolled back"
                );
                ApplicationError::from(error).into_interface(session.id.clone()).user_message().to_string()
            }
        };

        session.record_exchange(utterance, &reply, self.settings.history_window);
        reply
    }

    async fn dispatch(&self, session: &mut Session, utterance: &str) -> TurnResult {
        self.ensure_customer(session).await?;

        let intent = self.classifier.classify(utterance, session.classifier_context());
        tracing::debug!(
            session_id = %session.id,
            state = %session.state(),
            intent = %intent,
            "classified utterance"
        );

        match session.state() {
            ConversationState::Initial => self.on_initial(session, utterance, intent).await,
            ConversationState::AwaitingName => self.on_awaiting_name(session, utterance, intent).await,
            ConversationState::AwaitingPhone => self.on_awaiting_phone(session, utterance).await,
            ConversationState::AwaitingEmail => self.on_awaiting_email(session, utterance).await,
            ConversationState::Ready => self.on_ready(session, utterance, intent).await,
            ConversationState::AwaitingOrderDetails => {
                self.on_order_details(session, utterance).await
            }
            ConversationState::AwaitingOrderConfirmation => {
                self.on_order_confirmation(session, utterance, intent).await
            }
            ConversationState::AwaitingReservationDetails => {
                self.on_reservation_details(session, utterance).await
            }
            ConversationState::AwaitingReservationConfirmation => {
                self.on_reservation_confirmation(session, utterance, intent).await
            }
            ConversationState::Concluding => {
                session.set_state(ConversationState::Ready);
                self.on_ready(session, utterance, intent).await
            }
        }
    }

    /// Creates the session's guest customer on first use, then refreshes the
    /// cached contact fields from the store.
    async fn ensure_customer(&self, session: &mut Session) -> Result<(), BookingError> {
        if let Some(id) = session.customer_id {
            if let Some(customer) = self.booking.customer(id).await? {
                session.cache_customer(&customer);
                return Ok(());
            }
        }

        let id = self.booking.create_customer(&self.settings.guest_name).await?;
        let customer = self
            .booking
            .customer(id)
            .await?
            .ok_or(BookingError::NotFound { entity: "customer", id: id.0 })?;
        session.cache_customer(&customer);
        Ok(())
    }

    async fn on_initial(&self, session: &mut Session, utterance: &str, intent: Intent) -> TurnResult {
        let mut prefix = format!("Hello! Welcome to {}. ", self.restaurant_name().await?);

        match intent {
            Intent::PlaceOrder => {
                session.deferred = Some(DeferredTask::Order { utterance: utterance.to_string() });
            }
            Intent::MakeReservation => {
                session.deferred =
                    Some(DeferredTask::Reservation { utterance: utterance.to_string() });
            }
            Intent::ProvideName => {
                if let Some(name) = crate::validators::extract_name(utterance) {
                    self.save_name(session, &name).await?;
                    prefix = format!("Hello {name}! Welcome to {}. ", self.restaurant_name().await?);
                }
            }
            intent if intent.is_topic() => {
                let answer = self.answer_topic(session, utterance, intent).await?;
                prefix = format!("{answer}\n\n");
            }
            _ => {}
        }

        self.advance_contacts(session, &prefix).await
    }

    async fn on_ready(&self, session: &mut Session, utterance: &str, intent: Intent) -> TurnResult {
        match intent {
            Intent::Greet => {
                if self.next_contact_gap(session).is_some() {
                    let prefix = format!("Hello! Welcome to {}. ", self.restaurant_name().await?);
                    return self.advance_contacts(session, &prefix).await;
                }
                Ok(format!("Hello {}! How can I help you today? {CAPABILITIES}", self.display_name(session)))
            }
            Intent::Farewell => {
                session.set_state(ConversationState::Concluding);
                let name = self.restaurant_name().await?;
                Ok(format!(
                    "Thank you for visiting {name}, {}! Have a wonderful day.",
                    self.display_name(session)
                ))
            }
            Intent::PlaceOrder => {
                if !session.has_phone() {
                    return self.defer_for_phone(
                        session,
                        DeferredTask::Order { utterance: utterance.to_string() },
                    );
                }
                self.start_order(session, utterance, "", false).await
            }
            Intent::MakeReservation => {
                if !session.has_phone() {
                    return self.defer_for_phone(
                        session,
                        DeferredTask::Reservation { utterance: utterance.to_string() },
                    );
                }
                self.start_reservation(session, utterance, "").await
            }
            Intent::ModifyOrder => Ok("Changing an existing order isn't something I can do here \
yet. You can place a new order, or call us and a member of staff will help."
                .to_string()),
            Intent::ModifyReservation => Ok("Changing or cancelling an existing reservation isn't \
something I can do here yet. Please call us and we'll sort it out for you."
                .to_string()),
            Intent::ConfirmOrder | Intent::CancelOrder => {
                Ok("There's no pending order right now. Would you like to place one?".to_string())
            }
            Intent::ConfirmReservation | Intent::CancelReservation => Ok(
                "There's no pending reservation right now. Would you like to book a table?"
                    .to_string(),
            ),
            Intent::ProvidePhoneNumber => self.update_phone_from_ready(session, utterance).await,
            Intent::ProvideEmail => self.update_email_from_ready(session, utterance).await,
            Intent::ProvideName => self.update_name_from_ready(session, utterance).await,
            Intent::RefuseInfo => {
                Ok("No problem. Is there anything else I can help you with?".to_string())
            }
            Intent::GeneralQuery => Ok(self.general_query(session, utterance).await),
            topic => self.answer_topic(session, utterance, topic).await,
        }
    }

    /// Phone is required for orders and reservations: park the task and ask.
    fn defer_for_phone(&self, session: &mut Session, task: DeferredTask) -> TurnResult {
        let action = match task {
            DeferredTask::Order { .. } => "place an order",
            DeferredTask::Reservation { .. } => "book a table",
        };
        session.deferred = Some(task);
        session.refusals.phone = false;
        session.set_state(ConversationState::AwaitingPhone);
        Ok(format!("To {action} I'll need a phone number we can reach you on. What's your phone number?"))
    }

    /// Continues a parked order or reservation once contact collection is done.
    async fn resume_deferred(&self, session: &mut Session, prefix: &str) -> TurnResult {
        match session.deferred.take() {
            Some(DeferredTask::Order { utterance }) if session.has_phone() => {
                self.start_order(session, &utterance, prefix, true).await
            }
            Some(DeferredTask::Reservation { utterance }) if session.has_phone() => {
                self.start_reservation(session, &utterance, prefix).await
            }
            Some(_) => {
                session.set_state(ConversationState::Ready);
                Ok(format!(
                    "{prefix}Without a phone number I can't take orders or book tables, but I'm \
happy to help with anything else."
                ))
            }
            None => {
                session.set_state(ConversationState::Ready);
                Ok(format!(
                    "{prefix}How can I help you today, {}? {CAPABILITIES}",
                    self.display_name(session)
                ))
            }
        }
    }

    async fn general_query(&self, session: &Session, utterance: &str) -> String {
        match self.llm.complete(&session.history, utterance).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    event_name = "llm.completion.failed",
                    session_id = %session.id,
                    error = %error,
                    "language model fallback unavailable"
                );
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn restaurant_name(&self) -> Result<String, BookingError> {
        Ok(self
            .catalog
            .restaurant_info()
            .await?
            .map(|info| info.name)
            .unwrap_or_else(|| "our restaurant".to_string()))
    }

    fn display_name(&self, session: &Session) -> String {
        if session.has_name(&self.settings.guest_name) {
            session.customer_name.clone().unwrap_or_default()
        } else {
            "there".to_string()
        }
    }

    fn customer_id(
        &self,
        session: &Session,
    ) -> Result<bistro_core::domain::customer::CustomerId, BookingError> {
        session.customer_id.ok_or_else(|| {
            BookingError::Validation("session has no customer attached".to_string())
        })
    }
}

/// "Never mind"-style phrases that abandon an in-progress flow.
fn is_abort(utterance: &str) -> bool {
    let normalized = utterance.trim().to_ascii_lowercase();
    let padded = format!(" {} ", normalized.trim_end_matches(['.', '!']));
    ["cancel", "never mind", "nevermind", "forget it", "stop", "abort"]
        .iter()
        .any(|phrase| padded.contains(&format!(" {phrase} ")))
}

#[cfg(test)]
mod tests;
