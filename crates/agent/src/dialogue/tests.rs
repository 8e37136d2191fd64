use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use bistro_core::booking::BookingEngine;
use bistro_core::domain::customer::{Customer, CustomerId, CustomerUpdate};
use bistro_core::domain::feedback::{FeedbackId, Rating};
use bistro_core::domain::menu::MenuItemId;
use bistro_core::domain::order::{NewOrderLine, Order, OrderId, OrderLine, OrderStatus};
use bistro_core::domain::reservation::{NewReservation, Reservation, ReservationId, ReservationTable};
use bistro_core::errors::BookingError;
use bistro_db::{connect_with_settings, migrations, CatalogSeed, DbPool, SqlBookingEngine, SqlCatalog};

use super::{DialogueManager, DialogueSettings, FALLBACK_REPLY};
use crate::clock::FixedClock;
use crate::llm::{ChatTurn, DisabledLlm, LlmClient};
use crate::session::{ConversationState, Session};

async fn pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    CatalogSeed::load(&pool).await.expect("seed");
    pool
}

fn noon() -> FixedClock {
    let today = NaiveDate::from_ymd_opt(2026, 6, 10).expect("valid date");
    FixedClock(today.and_time(NaiveTime::from_hms_opt(12, 0, 0).expect("valid time")))
}

async fn manager_with(
    pool: &DbPool,
    booking: Arc<dyn BookingEngine>,
    llm: Arc<dyn LlmClient>,
) -> DialogueManager {
    let catalog = Arc::new(SqlCatalog::new(pool.clone()));
    DialogueManager::new(booking, catalog, llm, DialogueSettings::default())
        .await
        .expect("dialogue manager")
        .with_clock(Arc::new(noon()))
}

async fn setup() -> (DialogueManager, Arc<SqlBookingEngine>) {
    let pool = pool().await;
    let engine = Arc::new(SqlBookingEngine::new(pool.clone()));
    let manager = manager_with(&pool, engine.clone(), Arc::new(DisabledLlm)).await;
    (manager, engine)
}

/// Walks a fresh session through greeting, name and phone, skipping email.
async fn ready_session(manager: &DialogueManager, id: &str, name: &str, phone: &str) -> Session {
    let mut session = Session::new(id);
    manager.handle_turn(&mut session, "hi").await;
    manager.handle_turn(&mut session, &format!("my name is {name}")).await;
    manager.handle_turn(&mut session, phone).await;
    manager.handle_turn(&mut session, "skip").await;
    assert_eq!(session.state(), ConversationState::Ready);
    session
}

#[tokio::test]
async fn greeting_asks_for_name() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");

    let reply = manager.handle_turn(&mut session, "hi").await;

    assert!(reply.contains("The Culinary Hub"), "{reply}");
    assert!(reply.contains("your name"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingName);
    assert!(session.customer_id.is_some());
}

#[tokio::test]
async fn contact_collection_normalizes_phone_and_reaches_ready() {
    let (manager, engine) = setup().await;
    let mut session = Session::new("s-1");
    manager.handle_turn(&mut session, "hello").await;

    manager.handle_turn(&mut session, "my name is Dana").await;
    assert_eq!(session.state(), ConversationState::AwaitingPhone);
    assert_eq!(session.customer_name.as_deref(), Some("Dana"));

    manager.handle_turn(&mut session, "555-123-4567").await;
    assert_eq!(session.state(), ConversationState::AwaitingEmail);
    assert_eq!(session.customer_phone.as_deref(), Some("5551234567"));

    let reply = manager.handle_turn(&mut session, "dana@example.com").await;
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(reply.contains("How can I help"), "{reply}");

    let id = session.customer_id.expect("customer attached");
    let stored = engine.customer(id).await.expect("read").expect("customer row");
    assert_eq!(stored.name, "Dana");
    assert_eq!(stored.phone.as_deref(), Some("5551234567"));
    assert_eq!(stored.email.as_deref(), Some("dana@example.com"));
}

#[tokio::test]
async fn invalid_contact_details_keep_the_state() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");
    manager.handle_turn(&mut session, "hi").await;

    let reply = manager.handle_turn(&mut session, "42").await;
    assert!(reply.contains("doesn't look like a name"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingName);

    manager.handle_turn(&mut session, "Dana").await;
    let reply = manager.handle_turn(&mut session, "12345").await;
    assert!(reply.contains("valid phone number"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingPhone);
}

#[tokio::test]
async fn refusing_the_name_moves_on_to_phone() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");
    manager.handle_turn(&mut session, "hi").await;

    manager.handle_turn(&mut session, "no thanks").await;

    assert_eq!(session.state(), ConversationState::AwaitingPhone);
    assert!(session.refusals.name);
    assert_eq!(session.customer_name.as_deref(), Some("Guest Customer"));
}

#[tokio::test]
async fn order_opens_with_running_total() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "2 margherita pizza and a coke").await;

    assert!(reply.contains("2x Margherita Pizza ($25.98)"), "{reply}");
    assert!(reply.contains("Total: $25.98"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingOrderConfirmation);
    assert!(session.awaiting_order_confirmation());

    let order_id = session.pending_order_id.expect("pending order");
    let order = engine.order(order_id).await.expect("read").expect("order row");
    assert_eq!(order.total_amount, Decimal::new(2598, 2));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(engine.order_lines(order_id).await.expect("lines").len(), 1);
}

#[tokio::test]
async fn cancelling_a_pending_order_leaves_nothing_confirmed() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "2 margherita pizza").await;
    let order_id = session.pending_order_id.expect("pending order");

    manager.handle_turn(&mut session, "cancel").await;

    assert_eq!(session.state(), ConversationState::Ready);
    assert!(session.pending_order_id.is_none());
    assert!(session.pending_order_lines.is_empty());
    assert!(!session.awaiting_order_confirmation());
    let order = engine.order(order_id).await.expect("read").expect("order row");
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn confirming_an_order_reports_number_and_total() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "one espresso").await;
    manager.handle_turn(&mut session, "add 2 iced teas").await;
    let order_id = session.pending_order_id.expect("pending order");
    assert_eq!(session.pending_order_lines.len(), 2);

    let reply = manager.handle_turn(&mut session, "yes please").await;

    assert!(reply.contains(&format!("Great Dana! Your order #{order_id}")), "{reply}");
    assert!(reply.contains("$9.50"), "{reply}");
    assert!(reply.contains("SMS to 5551234567"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    let order = engine.order(order_id).await.expect("read").expect("order row");
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn order_without_known_items_asks_again() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "I'd like to order").await;

    assert!(reply.contains("What would you like to order?"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(session.pending_order_id.is_none());
}

#[tokio::test]
async fn order_without_phone_is_deferred_then_resumed() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");
    manager.handle_turn(&mut session, "hi").await;
    manager.handle_turn(&mut session, "Dana").await;
    manager.handle_turn(&mut session, "skip").await;
    manager.handle_turn(&mut session, "skip").await;
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(!session.has_phone());

    let reply = manager.handle_turn(&mut session, "2 espressos").await;
    assert!(reply.contains("phone number"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingPhone);
    assert!(session.deferred.is_some());

    let reply = manager.handle_turn(&mut session, "my number is 555 987 6543").await;
    assert!(reply.contains("Total: $7.00"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingOrderConfirmation);
    assert!(session.deferred.is_none());
}

#[tokio::test]
async fn resumed_order_without_items_waits_for_details() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");
    manager.handle_turn(&mut session, "I want to order something").await;
    manager.handle_turn(&mut session, "Dana").await;
    manager.handle_turn(&mut session, "555-123-4567").await;

    manager.handle_turn(&mut session, "skip").await;
    assert_eq!(session.state(), ConversationState::AwaitingOrderDetails);

    manager.handle_turn(&mut session, "never mind").await;
    assert_eq!(session.state(), ConversationState::Ready);
}

#[tokio::test]
async fn refusing_phone_drops_the_deferred_task() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "no thanks").await;
    assert!(session.refusals.phone);

    manager.handle_turn(&mut session, "book a table for 2 tomorrow at 7pm").await;
    assert_eq!(session.state(), ConversationState::AwaitingPhone);

    let reply = manager.handle_turn(&mut session, "rather not").await;
    assert!(reply.contains("can't take orders or book tables"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(session.deferred.is_none());
    assert!(session.pending_reservation.is_none());
}

#[tokio::test]
async fn returning_customer_is_recognized_by_phone() {
    let (manager, _) = setup().await;
    let first = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let mut second = Session::new("s-2");
    manager.handle_turn(&mut second, "hi").await;
    manager.handle_turn(&mut second, "I'm Dana").await;
    let reply = manager.handle_turn(&mut second, "555.123.4567").await;

    assert!(reply.contains("Welcome back, Dana"), "{reply}");
    assert_eq!(second.customer_id, first.customer_id);
    assert_eq!(second.state(), ConversationState::AwaitingEmail);
}

#[tokio::test]
async fn phone_of_another_customer_is_refused() {
    let (manager, _) = setup().await;
    ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let mut second = Session::new("s-2");
    manager.handle_turn(&mut second, "hi").await;
    manager.handle_turn(&mut second, "Sam").await;
    let reply = manager.handle_turn(&mut second, "555-123-4567").await;

    assert!(reply.contains("already registered"), "{reply}");
    assert_eq!(second.state(), ConversationState::AwaitingPhone);
    assert!(!second.has_phone());
}

#[tokio::test]
async fn reservation_asks_only_for_missing_slots() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply =
        manager.handle_turn(&mut session, "I'd like to book a table for 4 people tomorrow").await;
    assert!(reply.contains("provide the time?"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingReservationDetails);

    let reply = manager.handle_turn(&mut session, "hmm, let me think").await;
    assert!(reply.contains("provide the time?"), "{reply}");
    assert!(!reply.contains("date"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingReservationDetails);
    let pending = session.pending_reservation.clone().expect("pending slots");
    assert_eq!(pending.party_size, Some(4));
    assert_eq!(pending.date, NaiveDate::from_ymd_opt(2026, 6, 11));
}

#[tokio::test]
async fn reservation_is_offered_then_committed() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "book a table for 4 people tomorrow").await;

    let reply = manager.handle_turn(&mut session, "at 7pm").await;
    assert!(reply.contains("Table 2, capacity 4"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingReservationConfirmation);

    let reply = manager.handle_turn(&mut session, "yes").await;
    assert!(reply.contains("Your reservation #1 is confirmed"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(session.pending_reservation.is_none());

    let stored = engine.reservation(ReservationId(1)).await.expect("read").expect("row");
    assert_eq!(stored.party_size, 4);
    assert_eq!(stored.time, NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"));
}

#[tokio::test]
async fn past_time_today_is_rejected() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "book a table for 2 today at 9am").await;

    assert!(reply.contains("already passed"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingReservationDetails);
    let pending = session.pending_reservation.clone().expect("pending slots");
    assert!(pending.time.is_none());
    assert_eq!(pending.party_size, Some(2));
}

#[tokio::test]
async fn declining_an_offered_table_books_nothing() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "book a table for 2 tomorrow at 8pm").await;
    assert_eq!(session.state(), ConversationState::AwaitingReservationConfirmation);

    manager.handle_turn(&mut session, "no").await;

    assert_eq!(session.state(), ConversationState::Ready);
    assert!(engine.reservation(ReservationId(1)).await.expect("read").is_none());
}

#[tokio::test]
async fn losing_a_reservation_race_resets_to_ready() {
    let (manager, _) = setup().await;
    let mut first = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    let mut second = ready_session(&manager, "s-2", "Sam", "555-765-4321").await;

    manager.handle_turn(&mut first, "table for 6 people tomorrow at 7pm").await;
    manager.handle_turn(&mut second, "table for 6 people tomorrow at 7pm").await;
    assert_eq!(first.offered_table.as_ref().map(|t| t.capacity), Some(6));
    assert_eq!(second.offered_table.as_ref().map(|t| t.capacity), Some(6));

    let won = manager.handle_turn(&mut first, "yes").await;
    let lost = manager.handle_turn(&mut second, "yes").await;

    assert!(won.contains("is confirmed"), "{won}");
    assert!(lost.contains("was just booked"), "{lost}");
    assert_eq!(second.state(), ConversationState::Ready);
    assert!(second.pending_reservation.is_none());
}

#[tokio::test]
async fn no_free_table_apologizes_and_clears() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "book a table for 9 people tomorrow at 7pm").await;

    assert!(reply.contains("don't have a table for 9"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    assert!(session.pending_reservation.is_none());
}

#[tokio::test]
async fn topics_answer_without_changing_state() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let menu = manager.handle_turn(&mut session, "can I see the menu").await;
    assert!(menu.contains("Pizza:\n- Margherita Pizza ($12.99)"), "{menu}");

    let hours = manager.handle_turn(&mut session, "when do you open").await;
    assert!(hours.contains("Mon-Sat: 10:00-22:00"), "{hours}");

    let address = manager.handle_turn(&mut session, "where are you located").await;
    assert!(address.contains("123 Main St"), "{address}");

    let vegan = manager.handle_turn(&mut session, "show me vegan dishes").await;
    assert!(vegan.contains("Veggie Burger"), "{vegan}");
    assert!(!vegan.contains("Margherita"), "{vegan}");

    let offers = manager.handle_turn(&mut session, "any deals?").await;
    assert!(offers.contains("Happy Hour Drinks"), "{offers}");
    assert!(!offers.contains("Currently ON"), "{offers}");

    let details = manager.handle_turn(&mut session, "tell me about the chicken alfredo").await;
    assert!(details.contains("Ingredients: fettuccine"), "{details}");

    assert_eq!(session.state(), ConversationState::Ready);
}

#[tokio::test]
async fn topic_question_from_initial_still_starts_contact_collection() {
    let (manager, _) = setup().await;
    let mut session = Session::new("s-1");

    let reply = manager.handle_turn(&mut session, "what are your opening hours?").await;

    assert!(reply.contains("Mon-Sat"), "{reply}");
    assert!(reply.contains("your name"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingName);
}

#[tokio::test]
async fn feedback_with_rating_is_recorded() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let asked = manager.handle_turn(&mut session, "I have some feedback").await;
    assert!(asked.contains("from 1 to 5"), "{asked}");

    let stored = manager.handle_turn(&mut session, "I'd rate you 5 stars, lovely evening").await;
    assert!(stored.contains("5-star"), "{stored}");
}

#[tokio::test]
async fn farewell_concludes_and_next_turn_restarts() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "bye").await;
    assert!(reply.contains("Thank you for visiting The Culinary Hub, Dana"), "{reply}");
    assert_eq!(session.state(), ConversationState::Concluding);

    let reply = manager.handle_turn(&mut session, "show me the menu").await;
    assert!(reply.contains("Margherita Pizza"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
}

#[tokio::test]
async fn unclassified_input_uses_the_fallback_reply() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "is there parking nearby").await;

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(session.state(), ConversationState::Ready);
}

struct CannedLlm;

#[async_trait]
impl LlmClient for CannedLlm {
    async fn complete(&self, history: &[ChatTurn], utterance: &str) -> anyhow::Result<String> {
        Ok(format!("({} earlier turns) You asked: {utterance}", history.len()))
    }
}

#[tokio::test]
async fn general_queries_go_to_the_language_model_with_history() {
    let pool = pool().await;
    let engine = Arc::new(SqlBookingEngine::new(pool.clone()));
    let manager = manager_with(&pool, engine, Arc::new(CannedLlm)).await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "is there parking nearby").await;

    assert_eq!(reply, "(8 earlier turns) You asked: is there parking nearby");
    assert_eq!(session.history.len(), 10);
}

/// Delegates to the SQL engine but fails order-line writes once
/// `healthy_batches` successful batches have gone through.
struct FailingLines {
    inner: SqlBookingEngine,
    healthy_batches: AtomicUsize,
}

impl FailingLines {
    fn new(inner: SqlBookingEngine, healthy_batches: usize) -> Self {
        Self { inner, healthy_batches: AtomicUsize::new(healthy_batches) }
    }
}

#[async_trait]
impl BookingEngine for FailingLines {
    async fn create_customer(&self, name: &str) -> Result<CustomerId, BookingError> {
        self.inner.create_customer(name).await
    }

    async fn ensure_customer(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<CustomerId, BookingError> {
        self.inner.ensure_customer(name, phone, email).await
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, BookingError> {
        self.inner.customer(id).await
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, BookingError> {
        self.inner.update_customer(id, update).await
    }

    async fn open_order(&self, customer_id: CustomerId) -> Result<OrderId, BookingError> {
        self.inner.open_order(customer_id).await
    }

    async fn add_order_line(
        &self,
        _order_id: OrderId,
        _menu_item_id: MenuItemId,
        _quantity: u32,
        _price_snapshot: Decimal,
    ) -> Result<Decimal, BookingError> {
        Err(BookingError::Store("disk I/O error".to_string()))
    }

    async fn add_order_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Decimal, BookingError> {
        let healthy = self
            .healthy_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !healthy {
            return Err(BookingError::Store("disk I/O error".to_string()));
        }
        self.inner.add_order_lines(order_id, lines).await
    }

    async fn remove_order_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
    ) -> Result<Decimal, BookingError> {
        self.inner.remove_order_line(order_id, menu_item_id).await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, BookingError> {
        self.inner.order(id).await
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, BookingError> {
        self.inner.order_lines(id).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BookingError> {
        self.inner.set_order_status(id, status).await
    }

    async fn find_available_tables(
        &self,
        party_size: u32,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<ReservationTable>, BookingError> {
        self.inner.find_available_tables(party_size, date, time).await
    }

    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationId, BookingError> {
        self.inner.create_reservation(request).await
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, BookingError> {
        self.inner.reservation(id).await
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        self.inner.cancel_reservation(id).await
    }

    async fn record_feedback(
        &self,
        customer_id: Option<CustomerId>,
        rating: Rating,
        comments: &str,
    ) -> Result<FeedbackId, BookingError> {
        self.inner.record_feedback(customer_id, rating, comments).await
    }
}

#[tokio::test]
async fn store_failure_rolls_the_session_back() {
    let pool = pool().await;
    let engine = Arc::new(FailingLines::new(SqlBookingEngine::new(pool.clone()), 0));
    let manager = manager_with(&pool, engine.clone(), Arc::new(DisabledLlm)).await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    let before = session.clone();

    let reply = manager.handle_turn(&mut session, "2 margherita pizza").await;

    assert!(reply.contains("try again"), "{reply}");
    assert_eq!(session.state(), ConversationState::Ready);
    assert_eq!(session.pending_order_id, before.pending_order_id);
    assert!(session.pending_order_lines.is_empty());
    assert_eq!(session.customer_id, before.customer_id);

    let abandoned = engine.order(OrderId(1)).await.expect("read").expect("order row");
    assert_eq!(abandoned.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn failed_batch_on_an_open_order_leaves_earlier_lines_untouched() {
    let pool = pool().await;
    let engine = Arc::new(FailingLines::new(SqlBookingEngine::new(pool.clone()), 1));
    let manager = manager_with(&pool, engine.clone(), Arc::new(DisabledLlm)).await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "one espresso").await;
    let order_id = session.pending_order_id.expect("pending order");
    let before = session.clone();

    let reply = manager.handle_turn(&mut session, "add one espresso and one iced tea").await;

    assert!(reply.contains("try again"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingOrderConfirmation);
    assert_eq!(session.pending_order_lines, before.pending_order_lines);
    let lines = engine.order_lines(order_id).await.expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 1);
    let order = engine.order(order_id).await.expect("read").expect("order row");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::new(350, 2));

    let reply = manager.handle_turn(&mut session, "yes").await;
    assert!(reply.contains("$3.50"), "{reply}");
}

#[tokio::test]
async fn affirmative_with_a_negation_still_confirms() {
    let (manager, engine) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "2 margherita pizza").await;
    let order_id = session.pending_order_id.expect("pending order");

    let reply = manager.handle_turn(&mut session, "yes, no problem").await;

    assert!(reply.contains("has been confirmed"), "{reply}");
    let order = engine.order(order_id).await.expect("read").expect("order row");
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn bare_number_answers_the_missing_time_without_touching_party_size() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "book a table for 4 people tomorrow").await;

    let reply = manager.handle_turn(&mut session, "8").await;

    assert!(reply.contains("for 4 people"), "{reply}");
    assert!(reply.contains("08:00"), "{reply}");
    assert_eq!(session.state(), ConversationState::AwaitingReservationConfirmation);
    let pending = session.pending_reservation.clone().expect("pending slots");
    assert_eq!(pending.party_size, Some(4));
    assert_eq!(pending.date, NaiveDate::from_ymd_opt(2026, 6, 11));
    assert_eq!(pending.time, NaiveTime::from_hms_opt(8, 0, 0));
}

#[tokio::test]
async fn evening_hour_answer_keeps_the_other_slots() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;
    manager.handle_turn(&mut session, "book a table for 2 people tomorrow").await;

    let reply = manager.handle_turn(&mut session, "9pm").await;

    assert!(reply.contains("for 2 people"), "{reply}");
    assert!(reply.contains("21:00"), "{reply}");
    let pending = session.pending_reservation.clone().expect("pending slots");
    assert_eq!(pending.party_size, Some(2));
    assert_eq!(pending.date, NaiveDate::from_ymd_opt(2026, 6, 11));
}

#[tokio::test]
async fn bare_number_fills_party_size_when_time_is_known() {
    let (manager, _) = setup().await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "book a table tomorrow at 7pm").await;
    assert!(reply.contains("provide the party size?"), "{reply}");

    let reply = manager.handle_turn(&mut session, "3").await;

    assert!(reply.contains("for 3 people"), "{reply}");
    let pending = session.pending_reservation.clone().expect("pending slots");
    assert_eq!(pending.time, NaiveTime::from_hms_opt(19, 0, 0));
    assert_eq!(pending.party_size, Some(3));
}

#[tokio::test]
async fn empty_catalog_asks_plainly_what_to_order() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let engine = Arc::new(SqlBookingEngine::new(pool.clone()));
    let manager = manager_with(&pool, engine, Arc::new(DisabledLlm)).await;
    let mut session = ready_session(&manager, "s-1", "Dana", "555-123-4567").await;

    let reply = manager.handle_turn(&mut session, "I'd like to order").await;

    assert!(reply.ends_with("What would you like to order?"), "{reply}");
    assert!(!reply.contains("For example"), "{reply}");
}
