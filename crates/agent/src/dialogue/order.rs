use rust_decimal::Decimal;

use bistro_core::domain::order::{NewOrderLine, OrderId, OrderLine, OrderStatus};
use bistro_core::errors::BookingError;

use super::{is_abort, DialogueManager, TurnResult};
use crate::intent::Intent;
use crate::session::{ConversationState, PendingLine, Session};
use crate::slots::{extract_order_items, OrderItemMatch};

impl DialogueManager {
    /// Entry point for `place_order`. `resumed` marks a task parked during
    /// contact collection, which moves to AWAITING_ORDER_DETAILS when no item
    /// is recognized; a fresh request leaves the state unchanged.
    pub(super) async fn start_order(
        &self,
        session: &mut Session,
        utterance: &str,
        prefix: &str,
        resumed: bool,
    ) -> TurnResult {
        let items = extract_order_items(utterance, &self.menu);
        if items.is_empty() {
            if resumed {
                session.set_state(ConversationState::AwaitingOrderDetails);
            }
            return Ok(format!("{prefix}{}", self.order_clarification()));
        }
        self.add_items(session, items, prefix).await
    }

    pub(super) async fn on_order_details(&self, session: &mut Session, utterance: &str) -> TurnResult {
        let items = extract_order_items(utterance, &self.menu);
        if !items.is_empty() {
            return self.add_items(session, items, "").await;
        }
        if is_abort(utterance) {
            session.clear_pending_order();
            session.set_state(ConversationState::Ready);
            return Ok("No problem, I've stopped the order. Anything else I can help with?"
                .to_string());
        }
        Ok(format!("{} (Say 'cancel' to stop.)", self.order_clarification()))
    }

    pub(super) async fn on_order_confirmation(
        &self,
        session: &mut Session,
        utterance: &str,
        intent: Intent,
    ) -> TurnResult {
        match intent {
            Intent::ConfirmOrder => self.confirm_order(session).await,
            Intent::CancelOrder => self.cancel_pending_order(session).await,
            Intent::PlaceOrder => {
                let items = extract_order_items(utterance, &self.menu);
                if items.is_empty() {
                    return Ok(format!(
                        "I couldn't find those items on our menu. {}",
                        confirmation_prompt()
                    ));
                }
                self.add_items(session, items, "").await
            }
            _ => Ok(confirmation_prompt().to_string()),
        }
    }

    /// Opens the order on first use, writes the lines as one batch, and shows
    /// the running summary. An order opened by this call is cancelled if the
    /// batch fails.
    async fn add_items(
        &self,
        session: &mut Session,
        items: Vec<OrderItemMatch>,
        prefix: &str,
    ) -> TurnResult {
        let customer_id = self.customer_id(session)?;
        let opened_here = session.pending_order_id.is_none();
        let order_id = match session.pending_order_id {
            Some(order_id) => order_id,
            None => self.booking.open_order(customer_id).await?,
        };
        session.pending_order_id = Some(order_id);

        let batch: Vec<NewOrderLine> = items
            .iter()
            .map(|found| NewOrderLine {
                menu_item_id: found.item.id,
                quantity: found.quantity,
                price_snapshot: found.item.price,
            })
            .collect();
        if let Err(error) = self.booking.add_order_lines(order_id, &batch).await {
            if opened_here {
                self.abandon_order(session, order_id).await;
            }
            return Err(error);
        }
        for found in &items {
            remember_line(session, found);
        }

        let lines = self.booking.order_lines(order_id).await?;
        let order = self
            .booking
            .order(order_id)
            .await?
            .ok_or(BookingError::NotFound { entity: "order", id: order_id.0 })?;

        tracing::debug!(
            session_id = %session.id,
            order_id = %order_id,
            lines = lines.len(),
            total = %order.total_amount,
            "order lines updated"
        );

        session.set_state(ConversationState::AwaitingOrderConfirmation);
        Ok(format!(
            "{prefix}Here's your order so far:\n{}\nTotal: ${:.2}\n{}",
            render_lines(&lines),
            order.total_amount,
            confirmation_prompt()
        ))
    }

    async fn confirm_order(&self, session: &mut Session) -> TurnResult {
        let Some(order_id) = session.pending_order_id else {
            session.clear_pending_order();
            session.set_state(ConversationState::Ready);
            return Ok("There's no pending order to confirm.".to_string());
        };

        let order = self.booking.set_order_status(order_id, OrderStatus::Confirmed).await?;
        tracing::info!(
            session_id = %session.id,
            order_id = %order.id,
            total = %order.total_amount,
            "order confirmed"
        );

        let notice = match (&session.customer_phone, &session.customer_email) {
            (Some(phone), Some(email)) => {
                format!(" We'll send updates by SMS to {phone} and by email to {email}.")
            }
            (Some(phone), None) => format!(" We'll send updates by SMS to {phone}."),
            (None, Some(email)) => format!(" We'll send updates by email to {email}."),
            (None, None) => String::new(),
        };
        let greeting = if session.has_name(&self.settings.guest_name) {
            format!("Great {}!", self.display_name(session))
        } else {
            "Great!".to_string()
        };

        session.clear_pending_order();
        session.set_state(ConversationState::Ready);
        Ok(format!(
            "{greeting} Your order #{} has been confirmed for a total of ${:.2}.{notice}",
            order.id, order.total_amount
        ))
    }

    async fn cancel_pending_order(&self, session: &mut Session) -> TurnResult {
        if let Some(order_id) = session.pending_order_id {
            self.abandon_order(session, order_id).await;
        }
        session.clear_pending_order();
        session.set_state(ConversationState::Ready);
        Ok("Your order has been cancelled. Is there anything else I can help you with?"
            .to_string())
    }

    /// Best-effort cancellation of a pending order row.
    async fn abandon_order(&self, session: &Session, order_id: OrderId) {
        if let Err(error) = self.booking.cancel_order(order_id).await {
            tracing::warn!(
                session_id = %session.id,
                order_id = %order_id,
                error = %error,
                "failed to cancel abandoned order"
            );
        }
    }

    fn order_clarification(&self) -> String {
        if self.menu.is_empty() {
            return "What would you like to order?".to_string();
        }
        let examples: Vec<&str> = self.menu.items().take(3).map(|item| item.name.as_str()).collect();
        format!(
            "I couldn't find any menu items in that. What would you like to order? For example: \
{}.",
            examples.join(", ")
        )
    }
}

fn remember_line(session: &mut Session, found: &OrderItemMatch) {
    match session.pending_order_lines.iter_mut().find(|line| line.menu_item_id == found.item.id) {
        Some(line) => line.quantity += found.quantity,
        None => session
            .pending_order_lines
            .push(PendingLine { menu_item_id: found.item.id, quantity: found.quantity }),
    }
}

fn render_lines(lines: &[OrderLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let line_total: Decimal = line.line_total();
            format!("- {}x {} (${:.2})", line.quantity, line.item_name, line_total)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn confirmation_prompt() -> &'static str {
    "Would you like to confirm this order? Reply 'yes' to confirm or 'no' to cancel."
}
