use chrono::{NaiveDate, NaiveTime};

use bistro_core::domain::reservation::{NewReservation, ReservationTable};
use bistro_core::errors::BookingError;

use super::{is_abort, DialogueManager, TurnResult};
use crate::intent::Intent;
use crate::session::{ConversationState, Session};
use crate::slots::{ReservationSlots, SlotName};

impl DialogueManager {
    pub(super) async fn start_reservation(
        &self,
        session: &mut Session,
        utterance: &str,
        prefix: &str,
    ) -> TurnResult {
        session.offered_table = None;
        let slots = self.read_slots(utterance);
        session.pending_reservation.get_or_insert_with(ReservationSlots::default).merge(slots);
        self.advance_reservation(session, prefix).await
    }

    pub(super) async fn on_reservation_details(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> TurnResult {
        let slots = self.read_followup(session, utterance);
        if slots.is_empty() && is_abort(utterance) {
            session.clear_pending_reservation();
            session.set_state(ConversationState::Ready);
            return Ok("No problem, I've dropped that reservation request. Anything else I can help \
with?"
                .to_string());
        }
        session.pending_reservation.get_or_insert_with(ReservationSlots::default).merge(slots);
        self.advance_reservation(session, "").await
    }

    pub(super) async fn on_reservation_confirmation(
        &self,
        session: &mut Session,
        utterance: &str,
        intent: Intent,
    ) -> TurnResult {
        match intent {
            Intent::ConfirmReservation => self.commit_reservation(session).await,
            Intent::CancelReservation => {
                session.clear_pending_reservation();
                session.set_state(ConversationState::Ready);
                Ok("Okay, I won't book that table. Is there anything else I can help you with?"
                    .to_string())
            }
            _ => {
                let slots = self.read_followup(session, utterance);
                if slots.is_empty() {
                    return Ok(confirmation_prompt().to_string());
                }
                session.offered_table = None;
                session
                    .pending_reservation
                    .get_or_insert_with(ReservationSlots::default)
                    .merge(slots);
                self.advance_reservation(session, "Let me check that instead. ").await
            }
        }
    }

    fn read_slots(&self, utterance: &str) -> ReservationSlots {
        ReservationSlots::extract(utterance, self.clock.today(), self.settings.party_size)
    }

    /// Reads an answer given while a reservation request is already open.
    fn read_followup(&self, session: &Session, utterance: &str) -> ReservationSlots {
        let known = session.pending_reservation.clone().unwrap_or_default();
        ReservationSlots::extract_followup(
            utterance,
            self.clock.today(),
            self.settings.party_size,
            &known,
        )
    }

    /// Asks for whatever is still missing, or looks up a table once the
    /// request is complete.
    async fn advance_reservation(&self, session: &mut Session, prefix: &str) -> TurnResult {
        let slots = session.pending_reservation.clone().unwrap_or_default();

        let Some((date, time, party_size)) = slots.complete() else {
            session.set_state(ConversationState::AwaitingReservationDetails);
            return Ok(format!(
                "{prefix}I'd be happy to book a table. Could you please provide the {}?",
                describe_missing(&slots.missing())
            ));
        };

        if date == self.clock.today() && time <= self.clock.time_of_day() {
            if let Some(pending) = session.pending_reservation.as_mut() {
                pending.time = None;
            }
            session.set_state(ConversationState::AwaitingReservationDetails);
            return Ok(format!(
                "{prefix}{} has already passed today. What time would you like instead?",
                time.format("%H:%M")
            ));
        }

        let tables = self.booking.find_available_tables(party_size, date, time).await?;
        let Some(table) = tables.into_iter().next() else {
            session.clear_pending_reservation();
            session.set_state(ConversationState::Ready);
            return Ok(format!(
                "{prefix}Sorry, we don't have a table for {party_size} on {} at {}. Would you like \
to try a different date or time?",
                format_date(date),
                format_time(time)
            ));
        };

        let reply = format!(
            "{prefix}I found a table ({}, capacity {}) for {party_size} {} on {} at {}. \
Would you like to confirm this reservation?",
            table.table_number,
            table.capacity,
            people(party_size),
            format_date(date),
            format_time(time)
        );
        session.offered_table = Some(table);
        session.set_state(ConversationState::AwaitingReservationConfirmation);
        Ok(reply)
    }

    async fn commit_reservation(&self, session: &mut Session) -> TurnResult {
        let customer_id = self.customer_id(session)?;
        let slots = session.pending_reservation.clone().unwrap_or_default();
        let (Some((date, time, party_size)), Some(table)) =
            (slots.complete(), session.offered_table.clone())
        else {
            session.clear_pending_reservation();
            session.set_state(ConversationState::Ready);
            return Ok("There's no reservation waiting for confirmation. Would you like to book a \
table?"
                .to_string());
        };

        let request = NewReservation { customer_id, table_id: table.id, date, time, party_size };
        match self.booking.create_reservation(request).await {
            Ok(reservation_id) => {
                tracing::info!(
                    session_id = %session.id,
                    reservation_id = %reservation_id,
                    table = %table.table_number,
                    "reservation confirmed"
                );
                session.clear_pending_reservation();
                session.set_state(ConversationState::Ready);
                Ok(format!(
                    "Your reservation #{reservation_id} is confirmed: {} for {party_size} {} on \
{} at {}. We look forward to seeing you, {}!",
                    table.table_number,
                    people(party_size),
                    format_date(date),
                    format_time(time),
                    self.display_name(session)
                ))
            }
            Err(BookingError::SlotTaken { .. }) => Ok(self.slot_taken(session, &table, date, time)),
            Err(error) => Err(error),
        }
    }

    /// Someone else booked the offered table first. The request is dropped
    /// rather than retried.
    fn slot_taken(
        &self,
        session: &mut Session,
        table: &ReservationTable,
        date: NaiveDate,
        time: NaiveTime,
    ) -> String {
        tracing::warn!(
            event_name = "booking.reservation.conflict",
            session_id = %session.id,
            table = %table.table_number,
            date = %date,
            time = %time.format("%H:%M"),
            "reservation lost a race for its slot"
        );
        session.clear_pending_reservation();
        session.set_state(ConversationState::Ready);
        format!(
            "Sorry, {} was just booked by another guest for {} at {}. Please ask to book \
again and I'll look for another table or time.",
            table.table_number,
            format_date(date),
            format_time(time)
        )
    }
}

fn describe_missing(missing: &[SlotName]) -> String {
    let labels: Vec<&str> = missing.iter().map(|slot| slot.label()).collect();
    match labels.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

fn people(party_size: u32) -> &'static str {
    if party_size == 1 {
        "person"
    } else {
        "people"
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn confirmation_prompt() -> &'static str {
    "Would you like to confirm this reservation? Reply 'yes' to book it or 'no' to cancel."
}
