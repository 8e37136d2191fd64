use bistro_core::domain::customer::{ContactField, CustomerUpdate};
use bistro_core::errors::BookingError;

use super::{DialogueManager, TurnResult};
use crate::intent::Intent;
use crate::session::{ConversationState, Session};
use crate::validators::{extract_name, is_refusal, validate_email, validate_phone};

const MAX_NAME_WORDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ContactGap {
    Name,
    Phone,
    Email,
}

impl DialogueManager {
    /// First contact field that is neither known nor declined.
    pub(super) fn next_contact_gap(&self, session: &Session) -> Option<ContactGap> {
        if !session.has_name(&self.settings.guest_name) && !session.refusals.name {
            Some(ContactGap::Name)
        } else if !session.has_phone() && !session.refusals.phone {
            Some(ContactGap::Phone)
        } else if session.customer_email.is_none() && !session.refusals.email {
            Some(ContactGap::Email)
        } else {
            None
        }
    }

    /// Asks for the next missing contact field, or moves to READY and resumes
    /// any parked task.
    pub(super) async fn advance_contacts(&self, session: &mut Session, prefix: &str) -> TurnResult {
        match self.next_contact_gap(session) {
            Some(ContactGap::Name) => {
                session.set_state(ConversationState::AwaitingName);
                Ok(format!("{prefix}May I have your name, please?"))
            }
            Some(ContactGap::Phone) => {
                session.set_state(ConversationState::AwaitingPhone);
                Ok(format!(
                    "{prefix}Could you share a phone number we can reach you on? (You can say \
'skip'.)"
                ))
            }
            Some(ContactGap::Email) => {
                session.set_state(ConversationState::AwaitingEmail);
                Ok(format!(
                    "{prefix}Would you like to add an email address for confirmations? This is \
optional, just say 'skip'."
                ))
            }
            None => self.resume_deferred(session, prefix).await,
        }
    }

    pub(super) async fn on_awaiting_name(
        &self,
        session: &mut Session,
        utterance: &str,
        intent: Intent,
    ) -> TurnResult {
        if is_refusal(utterance) {
            session.refusals.name = true;
            return self.advance_contacts(session, "No problem, we'll keep it informal. ").await;
        }

        if !matches!(intent, Intent::ProvideName | Intent::GeneralQuery | Intent::Greet) {
            return Ok("Before we go on, could you tell me your name? (You can say 'skip'.)"
                .to_string());
        }

        match extract_name(utterance)
            .filter(|name| name.split_whitespace().count() <= MAX_NAME_WORDS)
        {
            Some(name) => {
                self.save_name(session, &name).await?;
                self.advance_contacts(session, &format!("Nice to meet you, {name}! ")).await
            }
            None => Ok("That doesn't look like a name. Please tell me your name (at least two \
letters), or say 'skip'."
                .to_string()),
        }
    }

    pub(super) async fn on_awaiting_phone(&self, session: &mut Session, utterance: &str) -> TurnResult {
        if let Some(phone) = validate_phone(utterance) {
            return match self.save_phone(session, &phone).await? {
                PhoneOutcome::Saved => self.advance_contacts(session, "Thanks! ").await,
                PhoneOutcome::Returning(name) => {
                    self.advance_contacts(session, &format!("Welcome back, {name}! ")).await
                }
                PhoneOutcome::Taken => Ok(taken_message(ContactField::Phone)),
            };
        }

        if is_refusal(utterance) {
            session.refusals.phone = true;
            if session.has_phone() {
                self.clear_contact(session, ContactField::Phone).await?;
            }
            let prefix = if session.deferred.take().is_some() {
                "Understood. Without a phone number I can't take orders or book tables, but I can \
still help with anything else. "
            } else {
                "No problem. "
            };
            return self.advance_contacts(session, prefix).await;
        }

        Ok("That doesn't look like a valid phone number. Please enter 10 to 15 digits, for \
example 555-123-4567, or say 'skip'."
            .to_string())
    }

    pub(super) async fn on_awaiting_email(&self, session: &mut Session, utterance: &str) -> TurnResult {
        if let Some(email) = validate_email(utterance) {
            return match self.save_email(session, &email).await? {
                true => self.advance_contacts(session, "Thanks, your email is saved. ").await,
                false => Ok(taken_message(ContactField::Email)),
            };
        }

        if is_refusal(utterance) {
            session.refusals.email = true;
            if session.customer_email.is_some() {
                self.clear_contact(session, ContactField::Email).await?;
            }
            return self.advance_contacts(session, "No problem. ").await;
        }

        Ok("That doesn't look like a valid email address. Please enter something like \
name@example.com, or say 'skip'."
            .to_string())
    }

    pub(super) async fn update_name_from_ready(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> TurnResult {
        match extract_name(utterance) {
            Some(name) => {
                self.save_name(session, &name).await?;
                Ok(format!("Thanks, {name}! I've updated your name."))
            }
            None => Ok("I didn't catch your name. Could you say it again?".to_string()),
        }
    }

    pub(super) async fn update_phone_from_ready(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> TurnResult {
        let Some(phone) = validate_phone(utterance) else {
            return Ok("That doesn't look like a valid phone number.".to_string());
        };
        match self.save_phone(session, &phone).await? {
            PhoneOutcome::Saved => Ok(format!("Thanks! I've saved {phone} as your phone number.")),
            PhoneOutcome::Returning(name) => {
                Ok(format!("Welcome back, {name}! I've found your details."))
            }
            PhoneOutcome::Taken => Ok(taken_message(ContactField::Phone)),
        }
    }

    pub(super) async fn update_email_from_ready(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> TurnResult {
        let Some(email) = validate_email(utterance) else {
            return Ok("That doesn't look like a valid email address.".to_string());
        };
        if self.save_email(session, &email).await? {
            Ok(format!("Thanks! I've saved {email} as your email address."))
        } else {
            Ok(taken_message(ContactField::Email))
        }
    }

    pub(super) async fn save_name(&self, session: &mut Session, name: &str) -> Result<(), BookingError> {
        let customer_id = self.customer_id(session)?;
        let customer =
            self.booking.update_customer(customer_id, CustomerUpdate::name(name)).await?;
        session.cache_customer(&customer);
        session.refusals.name = false;
        Ok(())
    }

    /// Stores the phone on the session's customer. A phone already held by a
    /// customer with the same name adopts that customer instead.
    async fn save_phone(&self, session: &mut Session, phone: &str) -> Result<PhoneOutcome, BookingError> {
        let customer_id = self.customer_id(session)?;
        match self
            .booking
            .update_customer(customer_id, CustomerUpdate::phone(Some(phone.to_string())))
            .await
        {
            Ok(customer) => {
                session.cache_customer(&customer);
                session.refusals.phone = false;
                Ok(PhoneOutcome::Saved)
            }
            Err(BookingError::DuplicateContact { .. }) => self.adopt_returning(session, phone).await,
            Err(error) => Err(error),
        }
    }

    async fn adopt_returning(&self, session: &mut Session, phone: &str) -> Result<PhoneOutcome, BookingError> {
        if !session.has_name(&self.settings.guest_name) {
            return Ok(PhoneOutcome::Taken);
        }
        let name = session.customer_name.clone().unwrap_or_default();

        let existing = match self.booking.ensure_customer(&name, Some(phone), None).await {
            Ok(id) => id,
            Err(BookingError::DuplicateContact { .. }) => return Ok(PhoneOutcome::Taken),
            Err(error) => return Err(error),
        };
        let Some(customer) = self.booking.customer(existing).await? else {
            return Ok(PhoneOutcome::Taken);
        };
        if customer.phone.as_deref() != Some(phone) {
            return Ok(PhoneOutcome::Taken);
        }

        tracing::info!(
            session_id = %session.id,
            customer_id = %customer.id,
            "returning customer recognized by phone"
        );
        session.cache_customer(&customer);
        session.refusals.phone = false;
        Ok(PhoneOutcome::Returning(customer.name))
    }

    /// Returns `false` when the address belongs to another customer.
    async fn save_email(&self, session: &mut Session, email: &str) -> Result<bool, BookingError> {
        let customer_id = self.customer_id(session)?;
        match self
            .booking
            .update_customer(customer_id, CustomerUpdate::email(Some(email.to_string())))
            .await
        {
            Ok(customer) => {
                session.cache_customer(&customer);
                session.refusals.email = false;
                Ok(true)
            }
            Err(BookingError::DuplicateContact { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn clear_contact(&self, session: &mut Session, field: ContactField) -> Result<(), BookingError> {
        let customer_id = self.customer_id(session)?;
        let update = match field {
            ContactField::Phone => CustomerUpdate::phone(None),
            ContactField::Email => CustomerUpdate::email(None),
        };
        let customer = self.booking.update_customer(customer_id, update).await?;
        session.cache_customer(&customer);
        Ok(())
    }
}

enum PhoneOutcome {
    Saved,
    Returning(String),
    Taken,
}

fn taken_message(field: ContactField) -> String {
    let label = match field {
        ContactField::Phone => "phone number",
        ContactField::Email => "email address",
    };
    format!(
        "Sorry, that {label} is already registered to another customer. Could you give a \
different one, or say 'skip'?"
    )
}
