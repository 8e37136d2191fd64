use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Contact columns that carry a uniqueness constraint across customers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Phone,
    Email,
}

impl ContactField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial customer update. `Some(None)` clears a contact column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
}

impl CustomerUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn phone(phone: Option<String>) -> Self {
        Self { phone: Some(phone), ..Self::default() }
    }

    pub fn email(email: Option<String>) -> Self {
        Self { email: Some(email), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none()
    }

    pub fn apply_to(&self, customer: &mut Customer) {
        if let Some(name) = &self.name {
            customer.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            customer.phone = phone.clone();
        }
        if let Some(email) = &self.email {
            customer.email = email.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Customer, CustomerId, CustomerUpdate};

    fn customer() -> Customer {
        Customer {
            id: CustomerId(1),
            name: "Ana".to_string(),
            phone: Some("5551234567".to_string()),
            email: Some("ana@example.com".to_string()),
        }
    }

    #[test]
    fn apply_clears_only_named_fields() {
        let mut target = customer();
        CustomerUpdate::phone(None).apply_to(&mut target);

        assert_eq!(target.phone, None);
        assert_eq!(target.email.as_deref(), Some("ana@example.com"));
        assert_eq!(target.name, "Ana");
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(CustomerUpdate::default().is_empty());
        assert!(!CustomerUpdate::name("Ben").is_empty());
    }
}
