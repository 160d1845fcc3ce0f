//! Contacts eligible to receive mail.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{is_valid_email, Address, ToAddress};
use crate::error::RecipientError;
use crate::template::Variables;

/// Why a contact is on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Donor,
    Volunteer,
    Subscriber,
    EventAttendee,
}

/// Subscription status.
///
/// `Active -> Unsubscribed` happens through a delivery event or an explicit
/// (soft) delete; `Active -> Bounced` only through explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Unsubscribed,
    Bounced,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
        }
    }
}

/// Known optional contact fields, plus free-form entries from imports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_type: Option<String>,
    /// Lifetime giving, in the organization's currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_given: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    /// Always passes [`is_valid_email`]; lookups match it exactly.
    pub email: String,
    pub name: String,
    pub category: Category,
    pub status: Status,
    pub metadata: RecipientMetadata,
    pub tags: BTreeSet<String>,
    /// Cumulative open events.
    pub open_count: u32,
    pub last_opened: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    /// Create an active recipient, rejecting syntactically invalid emails.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        category: Category,
    ) -> Result<Self, RecipientError> {
        let email = email.into().trim().to_string();
        if !is_valid_email(&email) {
            return Err(RecipientError::InvalidEmail(email));
        }

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: name.into(),
            category,
            status: Status::Active,
            metadata: RecipientMetadata::default(),
            tags: BTreeSet::new(),
            open_count: 0,
            last_opened: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_metadata(mut self, metadata: RecipientMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Count an open at `at`. The last-opened time only moves forward.
    pub fn record_open(&mut self, at: DateTime<Utc>) {
        self.open_count = self.open_count.saturating_add(1);
        self.last_opened = Some(self.last_opened.map_or(at, |prev| prev.max(at)));
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Default template variables for this contact.
    ///
    /// `NAME`, `DONOR_NAME`, `FIRST_NAME`, `EMAIL`, `COMPANY` when known, and
    /// every free-form metadata entry under its upper-cased key.
    pub fn personalization(&self) -> Variables {
        let mut vars = Variables::new();
        for (key, value) in &self.metadata.extra {
            vars.insert(key.to_uppercase(), value.clone());
        }

        let first_name = self.name.split_whitespace().next().unwrap_or_default();
        vars.insert("NAME".into(), self.name.clone());
        vars.insert("DONOR_NAME".into(), self.name.clone());
        vars.insert("FIRST_NAME".into(), first_name.to_string());
        vars.insert("EMAIL".into(), self.email.clone());
        if let Some(company) = &self.metadata.company {
            vars.insert("COMPANY".into(), company.clone());
        }
        vars
    }
}

impl ToAddress for Recipient {
    fn to_address(&self) -> Address {
        Address::with_name(&self.name, &self.email)
    }
}

/// One row of a contact import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipient {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub metadata: RecipientMetadata,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NewRecipient {
    pub fn into_recipient(self) -> Result<Recipient, RecipientError> {
        let mut recipient = Recipient::new(self.email, self.name, self.category)?;
        recipient.metadata = self.metadata;
        recipient.tags = self.tags;
        Ok(recipient)
    }
}
