use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Data domain recognised from a payload's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Email,
    Transaction,
    Contact,
    Event,
    Unknown,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Domain::Email => "email",
            Domain::Transaction => "transaction",
            Domain::Contact => "contact",
            Domain::Event => "event",
            Domain::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Provenance stamped on every unified record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub plugin: String,
    pub original_id: Option<String>,
    pub normalized_at: String,
}

/// Inputs shared by every per-domain normalizer for one call.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub plugin: String,
    pub normalized_at: DateTime<Utc>,
}

impl NormalizeContext {
    pub fn new(plugin: impl Into<String>, normalized_at: DateTime<Utc>) -> Self {
        Self {
            plugin: plugin.into(),
            normalized_at,
        }
    }

    pub fn source(&self, original_id: Option<String>) -> SourceInfo {
        SourceInfo {
            plugin: self.plugin.clone(),
            original_id,
            normalized_at: self
                .normalized_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEmail {
    pub id: Option<String>,
    pub thread_id: Option<String>,
    pub subject: String,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub date: Option<String>,
    pub body: String,
    pub body_html: Option<String>,
    pub snippet: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub labels: Vec<String>,
    pub attachments: Vec<Attachment>,
    #[serde(rename = "_source")]
    pub source: SourceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedTransaction {
    pub id: Option<String>,
    /// Major currency units, always non-negative; see `direction`.
    pub amount: f64,
    pub currency: String,
    pub direction: TransactionDirection,
    pub date: Option<String>,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "_source")]
    pub source: SourceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedContact {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "_source")]
    pub source: SourceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email: String,
    pub name: Option<String>,
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEvent {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub timezone: Option<String>,
    pub all_day: bool,
    pub location: Option<String>,
    pub attendees: Vec<EventAttendee>,
    pub organizer: Option<String>,
    pub link: Option<String>,
    #[serde(rename = "_source")]
    pub source: SourceInfo,
}

/// Output of the dispatcher. Serializes as the bare record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedRecord {
    Email(UnifiedEmail),
    Transaction(UnifiedTransaction),
    Contact(UnifiedContact),
    Event(UnifiedEvent),
    Unknown(Value),
    Collection(Vec<NormalizedRecord>),
}

impl NormalizedRecord {
    pub fn domain(&self) -> Domain {
        match self {
            NormalizedRecord::Email(_) => Domain::Email,
            NormalizedRecord::Transaction(_) => Domain::Transaction,
            NormalizedRecord::Contact(_) => Domain::Contact,
            NormalizedRecord::Event(_) => Domain::Event,
            NormalizedRecord::Unknown(_) => Domain::Unknown,
            NormalizedRecord::Collection(items) => {
                items.first().map(NormalizedRecord::domain).unwrap_or(Domain::Unknown)
            }
        }
    }

    pub fn as_email(&self) -> Option<&UnifiedEmail> {
        match self {
            NormalizedRecord::Email(email) => Some(email),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&UnifiedTransaction> {
        match self {
            NormalizedRecord::Transaction(transaction) => Some(transaction),
            _ => None,
        }
    }

    pub fn as_contact(&self) -> Option<&UnifiedContact> {
        match self {
            NormalizedRecord::Contact(contact) => Some(contact),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&UnifiedEvent> {
        match self {
            NormalizedRecord::Event(event) => Some(event),
            _ => None,
        }
    }
}
