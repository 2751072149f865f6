//! Structural adapters from provider payloads to unified domain records.
//!
//! The domain is always detected from the payload's shape. The plugin label a
//! caller passes is only recorded as provenance in `_source.plugin`.

use chrono::{DateTime, Utc};
use serde_json::Value;

pub mod contact;
pub mod email;
pub mod event;
pub mod fields;
pub mod transaction;
pub mod types;

pub use contact::ContactNormalizer;
pub use email::EmailNormalizer;
pub use event::EventNormalizer;
pub use transaction::TransactionNormalizer;
pub use types::*;

use fields::{at, has_any};

/// One per domain. Implementations re-detect the provider shape and always
/// produce a record, falling back to a generic mapping.
pub trait RecordNormalizer {
    fn domain(&self) -> Domain;
    fn normalize(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord;
}

const SUBJECT_KEYS: &[&str] = &["subject", "Subject"];
const SENDER_KEYS: &[&str] = &["from", "From", "sender", "Sender", "from_email", "fromAddress"];
const AMOUNT_KEYS: &[&str] = &["amount", "total", "amount_total", "Amount"];
const CURRENCY_KEYS: &[&str] = &["currency", "iso_currency_code", "currency_code", "Currency", "currencyCode"];
const CONTACT_EMAIL_KEYS: &[&str] = &["email", "Email", "emailAddress", "emailAddresses", "email_address"];
const NAME_KEYS: &[&str] = &[
    "name", "Name", "first_name", "firstName", "FirstName", "last_name", "lastName", "LastName",
    "full_name", "fullName", "displayName", "names", "given_name", "family_name",
];

/// Classify `raw` by shape. Arrays are classified by their first element and
/// `{data: ...}` envelopes by their contents.
pub fn detect_domain(raw: &Value) -> Domain {
    match raw {
        Value::Array(items) => items.first().map(detect_domain).unwrap_or(Domain::Unknown),
        Value::Object(_) => {
            if looks_like_email(raw) {
                Domain::Email
            } else if has_any(raw, AMOUNT_KEYS) && has_any(raw, CURRENCY_KEYS) {
                Domain::Transaction
            } else if has_any(raw, CONTACT_EMAIL_KEYS) && has_any(raw, NAME_KEYS) {
                Domain::Contact
            } else if looks_like_event(raw) {
                Domain::Event
            } else if let Some(inner) = envelope_contents(raw) {
                detect_domain(inner)
            } else {
                Domain::Unknown
            }
        }
        _ => Domain::Unknown,
    }
}

fn looks_like_email(raw: &Value) -> bool {
    if has_any(raw, SUBJECT_KEYS) && has_any(raw, SENDER_KEYS) {
        return true;
    }
    let gmail = raw.get("payload").is_some_and(Value::is_object)
        && (raw.get("labelIds").is_some() || at(raw, &["payload", "headers"]).is_some());
    let outlook = raw.get("receivedDateTime").is_some() && has_any(raw, SENDER_KEYS);
    gmail || outlook
}

fn looks_like_event(raw: &Value) -> bool {
    let start_object = raw
        .get("start")
        .is_some_and(|start| start.get("dateTime").is_some() || start.get("date").is_some());
    start_object
        || (has_any(raw, &["start", "start_time", "startTime"])
            && has_any(raw, &["end", "end_time", "endTime"]))
}

/// Contents of a generic `{data: ...}` wrapper.
fn envelope_contents(raw: &Value) -> Option<&Value> {
    let data = raw.get("data")?;
    (data.is_object() || data.is_array()).then_some(data)
}

/// Dispatches payloads to the per-domain normalizers.
pub struct DataNormalizer {
    normalizers: Vec<Box<dyn RecordNormalizer>>,
}

impl DataNormalizer {
    pub fn new() -> Self {
        Self {
            normalizers: vec![
                Box::new(EmailNormalizer),
                Box::new(TransactionNormalizer),
                Box::new(ContactNormalizer),
                Box::new(EventNormalizer),
            ],
        }
    }

    pub fn normalize(&self, raw: &Value, plugin: &str) -> NormalizedRecord {
        self.normalize_at(raw, plugin, Utc::now())
    }

    /// Like [`DataNormalizer::normalize`] with an explicit `normalizedAt`.
    pub fn normalize_at(&self, raw: &Value, plugin: &str, now: DateTime<Utc>) -> NormalizedRecord {
        let context = NormalizeContext::new(plugin, now);
        self.normalize_with(raw, &context)
    }

    pub fn normalize_array(&self, items: &[Value], plugin: &str) -> Vec<NormalizedRecord> {
        let context = NormalizeContext::new(plugin, Utc::now());
        items.iter().map(|item| self.normalize_with(item, &context)).collect()
    }

    fn normalize_with(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord {
        match raw {
            Value::Array(items) => {
                let domain = detect_domain(raw);
                NormalizedRecord::Collection(
                    items
                        .iter()
                        .map(|item| self.normalize_in_domain(item, domain, context))
                        .collect(),
                )
            }
            Value::Object(_) => {
                let domain = detect_domain(raw);
                if domain != Domain::Unknown && !self.is_direct_match(raw) {
                    if let Some(inner) = envelope_contents(raw) {
                        return self.normalize_with(inner, context);
                    }
                }
                self.normalize_in_domain(raw, domain, context)
            }
            _ => self.normalize_in_domain(raw, Domain::Unknown, context),
        }
    }

    /// True when the object itself, not a `data` wrapper, carries the shape.
    fn is_direct_match(&self, raw: &Value) -> bool {
        match raw.as_object() {
            Some(map) if map.contains_key("data") => {
                let mut without = map.clone();
                without.remove("data");
                detect_domain(&Value::Object(without)) != Domain::Unknown
            }
            _ => true,
        }
    }

    fn normalize_in_domain(&self, raw: &Value, domain: Domain, context: &NormalizeContext) -> NormalizedRecord {
        let normalizer = raw
            .is_object()
            .then(|| self.normalizers.iter().find(|n| n.domain() == domain))
            .flatten();
        match normalizer {
            Some(normalizer) => normalizer.normalize(raw, context),
            None => {
                tracing::warn!(
                    plugin = %context.plugin,
                    "payload shape not recognised, returning it unchanged"
                );
                NormalizedRecord::Unknown(raw.clone())
            }
        }
    }
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalize(raw: &Value, plugin: &str) -> NormalizedRecord {
    DataNormalizer::new().normalize(raw, plugin)
}

pub fn normalize_array(items: &[Value], plugin: &str) -> Vec<NormalizedRecord> {
    DataNormalizer::new().normalize_array(items, plugin)
}

/// True when `value` already carries `_source.normalizedAt`.
pub fn is_normalized(value: &Value) -> bool {
    at(value, &["_source", "normalizedAt"]).is_some_and(|stamp| !stamp.is_null())
}
