use super::fields::{at, first_str, str_at};
use super::types::{Domain, NormalizeContext, NormalizedRecord, UnifiedContact};
use super::RecordNormalizer;
use serde_json::Value;

/// Google People, Salesforce and generic address-book rows.
pub struct ContactNormalizer;

impl RecordNormalizer for ContactNormalizer {
    fn domain(&self) -> Domain {
        Domain::Contact
    }

    fn normalize(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord {
        let mut contact = if is_google_people(raw) {
            from_google_people(raw, context)
        } else if is_salesforce(raw) {
            from_salesforce(raw, context)
        } else {
            from_generic(raw, context)
        };
        complete_names(&mut contact);
        NormalizedRecord::Contact(contact)
    }
}

fn is_google_people(raw: &Value) -> bool {
    raw.get("resourceName").is_some()
        || (raw.get("names").is_some_and(Value::is_array) && raw.get("emailAddresses").is_some())
}

fn is_salesforce(raw: &Value) -> bool {
    raw.get("attributes").is_some() && (raw.get("Email").is_some() || raw.get("FirstName").is_some())
}

/// `path` inside the first element of the array at `key`.
fn first_entry(raw: &Value, key: &str, path: &[&str]) -> Option<String> {
    raw.get(key)?.as_array()?.first().and_then(|entry| str_at(entry, path))
}

fn from_google_people(raw: &Value, context: &NormalizeContext) -> UnifiedContact {
    let id = first_str(raw, &["resourceName", "id"]);
    UnifiedContact {
        first_name: first_entry(raw, "names", &["givenName"]),
        last_name: first_entry(raw, "names", &["familyName"]),
        full_name: first_entry(raw, "names", &["displayName"]),
        email: first_entry(raw, "emailAddresses", &["value"]),
        phone: first_entry(raw, "phoneNumbers", &["value"]),
        company: first_entry(raw, "organizations", &["name"]),
        title: first_entry(raw, "organizations", &["title"]),
        source: context.source(id.clone()),
        id,
    }
}

fn from_salesforce(raw: &Value, context: &NormalizeContext) -> UnifiedContact {
    let id = first_str(raw, &["Id"]);
    UnifiedContact {
        first_name: first_str(raw, &["FirstName"]),
        last_name: first_str(raw, &["LastName"]),
        full_name: first_str(raw, &["Name"]),
        email: first_str(raw, &["Email"]),
        phone: first_str(raw, &["Phone", "MobilePhone"]),
        company: str_at(raw, &["Account", "Name"]).or_else(|| first_str(raw, &["Company"])),
        title: first_str(raw, &["Title"]),
        source: context.source(id.clone()),
        id,
    }
}

fn from_generic(raw: &Value, context: &NormalizeContext) -> UnifiedContact {
    let id = first_str(raw, &["id", "contact_id", "contactId", "Id"]);
    let email = first_str(raw, &["email", "Email", "email_address", "emailAddress"]).or_else(|| {
        at(raw, &["emailAddresses"])
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|entry| entry.as_str().map(str::to_string).or_else(|| str_at(entry, &["value"])))
    });
    UnifiedContact {
        first_name: first_str(raw, &["first_name", "firstName", "FirstName", "given_name"]),
        last_name: first_str(raw, &["last_name", "lastName", "LastName", "family_name"]),
        full_name: first_str(raw, &["full_name", "fullName", "name", "Name", "displayName"]),
        email,
        phone: first_str(raw, &["phone", "phone_number", "phoneNumber", "mobile", "Phone"]),
        company: first_str(raw, &["company", "organization", "organisation", "Company"])
            .or_else(|| str_at(raw, &["company", "name"])),
        title: first_str(raw, &["title", "job_title", "jobTitle", "Title"]),
        source: context.source(id.clone()),
        id,
    }
}

/// Fill whichever of the full name or its parts is missing from the other.
fn complete_names(contact: &mut UnifiedContact) {
    if contact.full_name.is_none() {
        let joined = [contact.first_name.as_deref(), contact.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        contact.full_name = (!joined.is_empty()).then_some(joined);
    } else if contact.first_name.is_none() && contact.last_name.is_none() {
        if let Some(full) = contact.full_name.as_deref() {
            let mut parts = full.split_whitespace();
            contact.first_name = parts.next().map(str::to_string);
            let rest = parts.collect::<Vec<_>>().join(" ");
            contact.last_name = (!rest.is_empty()).then_some(rest);
        }
    }
}
