use agentpilot::core::normalizers::{
    detect_domain, is_normalized, DataNormalizer, Domain, NormalizedRecord, TransactionDirection,
};
use chrono::{TimeZone, Utc};
use serde_json::json;

fn gmail_html_only_unread() -> serde_json::Value {
    json!({
        "id": "18c2f0",
        "threadId": "18c2e1",
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": "Quarterly numbers attached",
        "payload": {
            "mimeType": "text/html",
            "headers": [
                {"name": "Subject", "value": "Q3 report"},
                {"name": "From", "value": "Dana Reyes <dana@acme.test>"},
                {"name": "To", "value": "ops@acme.test"}
            ],
            "body": {"data": "PHA-UXVhcnRlcmx5IDxiPm51bWJlcnM8L2I-IGF0dGFjaGVkPC9wPg"}
        }
    })
}

#[test]
fn html_only_gmail_message_is_flattened_and_unread() {
    let record = DataNormalizer::new().normalize(&gmail_html_only_unread(), "google-mail");

    let email = record.as_email().expect("email record");
    assert_eq!(email.subject, "Q3 report");
    assert_eq!(email.body, "Quarterly numbers attached");
    assert_eq!(
        email.body_html.as_deref(),
        Some("<p>Quarterly <b>numbers</b> attached</p>")
    );
    assert!(!email.is_read);
    assert!(!email.is_starred);
    let from = email.from.as_ref().unwrap();
    assert_eq!(from.name.as_deref(), Some("Dana Reyes"));
    assert_eq!(from.email, "dana@acme.test");
    assert_eq!(email.to[0].email, "ops@acme.test");
    assert_eq!(email.source.original_id.as_deref(), Some("18c2f0"));
}

#[test]
fn domain_comes_from_shape_not_plugin_label() {
    let normalizer = DataNormalizer::new();

    let record = normalizer.normalize(&gmail_html_only_unread(), "slack");
    assert_eq!(record.domain(), Domain::Email);
    assert_eq!(record.as_email().unwrap().source.plugin, "slack");

    let charge = json!({"id": "ch_1", "object": "charge", "amount": 1999, "currency": "usd", "created": 1704067200});
    let record = normalizer.normalize(&charge, "google-mail");
    let transaction = record.as_transaction().expect("transaction");
    assert_eq!(transaction.amount, 19.99);
    assert_eq!(transaction.currency, "USD");
    assert_eq!(transaction.direction, TransactionDirection::Credit);
}

#[test]
fn arrays_become_collections_of_one_domain() {
    let rows = json!([
        {"amount": -42.5, "currency": "eur", "description": "Office chairs"},
        {"amount": 120, "currency": "eur", "description": "Refund"}
    ]);

    let record = DataNormalizer::new().normalize(&rows, "bank-export");

    let NormalizedRecord::Collection(items) = &record else {
        panic!("expected a collection, got {:?}", record);
    };
    assert_eq!(items.len(), 2);
    assert_eq!(record.domain(), Domain::Transaction);
    let first = items[0].as_transaction().unwrap();
    assert_eq!(first.amount, 42.5);
    assert_eq!(first.direction, TransactionDirection::Debit);
    assert_eq!(items[1].as_transaction().unwrap().direction, TransactionDirection::Credit);
}

#[test]
fn data_envelopes_are_unwrapped() {
    let wrapped = json!({"data": [
        {"summary": "Planning", "start": {"dateTime": "2024-05-01T09:00:00Z"}, "end": {"dateTime": "2024-05-01T10:00:00Z"}}
    ]});

    assert_eq!(detect_domain(&wrapped), Domain::Event);
    let record = DataNormalizer::new().normalize(&wrapped, "google-calendar");
    let NormalizedRecord::Collection(items) = record else {
        panic!("expected a collection");
    };
    let event = items[0].as_event().unwrap();
    assert_eq!(event.title, "Planning");
    assert_eq!(event.start.as_deref(), Some("2024-05-01T09:00:00Z"));
}

#[test]
fn unknown_shapes_pass_through_untouched() {
    let raw = json!({"rows": 3, "sheet": "Leads"});
    let record = DataNormalizer::new().normalize(&raw, "google-sheets");
    assert_eq!(record, NormalizedRecord::Unknown(raw.clone()));
    assert_eq!(serde_json::to_value(&record).unwrap(), raw);
}

#[test]
fn records_are_stamped_with_provenance() {
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
    let contact = json!({"email": "sam@acme.test", "first_name": "Sam", "last_name": "Lee", "company": "Acme"});

    let record = DataNormalizer::new().normalize_at(&contact, "hubspot", now);

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["_source"]["plugin"], "hubspot");
    assert_eq!(value["_source"]["normalizedAt"], "2024-03-05T12:30:00.000Z");
    assert_eq!(value["fullName"], "Sam Lee");
    assert!(is_normalized(&value));
    assert!(!is_normalized(&contact));
}

#[test]
fn calendar_providers_are_told_apart() {
    let normalizer = DataNormalizer::new();
    let google = json!({
        "kind": "calendar#event",
        "id": "7kq1m0",
        "status": "confirmed",
        "htmlLink": "https://www.google.com/calendar/event?eid=N2txMW0w",
        "summary": "Standup",
        "description": "Daily sync",
        "location": "Room 2",
        "organizer": {"email": "lead@acme.test", "self": true},
        "start": {"dateTime": "2024-06-03T09:00:00-04:00", "timeZone": "America/New_York"},
        "end": {"dateTime": "2024-06-03T09:15:00-04:00", "timeZone": "America/New_York"},
        "attendees": [{"email": "kim@acme.test", "responseStatus": "accepted"}]
    });
    let outlook = json!({
        "id": "AAMkAGI2",
        "subject": "Budget review",
        "bodyPreview": "Numbers for Q3",
        "isAllDay": false,
        "webLink": "https://outlook.office365.com/owa/?itemid=AAMkAGI2",
        "start": {"dateTime": "2024-06-04T14:00:00.0000000", "timeZone": "Pacific Standard Time"},
        "end": {"dateTime": "2024-06-04T15:00:00.0000000", "timeZone": "Pacific Standard Time"},
        "location": {"displayName": "Conf Room A"},
        "organizer": {"emailAddress": {"name": "Ana", "address": "ana@acme.test"}},
        "attendees": [{"emailAddress": {"address": "bo@acme.test"}, "status": {"response": "tentativelyAccepted"}}]
    });

    let google_event = normalizer.normalize(&google, "google-calendar");
    let event = google_event.as_event().expect("google event");
    assert_eq!(event.title, "Standup");
    assert_eq!(event.description.as_deref(), Some("Daily sync"));
    assert_eq!(event.link.as_deref(), Some("https://www.google.com/calendar/event?eid=N2txMW0w"));
    assert_eq!(event.timezone.as_deref(), Some("America/New_York"));
    assert_eq!(event.organizer.as_deref(), Some("lead@acme.test"));
    assert_eq!(event.attendees[0].response_status.as_deref(), Some("accepted"));

    let outlook_event = normalizer.normalize(&outlook, "outlook-calendar");
    let event = outlook_event.as_event().expect("outlook event");
    assert_eq!(event.title, "Budget review");
    assert_eq!(event.description.as_deref(), Some("Numbers for Q3"));
    assert_eq!(event.location.as_deref(), Some("Conf Room A"));
    assert_eq!(event.organizer.as_deref(), Some("ana@acme.test"));
    assert_eq!(event.timezone.as_deref(), Some("Pacific Standard Time"));
    assert_eq!(event.attendees[0].response_status.as_deref(), Some("tentativelyAccepted"));
}

#[test]
fn payment_providers_are_told_apart() {
    let normalizer = DataNormalizer::new();
    let stripe = json!({
        "id": "ch_3Pq",
        "object": "charge",
        "amount": 4250,
        "currency": "usd",
        "created": 1717400000,
        "status": "succeeded",
        "description": "Pro plan",
        "billing_details": {"name": "Jordan Miles"}
    });
    let plaid = json!({
        "transaction_id": "lPNjeW1nR6CDn5okmGQ6hEpMo4lLNoSrzqDje",
        "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
        "amount": 12.5,
        "iso_currency_code": "USD",
        "category": ["Food and Drink", "Restaurants"],
        "date": "2024-06-02",
        "name": "Blue Bottle Coffee",
        "merchant_name": "Blue Bottle",
        "pending": false
    });

    let record = normalizer.normalize(&stripe, "stripe");
    let charge = record.as_transaction().expect("stripe transaction");
    assert_eq!(charge.amount, 42.5);
    assert_eq!(charge.currency, "USD");
    assert_eq!(charge.direction, TransactionDirection::Credit);
    assert_eq!(charge.merchant.as_deref(), Some("Jordan Miles"));
    assert_eq!(charge.category.as_deref(), Some("charge"));
    assert_eq!(charge.status.as_deref(), Some("succeeded"));

    let record = normalizer.normalize(&plaid, "plaid");
    let purchase = record.as_transaction().expect("plaid transaction");
    assert_eq!(purchase.amount, 12.5);
    assert_eq!(purchase.direction, TransactionDirection::Debit);
    assert_eq!(purchase.merchant.as_deref(), Some("Blue Bottle"));
    assert_eq!(purchase.category.as_deref(), Some("Food and Drink > Restaurants"));
    assert_eq!(purchase.status.as_deref(), Some("posted"));
    assert_eq!(purchase.date.as_deref(), Some("2024-06-02"));
}

#[test]
fn address_book_providers_are_told_apart() {
    let normalizer = DataNormalizer::new();
    let people = json!({
        "resourceName": "people/c7142",
        "etag": "%EgcBAgkLLjc9",
        "names": [{"displayName": "Priya Shah", "givenName": "Priya", "familyName": "Shah"}],
        "emailAddresses": [{"value": "priya@acme.test", "type": "work"}],
        "phoneNumbers": [{"value": "+1 555 0100"}],
        "organizations": [{"name": "Acme", "title": "CFO"}]
    });
    let salesforce = json!({
        "attributes": {"type": "Contact", "url": "/services/data/v59.0/sobjects/Contact/003xx"},
        "Id": "003xx000004TmiQ",
        "FirstName": "Luis",
        "LastName": "Ortega",
        "Email": "luis@globex.test",
        "Phone": "(415) 555-0199",
        "Title": "VP Sales",
        "Account": {"Name": "Globex"}
    });

    let record = normalizer.normalize(&people, "google-contacts");
    let contact = record.as_contact().expect("people contact");
    assert_eq!(contact.id.as_deref(), Some("people/c7142"));
    assert_eq!(contact.full_name.as_deref(), Some("Priya Shah"));
    assert_eq!(contact.email.as_deref(), Some("priya@acme.test"));
    assert_eq!(contact.company.as_deref(), Some("Acme"));
    assert_eq!(contact.title.as_deref(), Some("CFO"));

    let record = normalizer.normalize(&salesforce, "salesforce");
    let contact = record.as_contact().expect("salesforce contact");
    assert_eq!(contact.id.as_deref(), Some("003xx000004TmiQ"));
    assert_eq!(contact.full_name.as_deref(), Some("Luis Ortega"));
    assert_eq!(contact.email.as_deref(), Some("luis@globex.test"));
    assert_eq!(contact.company.as_deref(), Some("Globex"));
    assert_eq!(contact.phone.as_deref(), Some("(415) 555-0199"));
}
