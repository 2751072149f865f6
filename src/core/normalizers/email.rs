use super::fields::{
    addresses_from_value, address_from_value, at, bool_at, first_str, parse_address,
    parse_address_list, str_at, string_list, strip_html,
};
use super::types::{Attachment, Domain, NormalizeContext, NormalizedRecord, UnifiedEmail};
use super::RecordNormalizer;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::Value;

/// Gmail, Outlook and generic email payloads.
pub struct EmailNormalizer;

impl RecordNormalizer for EmailNormalizer {
    fn domain(&self) -> Domain {
        Domain::Email
    }

    fn normalize(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord {
        let email = if is_gmail(raw) {
            from_gmail(raw, context)
        } else if is_outlook(raw) {
            from_outlook(raw, context)
        } else {
            from_generic(raw, context)
        };
        NormalizedRecord::Email(email)
    }
}

fn is_gmail(raw: &Value) -> bool {
    raw.get("payload").is_some_and(Value::is_object) && raw.get("labelIds").is_some()
}

fn is_outlook(raw: &Value) -> bool {
    raw.get("receivedDateTime").is_some() && at(raw, &["sender", "emailAddress"]).is_some()
}

/// Case-insensitive lookup in Gmail's `payload.headers` list.
fn header(raw: &Value, name: &str) -> Option<String> {
    at(raw, &["payload", "headers"])?
        .as_array()?
        .iter()
        .find(|entry| {
            entry
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|header| header.eq_ignore_ascii_case(name))
        })
        .and_then(|entry| str_at(entry, &["value"]))
}

/// Decode a base64url body part, tolerating padding and the standard alphabet.
pub fn decode_body_data(data: &str) -> Option<String> {
    let trimmed = data.trim().trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed.as_bytes())
        .or_else(|_| STANDARD.decode(data.trim().as_bytes()))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Default)]
struct MimeBodies {
    plain: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

/// Walks the MIME tree depth-first. The first `text/plain` and `text/html`
/// parts win; parts carrying a filename are attachments.
fn collect_parts(part: &Value, out: &mut MimeBodies) {
    let mime = part.get("mimeType").and_then(Value::as_str).unwrap_or("");
    let filename = part.get("filename").and_then(Value::as_str).unwrap_or("");

    if !filename.is_empty() {
        out.attachments.push(Attachment {
            filename: filename.to_string(),
            mime_type: (!mime.is_empty()).then(|| mime.to_string()),
            size: at(part, &["body", "size"]).and_then(Value::as_u64),
            attachment_id: str_at(part, &["body", "attachmentId"]),
        });
    } else if let Some(data) = at(part, &["body", "data"]).and_then(Value::as_str) {
        let slot = match mime {
            "text/plain" => Some(&mut out.plain),
            "text/html" => Some(&mut out.html),
            _ => None,
        };
        if let Some(slot) = slot.filter(|slot| slot.is_none()) {
            *slot = decode_body_data(data);
        }
    }

    if let Some(parts) = part.get("parts").and_then(Value::as_array) {
        for child in parts {
            collect_parts(child, out);
        }
    }
}

fn from_gmail(raw: &Value, context: &NormalizeContext) -> UnifiedEmail {
    let mut bodies = MimeBodies::default();
    if let Some(payload) = raw.get("payload") {
        collect_parts(payload, &mut bodies);
    }
    let labels = string_list(raw.get("labelIds"));
    let snippet = first_str(raw, &["snippet"]);
    let body = bodies
        .plain
        .clone()
        .or_else(|| bodies.html.as_deref().map(strip_html))
        .or_else(|| snippet.clone())
        .unwrap_or_default();
    let id = first_str(raw, &["id"]);

    UnifiedEmail {
        thread_id: first_str(raw, &["threadId"]),
        subject: header(raw, "Subject")
            .or_else(|| first_str(raw, &["subject"]))
            .unwrap_or_default(),
        from: header(raw, "From")
            .and_then(|value| parse_address(&value))
            .or_else(|| raw.get("from").and_then(address_from_value)),
        to: header(raw, "To")
            .map(|value| parse_address_list(&value))
            .unwrap_or_else(|| addresses_from_value(raw.get("to"))),
        cc: header(raw, "Cc")
            .map(|value| parse_address_list(&value))
            .unwrap_or_default(),
        date: header(raw, "Date").or_else(|| internal_date(raw)),
        body,
        body_html: bodies.html,
        snippet,
        is_read: !labels.iter().any(|label| label == "UNREAD"),
        is_starred: labels.iter().any(|label| label == "STARRED"),
        attachments: bodies.attachments,
        labels,
        source: context.source(id.clone()),
        id,
    }
}

/// Gmail's `internalDate` is epoch milliseconds as a string.
fn internal_date(raw: &Value) -> Option<String> {
    let millis: i64 = str_at(raw, &["internalDate"])?.parse().ok()?;
    chrono::DateTime::from_timestamp_millis(millis).map(|date| date.to_rfc3339())
}

fn from_outlook(raw: &Value, context: &NormalizeContext) -> UnifiedEmail {
    let content_type = str_at(raw, &["body", "contentType"]).unwrap_or_default();
    let content = str_at(raw, &["body", "content"]);
    let is_html = content_type.eq_ignore_ascii_case("html");
    let body = match (&content, is_html) {
        (Some(text), true) => strip_html(text),
        (Some(text), false) => text.clone(),
        (None, _) => first_str(raw, &["bodyPreview"]).unwrap_or_default(),
    };
    let id = first_str(raw, &["id"]);

    UnifiedEmail {
        thread_id: first_str(raw, &["conversationId"]),
        subject: first_str(raw, &["subject"]).unwrap_or_default(),
        from: raw
            .get("from")
            .and_then(address_from_value)
            .or_else(|| raw.get("sender").and_then(address_from_value)),
        to: addresses_from_value(raw.get("toRecipients")),
        cc: addresses_from_value(raw.get("ccRecipients")),
        date: first_str(raw, &["receivedDateTime", "sentDateTime"]),
        body,
        body_html: content.filter(|_| is_html),
        snippet: first_str(raw, &["bodyPreview"]),
        is_read: bool_at(raw, &["isRead"]).unwrap_or(false),
        is_starred: str_at(raw, &["flag", "flagStatus"]).is_some_and(|status| status == "flagged"),
        labels: string_list(raw.get("categories")),
        attachments: Vec::new(),
        source: context.source(id.clone()),
        id,
    }
}

fn from_generic(raw: &Value, context: &NormalizeContext) -> UnifiedEmail {
    let html = first_str(raw, &["html", "body_html", "bodyHtml"]);
    let body = first_str(raw, &["body", "text", "content", "plain", "snippet"])
        .or_else(|| html.as_deref().map(strip_html))
        .unwrap_or_default();
    let is_read = bool_at(raw, &["isRead"])
        .or_else(|| bool_at(raw, &["is_read"]))
        .or_else(|| bool_at(raw, &["read"]))
        .or_else(|| bool_at(raw, &["unread"]).map(|unread| !unread))
        .unwrap_or(false);
    let id = first_str(raw, &["id", "message_id", "messageId"]);

    UnifiedEmail {
        thread_id: first_str(raw, &["thread_id", "threadId"]),
        subject: first_str(raw, &["subject", "Subject"]).unwrap_or_default(),
        from: ["from", "From", "sender", "Sender", "from_email", "fromAddress"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(address_from_value)),
        to: addresses_from_value(raw.get("to").or_else(|| raw.get("To"))),
        cc: addresses_from_value(raw.get("cc")),
        date: first_str(raw, &["date", "Date", "received_at", "receivedAt", "sent_at", "timestamp"]),
        body,
        body_html: html,
        snippet: first_str(raw, &["snippet", "preview"]),
        is_read,
        is_starred: bool_at(raw, &["starred"])
            .or_else(|| bool_at(raw, &["is_starred"]))
            .unwrap_or(false),
        labels: string_list(raw.get("labels")),
        attachments: Vec::new(),
        source: context.source(id.clone()),
        id,
    }
}
