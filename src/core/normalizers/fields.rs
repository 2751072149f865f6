//! Structural accessors over untyped provider payloads.

use super::types::EmailAddress;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Follow `path` through nested objects.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Non-empty string at `path`; numbers are rendered as strings.
pub fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    match at(value, path)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// First non-empty string among the candidate top-level keys.
pub fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| str_at(value, &[key]))
}

pub fn has_any(value: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| value.get(*key).is_some_and(|field| !field.is_null()))
}

pub fn f64_at(value: &Value, path: &[&str]) -> Option<f64> {
    match at(value, path)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn first_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| f64_at(value, &[key]))
}

pub fn bool_at(value: &Value, path: &[&str]) -> Option<bool> {
    match at(value, path)? {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Strings of an array field, or a single string split on commas.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .filter(|item| !item.trim().is_empty())
            .collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn address_regex() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        Regex::new(r#"^\s*"?([^"<]*?)"?\s*<([^>]+)>\s*$"#).expect("address pattern is valid")
    })
}

/// Parse `Name <addr>`, `"Name" <addr>` or a bare address.
pub fn parse_address(raw: &str) -> Option<EmailAddress> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(caps) = address_regex().captures(raw) {
        let name = caps[1].trim();
        return Some(EmailAddress {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: caps[2].trim().to_string(),
        });
    }
    Some(EmailAddress {
        name: None,
        email: raw.to_string(),
    })
}

/// Split a header value holding several addresses. Commas inside quoted
/// display names do not split.
pub fn parse_address_list(raw: &str) -> Vec<EmailAddress> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in raw.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ',' | ';' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts.iter().filter_map(|part| parse_address(part)).collect()
}

/// An address given as a string, `{name, email|address}` or an Outlook
/// `{emailAddress: {...}}` wrapper.
pub fn address_from_value(value: &Value) -> Option<EmailAddress> {
    match value {
        Value::String(text) => parse_address(text),
        Value::Object(_) => {
            if let Some(inner) = value.get("emailAddress") {
                return address_from_value(inner);
            }
            let email = first_str(value, &["email", "address", "value"])?;
            Some(EmailAddress {
                name: first_str(value, &["name", "displayName"]),
                email,
            })
        }
        _ => None,
    }
}

pub fn addresses_from_value(value: Option<&Value>) -> Vec<EmailAddress> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(address_from_value).collect(),
        Some(Value::String(text)) => parse_address_list(text),
        Some(other @ Value::Object(_)) => address_from_value(other).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"))
}

/// Crude HTML to text for bodies that only come as HTML.
pub fn strip_html(html: &str) -> String {
    let text = tag_regex().replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
