//! Human-readable step messages built from action verbs and output key names.

use serde_json::Value;

/// Write-outcome fields that get a precise message even at zero.
const WRITE_OUTCOME_FIELDS: &[&str] = &["appended_rows", "updated_rows", "deleted_count", "deleted_rows"];

/// Action tokens that say nothing about what was handled.
const GENERIC_NOUNS: &[&str] = &[
    "data", "range", "values", "value", "items", "item", "result", "results", "info", "details", "all",
    "batch", "bulk", "by", "id", "to", "from", "new",
];

/// Sample keys that describe the envelope rather than the payload.
const UNINFORMATIVE_KEYS: &[&str] = &[
    "id", "count", "type", "status", "success", "ok", "metadata", "meta", "message", "error", "total",
    "page", "next_page_token", "nextPageToken", "has_more", "data", "result",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Find,
    Retrieve,
    Add,
    Update,
    Delete,
    Send,
    Create,
    Process,
}

impl Verb {
    fn from_token(token: &str) -> Option<Verb> {
        let verb = match token {
            "search" | "find" | "list" | "query" | "lookup" => Verb::Find,
            "read" | "get" | "fetch" | "load" | "download" => Verb::Retrieve,
            "write" | "append" | "add" | "insert" | "upload" => Verb::Add,
            "update" | "modify" | "edit" | "patch" | "upsert" => Verb::Update,
            "delete" | "remove" | "clear" | "archive" => Verb::Delete,
            "send" | "post" | "notify" | "reply" | "forward" => Verb::Send,
            "create" | "generate" | "draft" => Verb::Create,
            _ => return None,
        };
        Some(verb)
    }

    fn message(self, count: usize, noun: &str) -> String {
        let counted = counted(count, noun);
        let plural = pluralize(noun);
        match (self, count) {
            (Verb::Find, 0) => format!("No {} found", plural),
            (Verb::Find, _) => format!("Found {}", counted),
            (Verb::Retrieve, 0) => format!("No {} retrieved", plural),
            (Verb::Retrieve, _) => format!("Retrieved {}", counted),
            (Verb::Add, 0) => format!("No {} added", plural),
            (Verb::Add, _) => format!("Added {}", counted),
            (Verb::Update, 0) => format!("No {} updated", plural),
            (Verb::Update, _) => format!("Updated {}", counted),
            (Verb::Delete, 0) => format!("No {} deleted", plural),
            (Verb::Delete, _) => format!("Deleted {}", counted),
            (Verb::Send, 0) => "Nothing sent".to_string(),
            (Verb::Send, _) => format!("Sent {}", counted),
            (Verb::Create, 0) => format!("No {} created", plural),
            (Verb::Create, _) => format!("Created {}", counted),
            (Verb::Process, 0) => format!("No {} processed", plural),
            (Verb::Process, _) => format!("Processed {}", counted),
        }
    }
}

/// Split `search_emails`, `sheets.appendRows` or `list-events` into
/// lowercase tokens.
pub fn action_tokens(action: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in action.chars() {
        if ch == '_' || ch == '-' || ch == '.' || ch == ' ' || ch == ':' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
            current.extend(ch.to_lowercase());
        } else {
            current.extend(ch.to_lowercase());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// First token naming a known verb; `Process` when there is none.
pub fn verb_of(action: &str) -> Verb {
    action_tokens(action)
        .iter()
        .find_map(|token| Verb::from_token(token))
        .unwrap_or(Verb::Process)
}

/// Noun for the message: the action's trailing token, else the first
/// informative sample key, else "items".
pub fn noun_for(action: &str, sample_keys: &[String]) -> String {
    let tokens = action_tokens(action);
    let from_action = tokens
        .last()
        .filter(|_| tokens.len() > 1)
        .filter(|token| Verb::from_token(token).is_none() && !GENERIC_NOUNS.contains(&token.as_str()))
        .filter(|token| token.len() > 1);
    if let Some(token) = from_action {
        return pluralize(token);
    }
    sample_keys
        .iter()
        .find(|key| !UNINFORMATIVE_KEYS.contains(&key.as_str()))
        .map(|key| pluralize(&key.replace(['_', '-'], " ").to_lowercase()))
        .unwrap_or_else(|| "items".to_string())
}

pub fn pluralize(noun: &str) -> String {
    if noun.ends_with('s') {
        return noun.to_string();
    }
    let mut chars = noun.chars().rev();
    let last = chars.next();
    let before = chars.next();
    match (last, before) {
        (Some('y'), Some(prev)) if !"aeiou".contains(prev) => format!("{}ies", &noun[..noun.len() - 1]),
        (Some('x'), _) | (Some('h'), Some('c' | 's')) => format!("{}es", noun),
        _ => format!("{}s", noun),
    }
}

pub fn singularize(noun: &str) -> String {
    if let Some(stem) = noun.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if noun.ends_with(suffix) {
            return noun[..noun.len() - 2].to_string();
        }
    }
    match noun.strip_suffix('s') {
        Some(stem) if !stem.ends_with('s') && !stem.is_empty() => stem.to_string(),
        _ => noun.to_string(),
    }
}

/// `3 emails`, `1 email`.
pub fn counted(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", singularize(noun))
    } else {
        format!("{} {}", count, pluralize(noun))
    }
}

/// Outcome of a write-style action reported through a dedicated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub count: usize,
    pub message: String,
}

/// A non-negative whole number, whether serialized as an integer or as a
/// float such as `3.0`.
pub fn count_value(value: &Value) -> Option<usize> {
    if let Some(count) = value.as_u64() {
        return usize::try_from(count).ok();
    }
    let float = value.as_f64()?;
    (float >= 0.0 && float.fract() == 0.0 && float <= usize::MAX as f64).then_some(float as usize)
}

/// Message for the first write-outcome field present in `output`.
pub fn write_outcome(output: &Value) -> Option<WriteOutcome> {
    let (field, count) = WRITE_OUTCOME_FIELDS.iter().find_map(|field| {
        let count = count_value(output.get(*field)?)?;
        Some((*field, count))
    })?;
    let message = match (field, count) {
        ("appended_rows", 0) => {
            "No new rows added (all items already exist or were filtered out)".to_string()
        }
        ("appended_rows", n) => format!("Added {}", counted(n, "rows")),
        ("updated_rows", 0) => "No rows needed updating".to_string(),
        ("updated_rows", n) => format!("Updated {}", counted(n, "rows")),
        ("deleted_rows", 0) => "No rows deleted".to_string(),
        ("deleted_rows", n) => format!("Deleted {}", counted(n, "rows")),
        (_, 0) => "Nothing deleted".to_string(),
        (_, n) => format!("Deleted {}", counted(n, "items")),
    };
    Some(WriteOutcome { count, message })
}

/// Message for a completed step without a write-outcome field.
pub fn describe(action: &str, count: usize, sample_keys: &[String]) -> String {
    verb_of(action).message(count, &noun_for(action, sample_keys))
}
