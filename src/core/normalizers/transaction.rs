use super::fields::{at, bool_at, f64_at, first_f64, first_str, str_at, string_list};
use super::types::{Domain, NormalizeContext, NormalizedRecord, TransactionDirection, UnifiedTransaction};
use super::RecordNormalizer;
use chrono::DateTime;
use serde_json::Value;

/// Currencies whose smallest unit is the major unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv", "xaf",
    "xof", "xpf",
];

/// Stripe, Plaid and generic ledger rows.
pub struct TransactionNormalizer;

impl RecordNormalizer for TransactionNormalizer {
    fn domain(&self) -> Domain {
        Domain::Transaction
    }

    fn normalize(&self, raw: &Value, context: &NormalizeContext) -> NormalizedRecord {
        let transaction = if is_stripe(raw) {
            from_stripe(raw, context)
        } else if is_plaid(raw) {
            from_plaid(raw, context)
        } else {
            from_generic(raw, context)
        };
        NormalizedRecord::Transaction(transaction)
    }
}

fn is_stripe(raw: &Value) -> bool {
    raw.get("object").is_some_and(Value::is_string) && raw.get("created").is_some_and(Value::is_i64)
}

fn is_plaid(raw: &Value) -> bool {
    raw.get("transaction_id").is_some() && raw.get("iso_currency_code").is_some()
}

/// Stripe amounts are integers in the currency's smallest unit.
pub fn from_minor_units(amount: f64, currency: &str) -> f64 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_ascii_lowercase().as_str()) {
        amount
    } else {
        amount / 100.0
    }
}

fn unix_to_rfc3339(raw: &Value, key: &str) -> Option<String> {
    let seconds = raw.get(key)?.as_i64()?;
    DateTime::from_timestamp(seconds, 0).map(|date| date.to_rfc3339())
}

fn currency(raw: &Value, keys: &[&str]) -> String {
    first_str(raw, keys).unwrap_or_default().to_ascii_uppercase()
}

fn from_stripe(raw: &Value, context: &NormalizeContext) -> UnifiedTransaction {
    let currency = currency(raw, &["currency"]);
    let minor = first_f64(raw, &["amount", "amount_total", "total"]).unwrap_or(0.0);
    let object = str_at(raw, &["object"]).unwrap_or_default();
    let direction = if object == "refund" || minor < 0.0 {
        TransactionDirection::Debit
    } else {
        TransactionDirection::Credit
    };
    let id = first_str(raw, &["id"]);

    UnifiedTransaction {
        amount: from_minor_units(minor.abs(), &currency),
        currency,
        direction,
        date: unix_to_rfc3339(raw, "created"),
        description: first_str(raw, &["description", "statement_descriptor"]),
        merchant: str_at(raw, &["billing_details", "name"])
            .or_else(|| first_str(raw, &["calculated_statement_descriptor"])),
        category: Some(object),
        status: first_str(raw, &["status"]),
        source: context.source(id.clone()),
        id,
    }
}

fn from_plaid(raw: &Value, context: &NormalizeContext) -> UnifiedTransaction {
    let amount = f64_at(raw, &["amount"]).unwrap_or(0.0);
    // Plaid reports money leaving the account as positive.
    let direction = if amount >= 0.0 {
        TransactionDirection::Debit
    } else {
        TransactionDirection::Credit
    };
    let category = string_list(raw.get("category"));
    let pending = bool_at(raw, &["pending"]).unwrap_or(false);
    let id = first_str(raw, &["transaction_id"]);

    UnifiedTransaction {
        amount: amount.abs(),
        currency: currency(raw, &["iso_currency_code", "unofficial_currency_code"]),
        direction,
        date: first_str(raw, &["date", "authorized_date"]),
        description: first_str(raw, &["name", "original_description"]),
        merchant: first_str(raw, &["merchant_name"]),
        category: (!category.is_empty())
            .then(|| category.join(" > "))
            .or_else(|| str_at(raw, &["personal_finance_category", "primary"])),
        status: Some(if pending { "pending" } else { "posted" }.to_string()),
        source: context.source(id.clone()),
        id,
    }
}

fn explicit_direction(raw: &Value) -> Option<TransactionDirection> {
    let label = first_str(raw, &["direction", "type", "transaction_type", "transactionType"])?;
    match label.to_ascii_lowercase().as_str() {
        "debit" | "expense" | "withdrawal" | "payment" | "outflow" | "refund" => {
            Some(TransactionDirection::Debit)
        }
        "credit" | "income" | "deposit" | "inflow" | "charge" | "sale" => Some(TransactionDirection::Credit),
        _ => None,
    }
}

fn from_generic(raw: &Value, context: &NormalizeContext) -> UnifiedTransaction {
    let amount = first_f64(raw, &["amount", "total", "amount_total", "Amount"]).unwrap_or(0.0);
    let direction = explicit_direction(raw).unwrap_or(if amount < 0.0 {
        TransactionDirection::Debit
    } else {
        TransactionDirection::Credit
    });
    let id = first_str(raw, &["id", "transaction_id", "transactionId", "Id"]);

    UnifiedTransaction {
        amount: amount.abs(),
        currency: currency(raw, &["currency", "currency_code", "currencyCode", "Currency", "iso_currency_code"]),
        direction,
        date: first_str(raw, &["date", "created_at", "createdAt", "timestamp", "posted_at"])
            .or_else(|| unix_to_rfc3339(raw, "created")),
        description: first_str(raw, &["description", "memo", "name", "narrative"]),
        merchant: first_str(raw, &["merchant", "merchant_name", "payee", "counterparty"])
            .or_else(|| str_at(raw, &["merchant", "name"])),
        category: first_str(raw, &["category"]).or_else(|| {
            at(raw, &["category"])
                .map(|value| string_list(Some(value)).join(" > "))
                .filter(|joined| !joined.is_empty())
        }),
        status: first_str(raw, &["status", "state"]),
        source: context.source(id.clone()),
        id,
    }
}
