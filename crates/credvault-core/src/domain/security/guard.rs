//! Loose-credential guard
//!
//! A structural scan over arbitrary JSON that reports every path where a
//! sensitive-looking key holds a plaintext value. It has no cryptographic
//! dependency and is meant to run at request boundaries before anything reaches
//! the vault or generic persistence.

use serde_json::{Map, Value};

use super::entity::VAULT_SCHEME;
use crate::error::{Result, VaultError};

/// Sensitive key names, in normalized form with separators removed
const SENSITIVE_KEYS: &[&str] = &[
    "accesstoken",
    "refreshtoken",
    "token",
    "bearertoken",
    "apikey",
    "appsecret",
    "clientsecret",
    "password",
    "secret",
    "serviceaccountjson",
    "privatekey",
    "developertoken",
    "webhooksecret",
    "signingsecret",
];

/// Field names under which an object may carry a vault reference
const REFERENCE_FIELDS: &[&str] = &["secretref", "ref", "vaultref", "credentialref"];

/// Lowercase, trim and collapse runs of whitespace, `-` and `.` into `_`
pub fn normalize_key(key: &str) -> String {
    let mut normalized = String::with_capacity(key.len());
    let mut pending_separator = false;
    for ch in key.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '.' {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('_');
        }
        pending_separator = false;
        normalized.extend(ch.to_lowercase());
    }
    normalized
}

/// Compact form used for set membership: normalized with `_` removed
fn compact_key(key: &str) -> String {
    normalize_key(key).replace('_', "")
}

/// Whether a key name looks like it holds a secret
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&compact_key(key).as_str())
}

/// Whether a string is a vault reference
pub fn is_vault_reference(value: &str) -> bool {
    value.trim().starts_with(VAULT_SCHEME)
}

/// Values under a sensitive key that are allowed through
fn is_exempt(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty() || is_vault_reference(s),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty() || holds_reference(entries),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn holds_reference(entries: &Map<String, Value>) -> bool {
    entries.iter().any(|(k, v)| {
        REFERENCE_FIELDS.contains(&compact_key(k).as_str())
            && v.as_str().is_some_and(is_vault_reference)
    })
}

/// Collect every path where a sensitive key holds a disallowed value
///
/// Paths use `.` between object keys and `[i]` for array elements. Order follows
/// a depth-first walk in the map's iteration order.
pub fn find_loose_credentials(value: &Value) -> Vec<String> {
    let mut findings = Vec::new();
    visit(value, String::new(), &mut findings);
    findings
}

fn visit(value: &Value, path: String, findings: &mut Vec<String>) {
    match value {
        Value::Object(entries) => {
            for (key, child) in entries {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                // exempt values are still walked: a reference object may carry plaintext siblings
                if !is_sensitive_key(key) || is_exempt(child) {
                    visit(child, child_path, findings);
                } else {
                    findings.push(child_path);
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit(child, format!("{}[{}]", path, index), findings);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Reject a payload that carries plaintext credentials
///
/// `context` names the boundary (e.g. "integration settings update") and is carried
/// in the error alongside the offending paths.
pub fn assert_no_loose_credentials(value: &Value, context: &str) -> Result<()> {
    let paths = find_loose_credentials(value);
    if paths.is_empty() {
        return Ok(());
    }

    tracing::warn!(
        context = %context,
        paths = ?paths,
        "Blocked payload carrying plaintext credentials"
    );
    Err(VaultError::LooseCredentialBlocked {
        context: context.to_string(),
        paths,
    })
}
