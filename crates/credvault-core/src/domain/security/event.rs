//! Vault audit events
//!
//! Events describe what happened to a credential reference. They never carry the
//! secret, the ciphertext or any key material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stands in for a reference that did not use the vault scheme; the raw input
/// may itself be a plaintext secret and is never recorded
pub const UNRECOGNIZED_REFERENCE: &str = "[non-vault reference]";

/// Type of vault event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEventType {
    /// A credential was encrypted and persisted
    CredentialStored,
    /// A credential was found and decrypted
    CredentialResolved,
    /// A lookup did not produce a credential
    CredentialResolveMissed,
}

impl VaultEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialStored => "credential_stored",
            Self::CredentialResolved => "credential_resolved",
            Self::CredentialResolveMissed => "credential_resolve_missed",
        }
    }
}

impl std::fmt::Display for VaultEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vault audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEvent {
    pub id: Uuid,
    pub event_type: VaultEventType,
    pub secret_ref: String,
    pub tenant_id: Option<String>,
    /// Extra non-secret context
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl VaultEvent {
    pub fn new(
        event_type: VaultEventType,
        secret_ref: impl Into<String>,
        tenant_id: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            secret_ref: secret_ref.into(),
            tenant_id: tenant_id.map(String::from),
            data,
            created_at: Utc::now(),
        }
    }

    pub fn credential_stored(secret_ref: &str, tenant_id: &str, provider: &str, kind: &str) -> Self {
        let data = serde_json::json!({
            "provider": provider,
            "kind": kind,
        });
        Self::new(
            VaultEventType::CredentialStored,
            secret_ref,
            Some(tenant_id),
            Some(data),
        )
    }

    pub fn credential_resolved(secret_ref: &str, tenant_id: &str, provider: &str) -> Self {
        let data = serde_json::json!({ "provider": provider });
        Self::new(
            VaultEventType::CredentialResolved,
            secret_ref,
            Some(tenant_id),
            Some(data),
        )
    }

    /// A vault reference with no matching record for the caller
    pub fn credential_resolve_missed(secret_ref: &str, tenant_id: Option<&str>) -> Self {
        let data = serde_json::json!({ "reason": "not_found" });
        Self::new(
            VaultEventType::CredentialResolveMissed,
            secret_ref,
            tenant_id,
            Some(data),
        )
    }

    /// A lookup for something that is not a vault reference
    pub fn unrecognized_reference(tenant_id: Option<&str>) -> Self {
        let data = serde_json::json!({ "reason": "scheme" });
        Self::new(
            VaultEventType::CredentialResolveMissed,
            UNRECOGNIZED_REFERENCE,
            tenant_id,
            Some(data),
        )
    }
}

/// Receiver for vault audit events
///
/// Implementations must not block; the vault records events inline.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: VaultEvent);
}

/// Sink that forwards events to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: VaultEvent) {
        tracing::info!(
            event_type = %event.event_type,
            secret_ref = %event.secret_ref,
            tenant_id = ?event.tenant_id,
            "Vault audit event"
        );
    }
}

/// Sink that keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<VaultEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: VaultEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
