//! Credential vault entities
//!
//! The persisted record always carries ciphertext, never plaintext. What a caller
//! gets back from a store is metadata plus the opaque `vault://credential/<id>`
//! reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::cipher::EncryptedPayload;
use super::secret::SecretValue;

/// Scheme shared by every vault reference
pub const VAULT_SCHEME: &str = "vault://";

/// Prefix of credential references
pub const CREDENTIAL_REF_PREFIX: &str = "vault://credential/";

/// Kind assigned when the caller does not classify a credential
pub const DEFAULT_KIND: &str = "GENERIC";

/// Build the reference string for a credential id
pub fn credential_ref(id: Uuid) -> String {
    format!("{}{}", CREDENTIAL_REF_PREFIX, id)
}

/// Input to `CredentialVault::store_credential`
#[derive(Debug, Clone)]
pub struct StoreCredentialRequest {
    pub tenant_id: String,
    pub provider: String,
    pub integration_id: Option<String>,
    pub kind: Option<String>,
    pub secret: SecretValue,
    pub meta: Option<Value>,
}

impl StoreCredentialRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        provider: impl Into<String>,
        secret: impl Into<SecretValue>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider: provider.into(),
            integration_id: None,
            kind: None,
            secret: secret.into(),
            meta: None,
        }
    }

    pub fn integration(mut self, integration_id: impl Into<String>) -> Self {
        self.integration_id = Some(integration_id.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A record ready to be written by the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCredentialRecord {
    pub id: Uuid,
    pub secret_ref: String,
    pub tenant_id: String,
    pub provider: String,
    pub integration_id: Option<String>,
    pub kind: String,
    pub secret_enc: EncryptedPayload,
    pub meta: Value,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// A full persisted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub secret_ref: String,
    pub tenant_id: String,
    pub provider: String,
    pub integration_id: Option<String>,
    pub kind: String,
    pub secret_enc: EncryptedPayload,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Materialize a new record with both timestamps set to `now`
    pub fn from_new(record: &NewCredentialRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            secret_ref: record.secret_ref.clone(),
            tenant_id: record.tenant_id.clone(),
            provider: record.provider.clone(),
            integration_id: record.integration_id.clone(),
            kind: record.kind.clone(),
            secret_enc: record.secret_enc.clone(),
            meta: record.meta.clone(),
            created_at: now,
            updated_at: now,
            rotated_at: record.rotated_at,
        }
    }

    /// Non-secret metadata
    pub fn metadata(&self) -> StoredCredential {
        StoredCredential {
            id: self.id,
            secret_ref: self.secret_ref.clone(),
            tenant_id: self.tenant_id.clone(),
            provider: self.provider.clone(),
            integration_id: self.integration_id.clone(),
            kind: self.kind.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            rotated_at: self.rotated_at,
        }
    }
}

/// What a store returns: metadata and the reference, no secret, no ciphertext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub id: Uuid,
    pub secret_ref: String,
    pub tenant_id: String,
    pub provider: String,
    pub integration_id: Option<String>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Lookup filter handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFilter {
    pub secret_ref: String,
    pub tenant_id: Option<String>,
}

impl CredentialFilter {
    /// Whether a record satisfies this filter
    pub fn matches(&self, record: &CredentialRecord) -> bool {
        record.secret_ref == self.secret_ref
            && self
                .tenant_id
                .as_ref()
                .is_none_or(|tenant| &record.tenant_id == tenant)
    }
}

/// A credential resolved for outbound use
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCredential {
    #[serde(flatten)]
    pub metadata: StoredCredential,
    pub meta: Value,
    pub secret: Value,
}

impl ResolvedCredential {
    /// The secret as text, when it was stored as text
    pub fn secret_str(&self) -> Option<&str> {
        self.secret.as_str()
    }
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("metadata", &self.metadata)
            .field("meta", &self.meta)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
