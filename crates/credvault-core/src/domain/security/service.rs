//! Credential vault service
//!
//! Stores secrets encrypted at rest and hands back an opaque reference; resolves a
//! reference back into plaintext for outbound use. The key configuration is read
//! from the provider on every operation, so rotating keys takes effect without a
//! restart.

use std::sync::Arc;

use uuid::Uuid;
use zeroize::Zeroize;

use super::cipher::CipherAdapter;
use super::entity::{
    CredentialFilter, NewCredentialRecord, ResolvedCredential, StoreCredentialRequest,
    StoredCredential, DEFAULT_KIND, VAULT_SCHEME, credential_ref,
};
use super::event::{AuditSink, VaultEvent};
use super::repository::CredentialRepository;
use super::secret::{SecretValue, parse_plaintext};
use crate::config::KeySettingsProvider;
use crate::error::{Result, VaultError};

/// Encrypted credential storage keyed by opaque references
///
/// # Example
///
/// ```ignore
/// let vault = CredentialVault::new(Arc::new(repo), Arc::new(EnvKeySettings::system()));
///
/// let stored = vault
///     .store_credential(StoreCredentialRequest::new("tenant-1", "stripe", "sk_live_123"))
///     .await?;
///
/// let resolved = vault.resolve_credential(&stored.secret_ref, Some("tenant-1")).await?;
/// ```
pub struct CredentialVault {
    repository: Option<Arc<dyn CredentialRepository>>,
    keys: Arc<dyn KeySettingsProvider>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl CredentialVault {
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        keys: Arc<dyn KeySettingsProvider>,
    ) -> Self {
        Self {
            repository: Some(repository),
            keys,
            audit: None,
        }
    }

    /// A vault with no persistence wired up; every operation fails with
    /// `VaultUnavailable`
    pub fn unavailable(keys: Arc<dyn KeySettingsProvider>) -> Self {
        Self {
            repository: None,
            keys,
            audit: None,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    fn repository(&self) -> Result<&Arc<dyn CredentialRepository>> {
        self.repository.as_ref().ok_or(VaultError::VaultUnavailable)
    }

    fn cipher(&self) -> Result<CipherAdapter> {
        CipherAdapter::from_settings(&self.keys.current())
    }

    fn audit(&self, event: VaultEvent) {
        if let Some(sink) = &self.audit {
            sink.record(event);
        }
    }

    /// Encrypt and persist a secret, returning metadata and its reference
    ///
    /// The returned value never contains the secret or the ciphertext.
    pub async fn store_credential(
        &self,
        request: StoreCredentialRequest,
    ) -> Result<StoredCredential> {
        let repository = self.repository()?;

        let tenant_id = request.tenant_id.trim();
        let provider = request.provider.trim();
        if tenant_id.is_empty() || provider.is_empty() {
            return Err(VaultError::BadInput(
                "tenant_id and provider are required".to_string(),
            ));
        }
        if !request.secret.is_usable() {
            return Err(VaultError::SecretRequired);
        }

        let kind = request
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_KIND)
            .to_string();
        let integration_id = request
            .integration_id
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(String::from);

        let cipher = self.cipher()?;
        let mut plaintext = request.secret.to_plaintext()?;
        let secret_enc = cipher.encrypt(&plaintext);
        plaintext.zeroize();
        let secret_enc = secret_enc?;

        let meta = request
            .meta
            .map(|m| SecretValue::from(m).canonicalize())
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        let id = Uuid::new_v4();
        let record = NewCredentialRecord {
            id,
            secret_ref: credential_ref(id),
            tenant_id: tenant_id.to_string(),
            provider: provider.to_string(),
            integration_id,
            kind,
            secret_enc,
            meta,
            rotated_at: None,
        };

        let stored = repository.create(&record).await?;

        tracing::info!(
            secret_ref = %stored.secret_ref,
            tenant_id = %stored.tenant_id,
            provider = %stored.provider,
            kind = %stored.kind,
            "Stored encrypted credential"
        );
        self.audit(VaultEvent::credential_stored(
            &stored.secret_ref,
            &stored.tenant_id,
            &stored.provider,
            &stored.kind,
        ));
        Ok(stored)
    }

    /// Resolve a reference into its plaintext secret
    ///
    /// Returns `Ok(None)` when the reference is not a vault reference, when no
    /// record exists, or when `tenant_id` is given and the record belongs to a
    /// different tenant. A blank `tenant_id` counts as absent.
    pub async fn resolve_credential(
        &self,
        secret_ref: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<ResolvedCredential>> {
        let secret_ref = secret_ref.trim();
        let tenant_id = tenant_id.map(str::trim).filter(|t| !t.is_empty());

        if !secret_ref.starts_with(VAULT_SCHEME) {
            tracing::debug!("Reference does not use the vault scheme");
            self.audit(VaultEvent::unrecognized_reference(tenant_id));
            return Ok(None);
        }

        let repository = self.repository()?;
        let filter = CredentialFilter {
            secret_ref: secret_ref.to_string(),
            tenant_id: tenant_id.map(String::from),
        };

        let record = match repository.find_first(&filter).await? {
            Some(record) if filter.matches(&record) => record,
            _ => {
                tracing::debug!(secret_ref = %secret_ref, "No credential for reference");
                self.audit(VaultEvent::credential_resolve_missed(secret_ref, tenant_id));
                return Ok(None);
            }
        };

        let plaintext = self.cipher()?.decrypt(&record.secret_enc)?;
        let secret = parse_plaintext(plaintext);

        tracing::debug!(
            secret_ref = %record.secret_ref,
            tenant_id = %record.tenant_id,
            "Resolved credential"
        );
        self.audit(VaultEvent::credential_resolved(
            &record.secret_ref,
            &record.tenant_id,
            &record.provider,
        ));

        Ok(Some(ResolvedCredential {
            metadata: record.metadata(),
            meta: record.meta,
            secret,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::InMemoryEnv;
    use crate::config::{EnvKeySettings, KeyEnvNames, KeySettings};
    use crate::domain::security::entity::CredentialRecord;
    use crate::domain::security::event::{MemoryAuditSink, UNRECOGNIZED_REFERENCE, VaultEventType};
    use crate::domain::security::key::KeyMaterial;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // Mock CredentialRepository for testing
    #[derive(Default)]
    struct MockCredentialRepository {
        records: Mutex<HashMap<Uuid, CredentialRecord>>,
    }

    impl MockCredentialRepository {
        fn stored(&self, id: Uuid) -> CredentialRecord {
            self.records.lock().unwrap().get(&id).cloned().unwrap()
        }
    }

    #[async_trait]
    impl CredentialRepository for MockCredentialRepository {
        async fn create(&self, record: &NewCredentialRecord) -> Result<StoredCredential> {
            let full = CredentialRecord::from_new(record, Utc::now());
            let metadata = full.metadata();
            self.records.lock().unwrap().insert(record.id, full);
            Ok(metadata)
        }

        async fn find_first(&self, filter: &CredentialFilter) -> Result<Option<CredentialRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .find(|r| filter.matches(r))
                .cloned())
        }
    }

    fn settings_with(primary: &KeyMaterial) -> Arc<KeySettings> {
        Arc::new(KeySettings::new(KeyEnvNames::default()).with_primary(primary.to_hex()))
    }

    fn vault_with(repo: Arc<MockCredentialRepository>, key: &KeyMaterial) -> CredentialVault {
        CredentialVault::new(repo, settings_with(key))
    }

    #[tokio::test]
    async fn test_store_returns_opaque_reference() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo.clone(), &KeyMaterial::generate());

        let stored = vault
            .store_credential(
                StoreCredentialRequest::new("tenant-1", "stripe", "sk_live_abc123")
                    .kind("API_KEY")
                    .meta(json!({ "label": "prod" })),
            )
            .await
            .unwrap();

        let id = stored
            .secret_ref
            .strip_prefix("vault://credential/")
            .expect("reference prefix");
        assert_eq!(Uuid::parse_str(id).unwrap(), stored.id);
        assert_eq!(stored.kind, "API_KEY");
        assert!(stored.rotated_at.is_none());

        let serialized = serde_json::to_string(&stored).unwrap();
        assert!(!serialized.contains("sk_live_abc123"));

        let record = repo.stored(stored.id);
        assert!(!record.secret_enc.as_str().contains("sk_live_abc123"));
        assert_eq!(record.meta, json!({ "label": "prod" }));
    }

    #[tokio::test]
    async fn test_store_and_resolve_text_secret() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo, &KeyMaterial::generate());

        let stored = vault
            .store_credential(StoreCredentialRequest::new("tenant-1", "github", "ghp_token"))
            .await
            .unwrap();
        assert_eq!(stored.kind, "GENERIC");

        let resolved = vault
            .resolve_credential(&stored.secret_ref, Some("tenant-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.secret_str(), Some("ghp_token"));
        assert_eq!(resolved.metadata, stored);
    }

    #[tokio::test]
    async fn test_structured_secret_roundtrip() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo, &KeyMaterial::generate());
        let secret = json!({ "client_id": "abc", "client_secret": "xyz", "scopes": ["read"] });

        let stored = vault
            .store_credential(StoreCredentialRequest::new("t", "google", secret.clone()))
            .await
            .unwrap();
        let resolved = vault
            .resolve_credential(&stored.secret_ref, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.secret, secret);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo, &KeyMaterial::generate());

        let stored = vault
            .store_credential(StoreCredentialRequest::new("tenant-a", "stripe", "secret-a"))
            .await
            .unwrap();

        let other = vault
            .resolve_credential(&stored.secret_ref, Some("tenant-b"))
            .await
            .unwrap();
        assert!(other.is_none());

        let blank = vault
            .resolve_credential(&stored.secret_ref, Some("  "))
            .await
            .unwrap();
        assert!(blank.is_some());
    }

    #[tokio::test]
    async fn test_non_vault_reference_is_not_found() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo, &KeyMaterial::generate());

        for reference in ["sk_live_123", "https://example.com/credential/1", ""] {
            assert!(vault.resolve_credential(reference, None).await.unwrap().is_none());
        }
        let missing = format!("vault://credential/{}", Uuid::new_v4());
        assert!(vault.resolve_credential(&missing, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_input_validation() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = vault_with(repo, &KeyMaterial::generate());

        let err = vault
            .store_credential(StoreCredentialRequest::new("  ", "stripe", "s"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BAD_INPUT");

        let err = vault
            .store_credential(StoreCredentialRequest::new("t", "", "s"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BAD_INPUT");

        for secret in [json!("   "), json!(null), json!({}), json!([])] {
            let err = vault
                .store_credential(StoreCredentialRequest::new("t", "p", secret))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "SECRET_REQUIRED");
        }
    }

    #[tokio::test]
    async fn test_unavailable_vault() {
        let vault = CredentialVault::unavailable(settings_with(&KeyMaterial::generate()));
        let err = vault
            .store_credential(StoreCredentialRequest::new("t", "p", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::VaultUnavailable));

        let err = vault
            .resolve_credential("vault://credential/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::VaultUnavailable));
    }

    #[tokio::test]
    async fn test_missing_key_fails_store() {
        let repo = Arc::new(MockCredentialRepository::default());
        let vault = CredentialVault::new(repo, Arc::new(KeySettings::new(KeyEnvNames::default())));
        let err = vault
            .store_credential(StoreCredentialRequest::new("t", "p", "s"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "KEY_MISSING");
    }

    #[tokio::test]
    async fn test_rotation_through_live_configuration() {
        let names = KeyEnvNames::default();
        let env = Arc::new(InMemoryEnv::new());
        let old_key = KeyMaterial::generate();
        let new_key = KeyMaterial::generate();
        env.set(names.primary.clone(), old_key.to_hex());

        let repo = Arc::new(MockCredentialRepository::default());
        let vault = CredentialVault::new(
            repo,
            Arc::new(EnvKeySettings::new(env.clone(), names.clone())),
        );

        let stored = vault
            .store_credential(StoreCredentialRequest::new("t", "p", "rotate-me"))
            .await
            .unwrap();

        env.set(names.primary.clone(), new_key.to_hex());
        env.set(names.previous.clone(), old_key.to_hex());
        let resolved = vault
            .resolve_credential(&stored.secret_ref, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.secret_str(), Some("rotate-me"));

        env.remove(&names.previous);
        let err = vault
            .resolve_credential(&stored.secret_ref, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DECRYPTION_FAILED");
    }

    #[tokio::test]
    async fn test_plaintext_lookup_never_reaches_audit_trail() {
        let repo = Arc::new(MockCredentialRepository::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let vault = vault_with(repo, &KeyMaterial::generate()).with_audit_sink(sink.clone());

        let resolved = vault
            .resolve_credential("sk_live_LEGACY_PLAINTEXT_TOKEN", Some("t"))
            .await
            .unwrap();
        assert!(resolved.is_none());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, VaultEventType::CredentialResolveMissed);
        assert_eq!(events[0].secret_ref, UNRECOGNIZED_REFERENCE);
        let serialized = serde_json::to_string(&events[0]).unwrap();
        assert!(!serialized.contains("sk_live_LEGACY_PLAINTEXT_TOKEN"));
    }

    #[tokio::test]
    async fn test_audit_events() {
        let repo = Arc::new(MockCredentialRepository::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let vault = vault_with(repo, &KeyMaterial::generate()).with_audit_sink(sink.clone());

        let stored = vault
            .store_credential(StoreCredentialRequest::new("t", "p", "s3cr3t"))
            .await
            .unwrap();
        vault.resolve_credential(&stored.secret_ref, Some("t")).await.unwrap();
        vault.resolve_credential(&stored.secret_ref, Some("other")).await.unwrap();

        let kinds: Vec<_> = sink.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                VaultEventType::CredentialStored,
                VaultEventType::CredentialResolved,
                VaultEventType::CredentialResolveMissed,
            ]
        );
        for event in sink.events() {
            assert!(!serde_json::to_string(&event).unwrap().contains("s3cr3t"));
        }
    }
}
