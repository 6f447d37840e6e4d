//! Security domain module
//!
//! Encryption at rest for tenant credentials, plus the structural guard that keeps
//! plaintext secrets out of generic persistence.
//!
//! # Architecture
//!
//! - **Keys**: `KeyMaterial`, `KeySource`, fixed-format parsing and passphrase derivation
//! - **Validation**: `validate_key_configuration` checks the four key sources as a set
//! - **Cipher**: `CipherAdapter` encrypts with the preferred key and decrypts with any
//! - **Vault**: `CredentialVault` stores secrets behind `vault://credential/<id>` references
//! - **Guard**: `find_loose_credentials` / `assert_no_loose_credentials`
//!
//! # Example
//!
//! ```ignore
//! use credvault_core::config::EnvKeySettings;
//! use credvault_core::domain::security::{CredentialVault, StoreCredentialRequest};
//! use credvault_core::infrastructure::security::SqliteCredentialRepository;
//!
//! let repo = SqliteCredentialRepository::new(db.pool().clone());
//! let vault = CredentialVault::new(Arc::new(repo), Arc::new(EnvKeySettings::system()));
//!
//! let stored = vault
//!     .store_credential(StoreCredentialRequest::new("tenant-1", "stripe", "sk_live_xxx"))
//!     .await?;
//!
//! // Only the reference goes into integration settings
//! settings["apiKey"] = json!(stored.secret_ref);
//! assert_no_loose_credentials(&settings, "integration settings")?;
//! ```

pub mod cipher;
pub mod entity;
pub mod event;
pub mod guard;
pub mod key;
pub mod repository;
pub mod secret;
pub mod service;
pub mod validation;

// Re-export key types
pub use key::{
    KEY_SIZE, KeyCandidate, KeyMaterial, KeySource, SecureString, derive_key_from_passphrase,
    looks_configured, parse_fixed_key,
};

// Re-export validation and cipher types
pub use cipher::{CipherAdapter, EncryptedPayload, build_candidates};
pub use validation::{KeyConfigReport, validate_key_configuration};

// Re-export entity types
pub use entity::{
    CREDENTIAL_REF_PREFIX, CredentialFilter, CredentialRecord, DEFAULT_KIND, NewCredentialRecord,
    ResolvedCredential, StoreCredentialRequest, StoredCredential, VAULT_SCHEME, credential_ref,
};
pub use secret::{SecretValue, parse_plaintext};

// Re-export event types
pub use event::{
    AuditSink, MemoryAuditSink, TracingAuditSink, UNRECOGNIZED_REFERENCE, VaultEvent,
    VaultEventType,
};

// Re-export repository trait and service
pub use repository::CredentialRepository;
pub use service::CredentialVault;

// Re-export guard functions
pub use guard::{
    assert_no_loose_credentials, find_loose_credentials, is_sensitive_key, is_vault_reference,
    normalize_key,
};
