//! Credvault Core Library
//!
//! This crate provides the core functionality for Credvault, including:
//! - Key configuration: four key sources read from the environment, validated as a set
//! - Cipher adapter: AES-256-GCM with ordered key candidates for rotation
//! - Credential vault: encrypted storage behind `vault://credential/<id>` references
//! - Loose-credential guard: structural scan that blocks plaintext secrets
//! - Storage (SQLite)

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

pub use error::{Result, VaultError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, EnvKeySettings, KeyEnvNames, KeySettings, KeySettingsProvider};
    pub use crate::domain::security::{
        CipherAdapter, CredentialVault, EncryptedPayload, KeyMaterial, KeySource, ResolvedCredential,
        SecretValue, StoreCredentialRequest, StoredCredential, assert_no_loose_credentials,
        find_loose_credentials, validate_key_configuration,
    };
    pub use crate::error::{Result, VaultError};
    pub use crate::infrastructure::security::{
        InMemoryCredentialRepository, SqliteCredentialRepository,
    };
    pub use crate::storage::{Database, DatabaseConfig};
}
