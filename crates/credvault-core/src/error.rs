//! Error types for Credvault
//!
//! Every variant maps to a stable, machine-checkable code via [`VaultError::code`].
//! Messages carry key-source names, structural paths and record identifiers only;
//! secret values and key material never appear in an error.

use thiserror::Error;

/// Result type alias using Credvault's error
pub type Result<T> = std::result::Result<T, VaultError>;

/// Credvault error taxonomy
#[derive(Error, Debug)]
pub enum VaultError {
    // Key configuration errors
    #[error("No primary encryption key configured. Set {0} (64 hex chars or base64 of 32 bytes).")]
    KeyMissing(String),

    #[error("Primary encryption key in {0} is invalid: expected 64 hex characters or base64 encoding 32 bytes.")]
    PrimaryKeyInvalid(String),

    #[error("Previous encryption key in {0} is invalid: expected 64 hex characters or base64 encoding 32 bytes.")]
    PreviousKeyInvalid(String),

    #[error("Primary key sources {0} and {1} resolve to different keys.")]
    KeyMismatch(String, String),

    #[error("Previous key sources {0} and {1} resolve to different keys.")]
    PreviousKeyMismatch(String, String),

    // Cipher errors
    #[error("No usable encryption key is configured")]
    NoKeyConfigured,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Malformed encrypted payload: {0}")]
    MalformedPayload(String),

    #[error("Decryption failed after trying {attempts} key(s)")]
    DecryptionFailed {
        attempts: usize,
        #[source]
        source: aes_gcm::Error,
    },

    // Vault errors
    #[error("Credential vault is unavailable: no persistence backend is wired up")]
    VaultUnavailable,

    #[error("Invalid input: {0}")]
    BadInput(String),

    #[error("A non-empty secret is required")]
    SecretRequired,

    // Guard errors
    #[error("Plaintext credentials are not allowed in {context}: {}", .paths.join(", "))]
    LooseCredentialBlocked { context: String, paths: Vec<String> },

    // Collaborator errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Get the stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::KeyMissing(_) => "KEY_MISSING",
            Self::PrimaryKeyInvalid(_) => "PRIMARY_KEY_INVALID",
            Self::PreviousKeyInvalid(_) => "PREVIOUS_KEY_INVALID",
            Self::KeyMismatch(..) => "KEY_MISMATCH",
            Self::PreviousKeyMismatch(..) => "PREVIOUS_KEY_MISMATCH",
            Self::NoKeyConfigured => "NO_KEY_CONFIGURED",
            Self::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::DecryptionFailed { .. } => "DECRYPTION_FAILED",
            Self::VaultUnavailable => "VAULT_UNAVAILABLE",
            Self::BadInput(_) => "BAD_INPUT",
            Self::SecretRequired => "SECRET_REQUIRED",
            Self::LooseCredentialBlocked { .. } => "LOOSE_CREDENTIAL_BLOCKED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get a suggestion for how an operator can fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::KeyMissing(var) => Some(format!("credvault keys generate, then export {}", var)),
            Self::PrimaryKeyInvalid(var) | Self::PreviousKeyInvalid(var) => {
                Some(format!("credvault keys generate, then replace the value of {}", var))
            }
            Self::KeyMismatch(..) | Self::PreviousKeyMismatch(..) => Some(
                "Point both variables at the same key, or set the mismatch override while migrating"
                    .to_string(),
            ),
            Self::DecryptionFailed { .. } => {
                Some("Check that the key used at write time is still configured".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error reflects key configuration rather than data or input
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::KeyMissing(_)
                | Self::PrimaryKeyInvalid(_)
                | Self::PreviousKeyInvalid(_)
                | Self::KeyMismatch(..)
                | Self::PreviousKeyMismatch(..)
                | Self::NoKeyConfigured
        )
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
