//! Key resolution
//!
//! Turns raw configuration strings into fixed-length AES-256 key material.
//! A configured source is accepted in one of two shapes:
//!
//! - exactly 64 hexadecimal characters
//! - standard base64 that decodes to exactly 32 bytes
//!
//! Anything else resolves to "no key". Callers distinguish an absent source from
//! a present-but-malformed one with [`looks_configured`].

use aes_gcm::aead::OsRng;
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Length of a hex-encoded key
const HEX_KEY_LEN: usize = KEY_SIZE * 2;

/// A 32-byte encryption key that is securely zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create key material from raw bytes, rejecting any other length
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Export as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Export as standard base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Constant-time equality
    pub fn ct_eq(&self, other: &KeyMaterial) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A string that is securely zeroed when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureString")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The four logical key sources, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// Current key, fixed format
    Primary,
    /// Current key, alternate naming scheme (fixed format or passphrase)
    PrimaryAlt,
    /// Rotation-window key, fixed format
    Previous,
    /// Rotation-window key, alternate naming scheme (fixed format or passphrase)
    PreviousAlt,
}

impl KeySource {
    /// All sources in declaration order
    pub const ALL: [KeySource; 4] = [
        KeySource::Primary,
        KeySource::PrimaryAlt,
        KeySource::Previous,
        KeySource::PreviousAlt,
    ];

    /// Stable label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryAlt => "primary-alt-format",
            Self::Previous => "previous",
            Self::PreviousAlt => "previous-alt-format",
        }
    }

    /// Whether this source only accepts the fixed key shapes
    pub fn is_fixed_format(&self) -> bool {
        matches!(self, Self::Primary | Self::Previous)
    }

    /// Resolve a raw configured value for this source
    ///
    /// Fixed-format sources go through [`parse_fixed_key`] only. Alternate sources
    /// accept a fixed key and otherwise fall back to [`derive_key_from_passphrase`].
    pub fn resolve(&self, raw: Option<&str>) -> Option<KeyMaterial> {
        let raw = raw.filter(|r| looks_configured(Some(*r)))?;
        if self.is_fixed_format() {
            parse_fixed_key(raw)
        } else {
            parse_fixed_key(raw).or_else(|| derive_key_from_passphrase(raw))
        }
    }
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl serde::Serialize for KeySource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One usable key plus the source it came from
#[derive(Debug, Clone)]
pub struct KeyCandidate {
    pub source: KeySource,
    pub key: KeyMaterial,
}

impl KeyCandidate {
    pub fn new(source: KeySource, key: KeyMaterial) -> Self {
        Self { source, key }
    }
}

/// Parse a fixed-format key: 64 hex characters, or base64 of exactly 32 bytes
pub fn parse_fixed_key(raw: &str) -> Option<KeyMaterial> {
    let trimmed = raw.trim();
    if trimmed.len() == HEX_KEY_LEN && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        let decoded = hex::decode(trimmed).ok()?;
        return KeyMaterial::from_bytes(&decoded);
    }

    let mut decoded = STANDARD.decode(trimmed).ok()?;
    let key = KeyMaterial::from_bytes(&decoded);
    decoded.zeroize();
    key
}

/// Derive a key as the SHA-256 digest of the raw string's UTF-8 bytes
///
/// Succeeds for any non-empty input.
pub fn derive_key_from_passphrase(raw: &str) -> Option<KeyMaterial> {
    if raw.is_empty() {
        return None;
    }
    let digest = Sha256::digest(raw.as_bytes());
    KeyMaterial::from_bytes(digest.as_slice())
}

/// True iff the value is present and non-blank after trimming
pub fn looks_configured(raw: Option<&str>) -> bool {
    raw.is_some_and(|r| !r.trim().is_empty())
}
