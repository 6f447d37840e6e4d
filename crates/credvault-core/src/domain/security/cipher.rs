//! Cipher adapter
//!
//! AES-256-GCM over an ordered list of candidate keys. Encryption always uses the
//! first (most preferred) candidate; decryption tries each candidate in order and
//! returns the first authenticated result, which keeps records written under the
//! previous key readable for the whole rotation window.
//!
//! Wire format: `base64(IV[12] || Tag[16] || Ciphertext[N])`.

use aes_gcm::{
    Aes256Gcm, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::key::{KeyCandidate, KeySource};
use super::validation::validate_key_configuration;
use crate::config::KeySettings;
use crate::error::{Result, VaultError};

/// Size of the AES-GCM IV in bytes
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Smallest decodable frame (empty ciphertext)
pub const MIN_PAYLOAD_SIZE: usize = IV_SIZE + TAG_SIZE;

/// One base64-encoded ciphertext frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn encode(iv: &[u8; IV_SIZE], tag: &[u8], ciphertext: &[u8]) -> Self {
        let mut frame = Vec::with_capacity(MIN_PAYLOAD_SIZE + ciphertext.len());
        frame.extend_from_slice(iv);
        frame.extend_from_slice(tag);
        frame.extend_from_slice(ciphertext);
        Self(STANDARD.encode(frame))
    }

    fn decode(&self) -> Result<Vec<u8>> {
        let bytes = STANDARD
            .decode(self.0.trim())
            .map_err(|e| VaultError::MalformedPayload(format!("invalid base64: {}", e)))?;
        if bytes.len() < MIN_PAYLOAD_SIZE {
            return Err(VaultError::MalformedPayload(format!(
                "expected at least {} bytes, got {}",
                MIN_PAYLOAD_SIZE,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl std::fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EncryptedPayload {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Resolve every configured source into a candidate key
///
/// Sources in `preferred_order` come first, then the remaining sources in
/// declaration order. Byte-identical keys collapse into one candidate that keeps
/// the label of the earliest source.
pub fn build_candidates(settings: &KeySettings, preferred_order: &[KeySource]) -> Vec<KeyCandidate> {
    let mut order: Vec<KeySource> = Vec::with_capacity(KeySource::ALL.len());
    for source in preferred_order.iter().chain(KeySource::ALL.iter()) {
        if !order.contains(source) {
            order.push(*source);
        }
    }

    let mut candidates: Vec<KeyCandidate> = Vec::with_capacity(order.len());
    for source in order {
        let Some(key) = source.resolve(settings.raw(source)) else {
            continue;
        };
        if candidates.iter().any(|c| c.key.ct_eq(&key)) {
            continue;
        }
        candidates.push(KeyCandidate::new(source, key));
    }
    candidates
}

/// Authenticated encryption over an ordered candidate list
#[derive(Debug, Clone)]
pub struct CipherAdapter {
    candidates: Vec<KeyCandidate>,
}

impl CipherAdapter {
    /// Use an explicit candidate list; the first entry encrypts
    pub fn new(candidates: Vec<KeyCandidate>) -> Self {
        Self { candidates }
    }

    /// Validate a settings snapshot and build candidates with the effective source first
    pub fn from_settings(settings: &KeySettings) -> Result<Self> {
        let report = validate_key_configuration(settings)?;
        Ok(Self::new(build_candidates(settings, &[report.effective_source])))
    }

    /// Validate a settings snapshot and build candidates in a caller-chosen order
    pub fn from_settings_with_order(
        settings: &KeySettings,
        preferred_order: &[KeySource],
    ) -> Result<Self> {
        validate_key_configuration(settings)?;
        Ok(Self::new(build_candidates(settings, preferred_order)))
    }

    /// Labels of the candidates, in trial order
    pub fn candidate_sources(&self) -> Vec<KeySource> {
        self.candidates.iter().map(|c| c.source).collect()
    }

    /// Encrypt with the most preferred key and a fresh random IV
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload> {
        let candidate = self.candidates.first().ok_or(VaultError::NoKeyConfigured)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(candidate.key.as_bytes()));

        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedPayload::encode(&iv, tag.as_slice(), &buffer))
    }

    /// Decrypt by trying each candidate in order
    ///
    /// When every candidate fails, the last authentication error is returned.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<String> {
        if self.candidates.is_empty() {
            return Err(VaultError::NoKeyConfigured);
        }

        let frame = payload.decode()?;
        let (iv, rest) = frame.split_at(IV_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        let mut last_error = None;
        for (index, candidate) in self.candidates.iter().enumerate() {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(candidate.key.as_bytes()));
            let mut buffer = ciphertext.to_vec();

            match cipher.decrypt_in_place_detached(
                Nonce::from_slice(iv),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            ) {
                Ok(()) => {
                    if index > 0 {
                        tracing::warn!(
                            source = %candidate.source,
                            "Decrypted with a non-preferred key; record predates the current key"
                        );
                    }
                    return String::from_utf8(buffer).map_err(|e| {
                        e.into_bytes().zeroize();
                        VaultError::MalformedPayload("decrypted payload is not valid UTF-8".into())
                    });
                }
                Err(e) => {
                    tracing::debug!(source = %candidate.source, "Candidate key failed authentication");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(VaultError::DecryptionFailed {
                attempts: self.candidates.len(),
                source,
            }),
            None => Err(VaultError::NoKeyConfigured),
        }
    }
}
