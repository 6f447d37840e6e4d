//! Key configuration validation
//!
//! Runs before any encryption or decryption and fails with a specific error code
//! when the configured sources are absent, malformed or inconsistent. Two deployments
//! (API and worker) may name their keys differently; a silent divergence would only
//! surface as decrypt failures much later, so it is rejected here.

use serde::Serialize;

use super::cipher::build_candidates;
use super::key::{
    KeyMaterial, KeySource, derive_key_from_passphrase, looks_configured, parse_fixed_key,
};
use crate::config::KeySettings;
use crate::error::{Result, VaultError};

/// Outcome of a successful validation
#[derive(Debug, Clone, Serialize)]
pub struct KeyConfigReport {
    /// Source whose key is used for encryption
    pub effective_source: KeySource,
    /// Additional distinct keys available for decryption
    pub fallback_count: usize,
    /// Sources that are set and non-blank
    pub configured_sources: Vec<KeySource>,
    /// Pairs that diverged but were accepted because the override flag is set
    pub mismatch_overridden: Vec<(KeySource, KeySource)>,
}

impl KeyConfigReport {
    pub fn has_warnings(&self) -> bool {
        !self.mismatch_overridden.is_empty()
    }
}

/// Validate the four key sources of a settings snapshot
pub fn validate_key_configuration(settings: &KeySettings) -> Result<KeyConfigReport> {
    let names = settings.names();
    let configured = |source: KeySource| looks_configured(settings.raw(source));

    if !configured(KeySource::Primary) && !configured(KeySource::PrimaryAlt) {
        return Err(VaultError::KeyMissing(names.primary.clone()));
    }

    let primary = fixed_source(settings, KeySource::Primary)
        .map_err(|_| VaultError::PrimaryKeyInvalid(names.primary.clone()))?;
    let previous = fixed_source(settings, KeySource::Previous)
        .map_err(|_| VaultError::PreviousKeyInvalid(names.previous.clone()))?;

    let mut mismatch_overridden = Vec::new();

    let pairs = [
        (primary, KeySource::Primary, KeySource::PrimaryAlt),
        (previous, KeySource::Previous, KeySource::PreviousAlt),
    ];
    for (fixed_key, fixed, alt) in pairs {
        let (Some(fixed_key), Some(alt_raw)) = (fixed_key, settings.raw(alt)) else {
            continue;
        };
        if !looks_configured(Some(alt_raw)) || alt_matches(&fixed_key, alt_raw) {
            continue;
        }

        if settings.mismatch_allowed() {
            tracing::warn!(
                source = %fixed,
                alt_source = %alt,
                "Key sources resolve to different keys; continuing because mismatch override is set"
            );
            mismatch_overridden.push((fixed, alt));
            continue;
        }

        let (a, b) = (
            names.for_source(fixed).to_string(),
            names.for_source(alt).to_string(),
        );
        return Err(match fixed {
            KeySource::Primary => VaultError::KeyMismatch(a, b),
            _ => VaultError::PreviousKeyMismatch(a, b),
        });
    }

    let effective_source = if configured(KeySource::Primary) {
        KeySource::Primary
    } else {
        KeySource::PrimaryAlt
    };
    let candidates = build_candidates(settings, &[effective_source]);
    let configured_sources = KeySource::ALL
        .into_iter()
        .filter(|s| configured(*s))
        .collect();

    let report = KeyConfigReport {
        effective_source,
        fallback_count: candidates.len().saturating_sub(1),
        configured_sources,
        mismatch_overridden,
    };

    tracing::debug!(
        effective_source = %report.effective_source,
        fallback_count = report.fallback_count,
        "Key configuration validated"
    );
    Ok(report)
}

/// `Ok(None)` when unset, `Ok(Some)` when valid, `Err` when set but malformed
fn fixed_source(
    settings: &KeySettings,
    source: KeySource,
) -> std::result::Result<Option<KeyMaterial>, ()> {
    let raw = settings.raw(source);
    if !looks_configured(raw) {
        return Ok(None);
    }
    raw.and_then(parse_fixed_key).map(Some).ok_or(())
}

/// Whether an alternate-format value names the same key as the fixed one
fn alt_matches(fixed: &KeyMaterial, alt_raw: &str) -> bool {
    let direct = parse_fixed_key(alt_raw).is_some_and(|k| k.ct_eq(fixed));
    let derived = derive_key_from_passphrase(alt_raw).is_some_and(|k| k.ct_eq(fixed));
    direct | derived
}
