//! Key configuration snapshot
//!
//! [`KeySettings`] is an immutable view of the four raw key sources plus the
//! mismatch override. Everything downstream of it is pure. [`KeySettingsProvider`]
//! is the one place that decides where the snapshot comes from; [`EnvKeySettings`]
//! re-reads the environment on every call so a corrected deployment takes effect
//! without a restart.

use std::env::VarError;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::env::{ReadEnv, SystemEnv};
use crate::domain::security::key::{KeySource, SecureString};

/// Environment variable names for the key sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyEnvNames {
    pub primary: String,
    pub primary_alt: String,
    pub previous: String,
    pub previous_alt: String,
    pub allow_mismatch: String,
}

impl Default for KeyEnvNames {
    fn default() -> Self {
        Self {
            primary: "CREDVAULT_ENCRYPTION_KEY".to_string(),
            primary_alt: "CREDVAULT_ENCRYPTION_KEY_ALT".to_string(),
            previous: "CREDVAULT_ENCRYPTION_KEY_PREVIOUS".to_string(),
            previous_alt: "CREDVAULT_ENCRYPTION_KEY_ALT_PREVIOUS".to_string(),
            allow_mismatch: "CREDVAULT_ALLOW_KEY_MISMATCH".to_string(),
        }
    }
}

impl KeyEnvNames {
    /// Variable name backing a key source
    pub fn for_source(&self, source: KeySource) -> &str {
        match source {
            KeySource::Primary => &self.primary,
            KeySource::PrimaryAlt => &self.primary_alt,
            KeySource::Previous => &self.previous,
            KeySource::PreviousAlt => &self.previous_alt,
        }
    }
}

/// Raw key sources and flags at one point in time
#[derive(Debug, Clone, Default)]
pub struct KeySettings {
    names: KeyEnvNames,
    primary: Option<SecureString>,
    primary_alt: Option<SecureString>,
    previous: Option<SecureString>,
    previous_alt: Option<SecureString>,
    allow_mismatch: bool,
}

impl KeySettings {
    /// Empty settings using the given variable names for diagnostics
    pub fn new(names: KeyEnvNames) -> Self {
        Self {
            names,
            ..Default::default()
        }
    }

    /// Read a snapshot from an environment
    pub fn from_env<E: ReadEnv + ?Sized>(env: &E, names: &KeyEnvNames) -> Self {
        let read = |name: &str| match env.var(name) {
            Ok(value) => Some(SecureString::new(value)),
            // Set but not UTF-8 still counts as configured
            Err(VarError::NotUnicode(raw)) => {
                Some(SecureString::new(raw.to_string_lossy().into_owned()))
            }
            Err(VarError::NotPresent) => None,
        };
        Self {
            primary: read(&names.primary),
            primary_alt: read(&names.primary_alt),
            previous: read(&names.previous),
            previous_alt: read(&names.previous_alt),
            allow_mismatch: env
                .var(&names.allow_mismatch)
                .map(|v| parse_override_flag(&v))
                .unwrap_or(false),
            names: names.clone(),
        }
    }

    pub fn with_source(mut self, source: KeySource, raw: impl Into<String>) -> Self {
        let value = Some(SecureString::new(raw));
        match source {
            KeySource::Primary => self.primary = value,
            KeySource::PrimaryAlt => self.primary_alt = value,
            KeySource::Previous => self.previous = value,
            KeySource::PreviousAlt => self.previous_alt = value,
        }
        self
    }

    pub fn with_primary(self, raw: impl Into<String>) -> Self {
        self.with_source(KeySource::Primary, raw)
    }

    pub fn with_primary_alt(self, raw: impl Into<String>) -> Self {
        self.with_source(KeySource::PrimaryAlt, raw)
    }

    pub fn with_previous(self, raw: impl Into<String>) -> Self {
        self.with_source(KeySource::Previous, raw)
    }

    pub fn with_previous_alt(self, raw: impl Into<String>) -> Self {
        self.with_source(KeySource::PreviousAlt, raw)
    }

    pub fn allow_mismatch(mut self, allow: bool) -> Self {
        self.allow_mismatch = allow;
        self
    }

    /// Raw value of a source, if set
    pub fn raw(&self, source: KeySource) -> Option<&str> {
        let value = match source {
            KeySource::Primary => &self.primary,
            KeySource::PrimaryAlt => &self.primary_alt,
            KeySource::Previous => &self.previous,
            KeySource::PreviousAlt => &self.previous_alt,
        };
        value.as_ref().map(SecureString::as_str)
    }

    pub fn mismatch_allowed(&self) -> bool {
        self.allow_mismatch
    }

    pub fn names(&self) -> &KeyEnvNames {
        &self.names
    }
}

/// Only the string "true" (any case, surrounding whitespace ignored) enables the override
pub fn parse_override_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Accessor for the current key configuration
pub trait KeySettingsProvider: Send + Sync {
    fn current(&self) -> KeySettings;
}

impl KeySettingsProvider for KeySettings {
    fn current(&self) -> KeySettings {
        self.clone()
    }
}

impl<P: KeySettingsProvider + ?Sized> KeySettingsProvider for Arc<P> {
    fn current(&self) -> KeySettings {
        (**self).current()
    }
}

/// Reads key settings from an environment on every call
#[derive(Debug, Clone)]
pub struct EnvKeySettings<E = SystemEnv> {
    env: E,
    names: KeyEnvNames,
}

impl EnvKeySettings<SystemEnv> {
    /// Process environment with default variable names
    pub fn system() -> Self {
        Self::new(SystemEnv, KeyEnvNames::default())
    }
}

impl<E: ReadEnv> EnvKeySettings<E> {
    pub fn new(env: E, names: KeyEnvNames) -> Self {
        Self { env, names }
    }
}

impl<E: ReadEnv + Send + Sync> KeySettingsProvider for EnvKeySettings<E> {
    fn current(&self) -> KeySettings {
        KeySettings::from_env(&self.env, &self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::InMemoryEnv;

    #[test]
    fn test_override_flag_parsing() {
        assert!(parse_override_flag("true"));
        assert!(parse_override_flag("TRUE"));
        assert!(parse_override_flag(" True "));
        assert!(!parse_override_flag("1"));
        assert!(!parse_override_flag("yes"));
        assert!(!parse_override_flag(""));
    }

    #[test]
    fn test_from_env_reads_all_sources() {
        let env = InMemoryEnv::new();
        let names = KeyEnvNames::default();
        env.set(&names.primary, "p");
        env.set(&names.previous_alt, "q");
        env.set(&names.allow_mismatch, "true");

        let settings = KeySettings::from_env(&env, &names);
        assert_eq!(settings.raw(KeySource::Primary), Some("p"));
        assert_eq!(settings.raw(KeySource::PrimaryAlt), None);
        assert_eq!(settings.raw(KeySource::PreviousAlt), Some("q"));
        assert!(settings.mismatch_allowed());
    }

    #[test]
    fn test_env_provider_rereads_on_every_call() {
        let env = Arc::new(InMemoryEnv::new());
        let provider = EnvKeySettings::new(Arc::clone(&env), KeyEnvNames::default());
        assert!(provider.current().raw(KeySource::Primary).is_none());

        env.set("CREDVAULT_ENCRYPTION_KEY", "later");
        assert_eq!(provider.current().raw(KeySource::Primary), Some("later"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_key_is_invalid_not_missing() {
        use crate::domain::security::validate_key_configuration;
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        struct NonUnicodeEnv;

        impl ReadEnv for NonUnicodeEnv {
            fn var(&self, key: &str) -> Result<String, VarError> {
                if key == "CREDVAULT_ENCRYPTION_KEY" {
                    Err(VarError::NotUnicode(OsString::from_vec(vec![0x66, 0xff, 0x6f])))
                } else {
                    Err(VarError::NotPresent)
                }
            }
        }

        let settings = KeySettings::from_env(&NonUnicodeEnv, &KeyEnvNames::default());
        assert!(settings.raw(KeySource::Primary).is_some());

        let err = validate_key_configuration(&settings).unwrap_err();
        assert_eq!(err.code(), "PRIMARY_KEY_INVALID");
    }

    #[test]
    fn test_names_for_source() {
        let names = KeyEnvNames::default();
        assert_eq!(
            names.for_source(KeySource::PreviousAlt),
            "CREDVAULT_ENCRYPTION_KEY_ALT_PREVIOUS"
        );
    }
}
