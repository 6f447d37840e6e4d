//! Credvault Core Integration Tests
//!
//! Drives the public API end to end against a SQLite file in a temp directory.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use credvault_core::{
    VaultError,
    config::{EnvKeySettings, InMemoryEnv, KeyEnvNames, KeySettings},
    domain::security::{
        CipherAdapter, CredentialVault, EncryptedPayload, KeyCandidate, KeyMaterial, KeySource,
        StoreCredentialRequest, find_loose_credentials, validate_key_configuration,
    },
    infrastructure::security::SqliteCredentialRepository,
    storage::{Database, DatabaseConfig},
};
use serde_json::json;
use tempfile::TempDir;

async fn open_database(dir: &TempDir) -> Database {
    Database::new(DatabaseConfig::with_path(dir.path().join("credentials.db")))
        .await
        .expect("Failed to open database")
}

fn settings(primary: &KeyMaterial) -> KeySettings {
    KeySettings::new(KeyEnvNames::default()).with_primary(primary.to_hex())
}

#[test]
fn test_round_trip() {
    let cipher = CipherAdapter::from_settings(&settings(&KeyMaterial::generate())).unwrap();
    let long = "long".repeat(1000);
    for plaintext in ["x", "sk_live_51H8", "ünïcødé ✓", long.as_str()] {
        let payload = cipher.encrypt(plaintext).unwrap();
        assert_eq!(cipher.decrypt(&payload).unwrap(), plaintext);
    }
}

#[test]
fn test_rotation_transparency() {
    let previous = KeyMaterial::generate();
    let primary = KeyMaterial::generate();

    let old_cipher = CipherAdapter::new(vec![KeyCandidate::new(KeySource::Primary, previous.clone())]);
    let payload = old_cipher.encrypt("written before rotation").unwrap();

    let rotated = CipherAdapter::new(vec![
        KeyCandidate::new(KeySource::Primary, primary.clone()),
        KeyCandidate::new(KeySource::Previous, previous),
    ]);
    assert_eq!(rotated.decrypt(&payload).unwrap(), "written before rotation");

    let primary_only = CipherAdapter::new(vec![KeyCandidate::new(KeySource::Primary, primary)]);
    let err = primary_only.decrypt(&payload).unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed { attempts: 1, .. }));
}

#[test]
fn test_ciphertext_is_non_deterministic() {
    let cipher = CipherAdapter::from_settings(&settings(&KeyMaterial::generate())).unwrap();
    let first = cipher.encrypt("same plaintext").unwrap();
    let second = cipher.encrypt("same plaintext").unwrap();
    assert_ne!(first, second);
    assert_eq!(cipher.decrypt(&first).unwrap(), "same plaintext");
    assert_eq!(cipher.decrypt(&second).unwrap(), "same plaintext");
}

#[test]
fn test_tamper_detection() {
    let cipher = CipherAdapter::from_settings(&settings(&KeyMaterial::generate())).unwrap();
    let payload = cipher.encrypt("do not touch").unwrap();
    let frame = STANDARD.decode(payload.as_str()).unwrap();

    for index in 0..frame.len() {
        let mut tampered = frame.clone();
        tampered[index] ^= 0x01;
        let tampered = EncryptedPayload::new(STANDARD.encode(&tampered));
        assert!(
            cipher.decrypt(&tampered).is_err(),
            "flipping byte {} went undetected",
            index
        );
    }
}

#[tokio::test]
async fn test_vault_opacity() {
    let dir = TempDir::new().unwrap();
    let db = open_database(&dir).await;
    let vault = CredentialVault::new(
        Arc::new(SqliteCredentialRepository::new(db.pool().clone())),
        Arc::new(settings(&KeyMaterial::generate())),
    );

    let stored = vault
        .store_credential(
            StoreCredentialRequest::new("tenant-1", "stripe", "sk_live_opaque_value")
                .integration("int-42")
                .kind("API_KEY"),
        )
        .await
        .unwrap();

    let rendered = serde_json::to_string(&stored).unwrap();
    assert!(!rendered.contains("sk_live_opaque_value"));
    let id = stored.secret_ref.strip_prefix("vault://credential/").unwrap();
    assert!(!id.is_empty());

    let (secret_enc,): (String,) = sqlx::query_as("SELECT secret_enc FROM credentials WHERE id = ?")
        .bind(stored.id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(!secret_enc.contains("sk_live_opaque_value"));
}

#[tokio::test]
async fn test_tenant_isolation() {
    let dir = TempDir::new().unwrap();
    let db = open_database(&dir).await;
    let vault = CredentialVault::new(
        Arc::new(SqliteCredentialRepository::new(db.pool().clone())),
        Arc::new(settings(&KeyMaterial::generate())),
    );

    let stored = vault
        .store_credential(StoreCredentialRequest::new("tenant-b", "github", "ghp_b"))
        .await
        .unwrap();

    let as_a = vault
        .resolve_credential(&stored.secret_ref, Some("tenant-a"))
        .await
        .unwrap();
    assert!(as_a.is_none());

    let as_b = vault
        .resolve_credential(&stored.secret_ref, Some("tenant-b"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(as_b.secret, json!("ghp_b"));
}

#[test]
fn test_guard_completeness() {
    let payload = json!({
        "settings": { "accessToken": "abc", "nested": { "api_key": "xyz" } },
        "config": { "notSecret": "ok" }
    });
    assert_eq!(
        find_loose_credentials(&payload),
        vec!["settings.accessToken", "settings.nested.api_key"]
    );
}

#[test]
fn test_guard_exemptions() {
    let payload = json!({
        "settings": {
            "accessToken": "vault://credential/123",
            "token": { "secretRef": "vault://credential/456" }
        }
    });
    assert!(find_loose_credentials(&payload).is_empty());
}

#[test]
fn test_mismatch_gate() {
    let diverged = KeySettings::new(KeyEnvNames::default())
        .with_primary(KeyMaterial::generate().to_hex())
        .with_primary_alt(KeyMaterial::generate().to_base64());

    match validate_key_configuration(&diverged) {
        Err(VaultError::KeyMismatch(a, b)) => {
            assert_eq!(a, "CREDVAULT_ENCRYPTION_KEY");
            assert_eq!(b, "CREDVAULT_ENCRYPTION_KEY_ALT");
        }
        other => panic!("expected KeyMismatch, got {:?}", other),
    }

    let report = validate_key_configuration(&diverged.allow_mismatch(true)).unwrap();
    assert!(report.has_warnings());
    assert_eq!(report.effective_source, KeySource::Primary);
}

#[test]
fn test_missing_key_gate() {
    let empty = KeySettings::new(KeyEnvNames::default());
    let err = validate_key_configuration(&empty).unwrap_err();
    assert_eq!(err.code(), "KEY_MISSING");
}

#[tokio::test]
async fn test_rotation_across_restart() {
    let dir = TempDir::new().unwrap();
    let names = KeyEnvNames::default();
    let env = Arc::new(InMemoryEnv::new());
    let old_key = KeyMaterial::generate();
    env.set(names.primary.clone(), old_key.to_hex());

    let stored = {
        let db = open_database(&dir).await;
        let vault = CredentialVault::new(
            Arc::new(SqliteCredentialRepository::new(db.pool().clone())),
            Arc::new(EnvKeySettings::new(env.clone(), names.clone())),
        );
        let stored = vault
            .store_credential(
                StoreCredentialRequest::new("t", "google", json!({ "refresh": "r1", "expires": 3600 }))
                    .meta(json!({ "scopes": ["drive"] })),
            )
            .await
            .unwrap();
        db.close().await;
        stored
    };

    env.set(names.primary.clone(), KeyMaterial::generate().to_base64());
    env.set(names.previous.clone(), old_key.to_hex());

    let db = open_database(&dir).await;
    let vault = CredentialVault::new(
        Arc::new(SqliteCredentialRepository::new(db.pool().clone())),
        Arc::new(EnvKeySettings::new(env, names)),
    );
    let resolved = vault
        .resolve_credential(&stored.secret_ref, Some("t"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.secret, json!({ "refresh": "r1", "expires": 3600 }));
    assert_eq!(resolved.meta, json!({ "scopes": ["drive"] }));
    assert_eq!(resolved.metadata.provider, "google");
}
