//! SQLite-backed credential repository
//!
//! Persists encrypted credentials with parameterized queries. Encryption and
//! decryption happen in the domain layer; rows only ever hold ciphertext.

use crate::domain::security::{
    CredentialFilter, CredentialRecord, CredentialRepository, EncryptedPayload,
    NewCredentialRecord, StoredCredential,
};
use crate::error::{Result, VaultError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// SQL to create the credentials table
pub const CREATE_CREDENTIALS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id TEXT PRIMARY KEY NOT NULL,
        secret_ref TEXT NOT NULL UNIQUE,
        tenant_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        integration_id TEXT,
        kind TEXT NOT NULL DEFAULT 'GENERIC',
        secret_enc TEXT NOT NULL,
        meta TEXT NOT NULL DEFAULT '{}',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        rotated_at TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_credentials_tenant ON credentials(tenant_id);
    CREATE INDEX IF NOT EXISTS idx_credentials_tenant_provider ON credentials(tenant_id, provider);
"#;

/// SQLite-backed implementation of CredentialRepository
#[derive(Debug, Clone)]
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the credentials table if it doesn't exist
    ///
    /// Only needed when the pool did not come from a migrated `Database`.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_CREDENTIALS_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::Storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<CredentialRecord> {
        let id_str: String = row.try_get("id")?;
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| VaultError::Storage(format!("Invalid credential id: {}", e)))?;
        let meta_str: String = row.try_get("meta")?;

        Ok(CredentialRecord {
            id,
            secret_ref: row.try_get("secret_ref")?,
            tenant_id: row.try_get("tenant_id")?,
            provider: row.try_get("provider")?,
            integration_id: row.try_get("integration_id")?,
            kind: row.try_get("kind")?,
            secret_enc: EncryptedPayload::new(row.try_get::<String, _>("secret_enc")?),
            meta: serde_json::from_str(&meta_str)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            rotated_at: row.try_get("rotated_at")?,
        })
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn create(&self, record: &NewCredentialRecord) -> Result<StoredCredential> {
        let full = CredentialRecord::from_new(record, Utc::now());
        let meta = serde_json::to_string(&full.meta)?;

        sqlx::query(
            r#"
            INSERT INTO credentials (id, secret_ref, tenant_id, provider, integration_id, kind, secret_enc, meta, created_at, updated_at, rotated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(full.id.to_string())
        .bind(&full.secret_ref)
        .bind(&full.tenant_id)
        .bind(&full.provider)
        .bind(&full.integration_id)
        .bind(&full.kind)
        .bind(full.secret_enc.as_str())
        .bind(meta)
        .bind(full.created_at)
        .bind(full.updated_at)
        .bind(full.rotated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::Storage(format!("Failed to store credential: {}", e)))?;

        Ok(full.metadata())
    }

    async fn find_first(&self, filter: &CredentialFilter) -> Result<Option<CredentialRecord>> {
        let row = match &filter.tenant_id {
            Some(tenant_id) => {
                sqlx::query("SELECT * FROM credentials WHERE secret_ref = ? AND tenant_id = ? LIMIT 1")
                    .bind(&filter.secret_ref)
                    .bind(tenant_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM credentials WHERE secret_ref = ? LIMIT 1")
                    .bind(&filter.secret_ref)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| VaultError::Storage(format!("Failed to find credential: {}", e)))?;

        row.map(Self::row_to_record).transpose()
    }
}

/// In-memory credential repository
///
/// Nothing survives the process. Meant for tests and embedders that bring their
/// own persistence later.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    records: std::sync::Mutex<Vec<CredentialRecord>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<CredentialRecord>>> {
        self.records
            .lock()
            .map_err(|_| VaultError::Storage("credential store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn create(&self, record: &NewCredentialRecord) -> Result<StoredCredential> {
        let mut records = self.lock()?;
        if records.iter().any(|r| r.secret_ref == record.secret_ref) {
            return Err(VaultError::Storage(format!(
                "Credential {} already exists",
                record.secret_ref
            )));
        }
        let full = CredentialRecord::from_new(record, Utc::now());
        let metadata = full.metadata();
        records.push(full);
        Ok(metadata)
    }

    async fn find_first(&self, filter: &CredentialFilter) -> Result<Option<CredentialRecord>> {
        Ok(self.lock()?.iter().find(|r| filter.matches(r)).cloned())
    }
}
