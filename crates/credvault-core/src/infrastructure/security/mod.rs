//! Security infrastructure
//!
//! Persistence implementations for the credential vault.

mod sqlite_credential_repository;

pub use sqlite_credential_repository::{
    CREATE_CREDENTIALS_TABLE_SQL, InMemoryCredentialRepository, SqliteCredentialRepository,
};
