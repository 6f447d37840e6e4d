//! Credential repository trait
//!
//! The vault only needs two capabilities from persistence: create a record and
//! find the first record matching a filter.

use async_trait::async_trait;

use super::entity::{CredentialFilter, CredentialRecord, NewCredentialRecord, StoredCredential};
use crate::error::Result;

/// Persistence collaborator for encrypted credentials
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Persist a new record and echo back its metadata
    async fn create(&self, record: &NewCredentialRecord) -> Result<StoredCredential>;

    /// Find the first record matching `filter`
    ///
    /// When the filter carries a tenant, records belonging to any other tenant
    /// must not be returned.
    async fn find_first(&self, filter: &CredentialFilter) -> Result<Option<CredentialRecord>>;
}
