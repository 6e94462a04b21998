//! Server-side shadow of the refresh token.
//!
//! One entry per principal id, value = the currently valid refresh token,
//! TTL = that token's remaining lifetime. Absence means "no active session",
//! which is distinct from "session exists but the presented token does not
//! match" — callers get that distinction through [`TakeOutcome`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use super::PrincipalId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store backend failure: {0}")]
    Backend(String),
}

/// Outcome of a conditional removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TakeOutcome {
    /// The stored value matched and was removed.
    Removed,
    /// An entry exists but holds a different token.
    Mismatch,
    /// No active session for this principal.
    Missing,
}

/// Key/value store holding the single valid refresh token per principal.
///
/// Operations for different principals never interfere. For the same
/// principal, `take_matching` is the rotation primitive: of several
/// concurrent callers presenting the same token, exactly one observes
/// `Removed`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, principal_id: PrincipalId) -> Result<Option<String>, StoreError>;

    /// Store `token` under `principal_id` with the given time-to-live,
    /// overwriting any prior entry.
    async fn put(
        &self,
        principal_id: PrincipalId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete(&self, principal_id: PrincipalId) -> Result<(), StoreError>;

    /// Remove the entry only if it holds exactly `expected`.
    async fn take_matching(
        &self,
        principal_id: PrincipalId,
        expected: &str,
    ) -> Result<TakeOutcome, StoreError>;
}

struct StoredCredential {
    token: String,
    expires_at: Instant,
}

impl StoredCredential {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process store for single-server deployments and tests. An external
/// key/value service slots in behind the same trait.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<PrincipalId, StoredCredential>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, principal_id: PrincipalId) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(&principal_id) {
            Some(entry) if entry.expired() => {
                entries.remove(&principal_id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.token.clone())),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        principal_id: PrincipalId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            principal_id,
            StoredCredential {
                token: token.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, principal_id: PrincipalId) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(&principal_id);
        Ok(())
    }

    async fn take_matching(
        &self,
        principal_id: PrincipalId,
        expected: &str,
    ) -> Result<TakeOutcome, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(&principal_id) {
            Some(entry) if entry.expired() => {
                entries.remove(&principal_id);
                Ok(TakeOutcome::Missing)
            }
            Some(entry) if entry.token == expected => {
                entries.remove(&principal_id);
                Ok(TakeOutcome::Removed)
            }
            Some(_) => Ok(TakeOutcome::Mismatch),
            None => Ok(TakeOutcome::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn put_overwrites_prior_entry() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        store.put(1, "first", TTL).await?;
        store.put(1, "second", TTL).await?;

        assert_eq!(store.get(1).await?.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn entries_are_scoped_per_principal() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        store.put(1, "one", TTL).await?;
        store.put(2, "two", TTL).await?;

        store.delete(1).await?;
        assert_eq!(store.get(1).await?, None);
        assert_eq!(store.get(2).await?.as_deref(), Some("two"));
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        store.put(1, "token", Duration::ZERO).await?;

        assert_eq!(store.get(1).await?, None);
        assert_eq!(
            store.take_matching(1, "token").await?,
            TakeOutcome::Missing
        );
        Ok(())
    }

    #[tokio::test]
    async fn take_matching_removes_only_on_exact_match() -> Result<(), StoreError> {
        let store = MemorySessionStore::new();
        store.put(1, "current", TTL).await?;

        assert_eq!(
            store.take_matching(1, "stale").await?,
            TakeOutcome::Mismatch
        );
        // The mismatch must not disturb the live entry.
        assert_eq!(store.get(1).await?.as_deref(), Some("current"));

        assert_eq!(
            store.take_matching(1, "current").await?,
            TakeOutcome::Removed
        );
        assert_eq!(store.get(1).await?, None);
        assert_eq!(
            store.take_matching(1, "current").await?,
            TakeOutcome::Missing
        );
        Ok(())
    }
}
