//! In-memory TTL store for authorization state entries.
//!
//! Backed by a `DashMap`; `remove` gives the atomic take-and-delete the
//! single-use guarantee rests on. Expired entries are dropped lazily on
//! lookup, so an abandoned round-trip costs one small map entry until its
//! key is touched again or the process restarts.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use postbridge_core::ports::StateStore;
use postbridge_domain::{ConnectError, Result, StateData};
use tracing::debug;

struct Entry {
    data: StateData,
    expires_at: DateTime<Utc>,
}

/// Process-local state store.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired, not yet reaped) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, state: &str, data: StateData, ttl_secs: i64) -> Result<()> {
        let entry = Entry { data, expires_at: Utc::now() + Duration::seconds(ttl_secs) };
        self.entries.insert(state.to_string(), entry);
        Ok(())
    }

    async fn verify_and_consume(&self, state: &str) -> Result<StateData> {
        // remove() is the linearization point: exactly one concurrent
        // caller gets the entry.
        let Some((_, entry)) = self.entries.remove(state) else {
            return Err(ConnectError::StateVerification(
                "state not found, already used, or expired".into(),
            ));
        };

        if entry.expires_at < Utc::now() {
            debug!("state entry expired before use");
            return Err(ConnectError::StateVerification(
                "state not found, already used, or expired".into(),
            ));
        }

        Ok(entry.data)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-memory state store.
    use std::sync::Arc;

    use postbridge_domain::Platform;

    use super::*;

    /// Validates a normal put/consume round-trip.
    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryStateStore::new();
        let data = StateData::new(Platform::Google, Some("u1".into()))
            .with_pkce_verifier("verifier".into());
        store.put("abc", data, 3600).await.unwrap();

        let out = store.verify_and_consume("abc").await.unwrap();
        assert_eq!(out.platform, Platform::Google);
        assert_eq!(out.pkce_verifier.as_deref(), Some("verifier"));
        assert!(store.is_empty());
    }

    /// Validates single use: the second consume of the same state fails.
    #[tokio::test]
    async fn test_single_use() {
        let store = InMemoryStateStore::new();
        store.put("abc", StateData::new(Platform::Facebook, None), 3600).await.unwrap();

        store.verify_and_consume("abc").await.unwrap();
        let second = store.verify_and_consume("abc").await;
        assert!(matches!(second, Err(ConnectError::StateVerification(_))));
    }

    /// Validates that unknown states are rejected.
    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let store = InMemoryStateStore::new();
        let result = store.verify_and_consume("never-issued").await;
        assert!(matches!(result, Err(ConnectError::StateVerification(_))));
    }

    /// Validates TTL expiry: an entry past its TTL is rejected and reaped.
    #[tokio::test]
    async fn test_expired_entry_rejected() {
        let store = InMemoryStateStore::new();
        store.put("abc", StateData::new(Platform::Linkedin, None), -1).await.unwrap();

        let result = store.verify_and_consume("abc").await;
        assert!(matches!(result, Err(ConnectError::StateVerification(_))));
        assert!(store.is_empty());
    }

    /// Validates at-most-once consumption under concurrent duplicate
    /// delivery: exactly one of N racing consumers succeeds.
    #[tokio::test]
    async fn test_concurrent_consumers_one_winner() {
        let store = Arc::new(InMemoryStateStore::new());
        store.put("raced", StateData::new(Platform::Tiktok, None), 3600).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.verify_and_consume("raced").await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
