// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Credential cache
//!
//! [`TokenCache`] maps an owner key to `(expiry, token)`. A missing or expired
//! entry is loaded lazily from the [`TokenProvider`]. The cache is an ordinary
//! value owned by whoever constructs it and handed to the data sources that
//! need it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CatalogResult;

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Token valid for `ttl` from now
    pub fn expiring_in(token: impl Into<String>, ttl: Duration) -> Self {
        Self::new(token, Instant::now() + ttl)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Acquires fresh credentials for an owner (usually the cluster URI)
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self, owner: &str) -> CatalogResult<AccessToken>;
}

/// Owned token cache with lazy load on miss and eviction on expiry
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    entries: RwLock<HashMap<String, AccessToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached token for `owner`, acquiring a new one if absent or expired
    pub async fn get(&self, owner: &str) -> CatalogResult<String> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(owner) {
                if !entry.is_expired() {
                    return Ok(entry.token.clone());
                }
            }
        }

        debug!("Token cache miss for {}", owner);
        let fresh = self.provider.acquire_token(owner).await?;
        let token = fresh.token.clone();
        self.entries.write().await.insert(owner.to_string(), fresh);
        Ok(token)
    }

    /// Drop the cached token for `owner` and acquire a new one.
    ///
    /// Expired tokens of other owners are evicted on the way.
    pub async fn refresh(&self, owner: &str) -> CatalogResult<String> {
        {
            let mut entries = self.entries.write().await;
            entries.remove(owner);
            entries.retain(|_, entry| !entry.is_expired());
        }
        self.get(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        ttl: Duration,
    }

    impl CountingProvider {
        fn new(ttl: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ttl,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn acquire_token(&self, owner: &str) -> CatalogResult<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::expiring_in(format!("{owner}-{n}"), self.ttl))
        }
    }

    #[tokio::test]
    async fn test_lazy_load_and_reuse() {
        let provider = Arc::new(CountingProvider::new(Duration::from_secs(3600)));
        let cache = TokenCache::new(provider.clone());

        assert_eq!(cache.get("cluster").await.unwrap(), "cluster-1");
        assert_eq!(cache.get("cluster").await.unwrap(), "cluster-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let provider = Arc::new(CountingProvider::new(Duration::ZERO));
        let cache = TokenCache::new(provider.clone());

        assert_eq!(cache.get("cluster").await.unwrap(), "cluster-1");
        assert_eq!(cache.get("cluster").await.unwrap(), "cluster-2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_forces_new_token() {
        let provider = Arc::new(CountingProvider::new(Duration::from_secs(3600)));
        let cache = TokenCache::new(provider.clone());

        cache.get("cluster").await.unwrap();
        assert_eq!(cache.refresh("cluster").await.unwrap(), "cluster-2");
    }

    #[tokio::test]
    async fn test_refresh_evicts_expired_entries() {
        let provider = Arc::new(CountingProvider::new(Duration::ZERO));
        let cache = TokenCache::new(provider);

        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
        assert_eq!(cache.entries.read().await.len(), 2);

        cache.refresh("a").await.unwrap();
        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("a"));
    }
}
