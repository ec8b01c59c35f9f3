// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock credential provider for testing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kusto_metadata_catalog::{AccessToken, CatalogError, CatalogResult, TokenProvider};

/// Hands out `"{owner}-token-{n}"`, counting acquisitions
#[derive(Debug)]
pub struct MockTokenProvider {
    ttl: Duration,
    acquisitions: AtomicUsize,
    failing: AtomicBool,
}

impl Default for MockTokenProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl MockTokenProvider {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            acquisitions: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Make every further acquisition fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn acquire_token(&self, owner: &str) -> CatalogResult<AccessToken> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Token(format!("no credential for {owner}")));
        }
        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::expiring_in(
            format!("{owner}-token-{n}"),
            self.ttl,
        ))
    }
}
