// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query runner
//!
//! Single path every remote call goes through. It races the executor against
//! the caller's cancellation token, retries exactly once after refreshing the
//! credential when the executor reports an expired token, and attaches the
//! database and operation to every other failure.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::executor::{ExecutorError, QueryExecutor, ResultTable};
use crate::token::TokenCache;

const DEFAULT_DATABASE_LABEL: &str = "<default>";

pub struct QueryRunner {
    executor: Arc<dyn QueryExecutor>,
    tokens: Option<Arc<TokenCache>>,
    /// Key the credential is cached under, usually the cluster URI
    token_owner: String,
    log_queries: bool,
}

impl QueryRunner {
    pub fn new(executor: Arc<dyn QueryExecutor>, token_owner: impl Into<String>) -> Self {
        Self {
            executor,
            tokens: None,
            token_owner: token_owner.into(),
            log_queries: false,
        }
    }

    /// Builder method: refresh credentials through `tokens` on expiry
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Builder method: log query text at debug level
    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Run `query` against `database`.
    ///
    /// `operation` names the call in error messages.
    pub async fn run(
        &self,
        query: &str,
        database: Option<&str>,
        operation: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<ResultTable> {
        if self.log_queries {
            debug!(
                "Executing '{}' on {}: {}",
                operation,
                database.unwrap_or(DEFAULT_DATABASE_LABEL),
                query
            );
        }

        match self.execute_once(query, database, cancel).await {
            Err(ExecutorError::Unauthorized(message)) => {
                warn!(
                    "'{}' was rejected as unauthorized, refreshing credentials and retrying once",
                    operation
                );
                self.refresh_credentials(message).await?;
                self.execute_once(query, database, cancel)
                    .await
                    .map_err(|e| Self::map_error(e, database, operation))
            }
            result => result.map_err(|e| Self::map_error(e, database, operation)),
        }
    }

    async fn execute_once(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultTable, ExecutorError> {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
            result = self.executor.execute(query, database, cancel) => result,
        }
    }

    async fn refresh_credentials(&self, unauthorized: String) -> CatalogResult<()> {
        let Some(tokens) = &self.tokens else {
            return Err(CatalogError::Unauthorized(unauthorized));
        };
        let token = tokens.refresh(&self.token_owner).await?;
        self.executor.update_token(&token).await;
        Ok(())
    }

    fn map_error(error: ExecutorError, database: Option<&str>, operation: &str) -> CatalogError {
        match error {
            ExecutorError::Unauthorized(message) => CatalogError::Unauthorized(message),
            ExecutorError::Cancelled => CatalogError::Cancelled,
            ExecutorError::Failed(message) => CatalogError::data_access(
                database.unwrap_or(DEFAULT_DATABASE_LABEL),
                operation,
                message,
            ),
        }
    }
}
