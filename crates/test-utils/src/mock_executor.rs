// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock query executor for testing
//!
//! Responses are scripted by query prefix and optionally by database. Every
//! call is recorded so tests can assert how many remote round trips a cache
//! operation caused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kusto_metadata_catalog::{CancellationToken, ExecutorError, QueryExecutor, ResultTable};

/// One call the executor received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub query: String,
    pub database: Option<String>,
}

#[derive(Debug, Clone)]
struct ScriptedResponse {
    prefix: String,
    database: Option<String>,
    outcome: Result<ResultTable, ExecutorError>,
}

impl ScriptedResponse {
    fn matches(&self, query: &str, database: Option<&str>) -> bool {
        query.starts_with(&self.prefix)
            && match &self.database {
                Some(expected) => database == Some(expected.as_str()),
                None => true,
            }
    }

    // Database-scoped responses beat unscoped ones, then longer prefixes win.
    fn specificity(&self) -> (bool, usize) {
        (self.database.is_some(), self.prefix.len())
    }
}

/// In-memory [`QueryExecutor`] with scripted responses
#[derive(Debug, Default)]
pub struct MockQueryExecutor {
    responses: Vec<ScriptedResponse>,
    blocking_prefixes: Vec<String>,
    delay: Option<Duration>,
    unauthorized_failures: AtomicUsize,
    calls: Mutex<Vec<RecordedQuery>>,
    tokens: Mutex<Vec<String>>,
}

impl MockQueryExecutor {
    pub fn builder() -> MockQueryExecutorBuilder {
        MockQueryExecutorBuilder::default()
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<RecordedQuery> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of calls whose query starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.query.starts_with(prefix))
            .count()
    }

    /// Tokens pushed through [`QueryExecutor::update_token`]
    pub fn tokens(&self) -> Vec<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reject the next `count` calls as unauthorized
    pub fn fail_unauthorized(&self, count: usize) {
        self.unauthorized_failures.store(count, Ordering::SeqCst);
    }

    fn take_unauthorized(&self) -> bool {
        self.unauthorized_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn response_for(
        &self,
        query: &str,
        database: Option<&str>,
    ) -> Result<ResultTable, ExecutorError> {
        self.responses
            .iter()
            .filter(|response| response.matches(query, database))
            .max_by_key(|response| response.specificity())
            .map(|response| response.outcome.clone())
            .unwrap_or_else(|| {
                Err(ExecutorError::Failed(format!(
                    "no response scripted for '{query}'"
                )))
            })
    }
}

#[async_trait]
impl QueryExecutor for MockQueryExecutor {
    async fn execute(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultTable, ExecutorError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedQuery {
                query: query.to_string(),
                database: database.map(str::to_string),
            });

        if self.take_unauthorized() {
            return Err(ExecutorError::Unauthorized("token expired".to_string()));
        }

        if self
            .blocking_prefixes
            .iter()
            .any(|prefix| query.starts_with(prefix))
        {
            cancel.cancelled().await;
            return Err(ExecutorError::Cancelled);
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.response_for(query, database)
    }

    async fn update_token(&self, token: &str) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(token.to_string());
    }
}

/// Builder for [`MockQueryExecutor`] with a fluent API
#[derive(Debug, Default)]
pub struct MockQueryExecutorBuilder {
    executor: MockQueryExecutor,
}

impl MockQueryExecutorBuilder {
    /// Answer queries starting with `prefix` on any database
    pub fn respond(mut self, prefix: impl Into<String>, table: ResultTable) -> Self {
        self.push(prefix.into(), None, Ok(table));
        self
    }

    /// Answer queries starting with `prefix` on `database` only
    pub fn respond_on(
        mut self,
        database: impl Into<String>,
        prefix: impl Into<String>,
        table: ResultTable,
    ) -> Self {
        self.push(prefix.into(), Some(database.into()), Ok(table));
        self
    }

    /// Fail queries starting with `prefix`
    pub fn fail(mut self, prefix: impl Into<String>, error: ExecutorError) -> Self {
        self.push(prefix.into(), None, Err(error));
        self
    }

    /// Fail queries starting with `prefix` on `database` only
    pub fn fail_on(
        mut self,
        database: impl Into<String>,
        prefix: impl Into<String>,
        error: ExecutorError,
    ) -> Self {
        self.push(prefix.into(), Some(database.into()), Err(error));
        self
    }

    /// Queries starting with `prefix` wait until cancelled
    pub fn block(mut self, prefix: impl Into<String>) -> Self {
        self.executor.blocking_prefixes.push(prefix.into());
        self
    }

    /// Sleep before every response
    pub fn delay(mut self, delay: Duration) -> Self {
        self.executor.delay = Some(delay);
        self
    }

    /// Reject the first `count` calls as unauthorized
    pub fn unauthorized_first(self, count: usize) -> Self {
        self.executor.fail_unauthorized(count);
        self
    }

    pub fn build(self) -> MockQueryExecutor {
        self.executor
    }

    fn push(
        &mut self,
        prefix: String,
        database: Option<String>,
        outcome: Result<ResultTable, ExecutorError>,
    ) {
        self.executor.responses.push(ScriptedResponse {
            prefix,
            database,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count(n: i64) -> ResultTable {
        ResultTable::new(["Count"]).with_row(vec![json!(n)])
    }

    #[tokio::test]
    async fn test_most_specific_response_wins() {
        let executor = MockQueryExecutor::builder()
            .respond(".show", count(1))
            .respond(".show tables", count(2))
            .respond_on("Samples", ".show", count(3))
            .build();
        let cancel = CancellationToken::new();

        let any = executor.execute(".show tables | count", None, &cancel).await;
        let scoped = executor
            .execute(".show tables | count", Some("Samples"), &cancel)
            .await;

        assert_eq!(any, Ok(count(2)));
        assert_eq!(scoped, Ok(count(3)));
        assert_eq!(executor.call_count(".show tables"), 2);
    }

    #[tokio::test]
    async fn test_unscripted_query_fails() {
        let executor = MockQueryExecutor::builder().build();
        let result = executor
            .execute("Events | take 1", None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ExecutorError::Failed(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_injection_is_consumed() {
        let executor = MockQueryExecutor::builder()
            .respond(".show", count(0))
            .unauthorized_first(1)
            .build();
        let cancel = CancellationToken::new();

        let first = executor.execute(".show tables", None, &cancel).await;
        let second = executor.execute(".show tables", None, &cancel).await;

        assert!(matches!(first, Err(ExecutorError::Unauthorized(_))));
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_blocking_query_returns_on_cancel() {
        let executor = MockQueryExecutor::builder().block(".show").build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor.execute(".show tables", None, &cancel).await;
        assert_eq!(result, Err(ExecutorError::Cancelled));
    }
}
