// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data source facade
//!
//! The [`DataSource`] trait is what the transport layer talks to. It is
//! object-safe so handlers can hold an `Arc<dyn DataSource>`; the generic
//! typed-query helpers live on [`KustoDataSource`] only.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{DatabaseChildren, MetadataCache};
use crate::error::{CatalogError, CatalogResult};
use crate::executor::{QueryExecutor, ResultTable};
use crate::metadata::{MetadataObject, MetadataType};
use crate::resolver::ChildResolver;
use crate::runner::QueryRunner;
use crate::token::TokenCache;

/// Metadata access for one cluster connection
///
/// # Examples
///
/// ```rust,ignore
/// use kusto_metadata_catalog::DataSource;
/// use tokio_util::sync::CancellationToken;
///
/// async fn print_tree(source: &dyn DataSource) -> kusto_metadata_catalog::CatalogResult<()> {
///     let cancel = CancellationToken::new();
///     for db in source.get_child_objects(source.cluster(), &cancel).await? {
///         for child in source.get_child_objects(&db, &cancel).await? {
///             println!("{}", child.urn());
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Root object of the hierarchy
    fn cluster(&self) -> &MetadataObject;

    /// Database queries default to, if any
    fn database_name(&self) -> Option<String>;

    /// Ordered children of `parent`.
    ///
    /// Leaves yield an empty list, never an error.
    async fn get_child_objects(
        &self,
        parent: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>>;

    /// Whether `object` exists remotely.
    ///
    /// Only databases can be checked; other kinds are rejected with
    /// [`CatalogError::InvalidArgument`].
    async fn exists(
        &self,
        object: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool>;

    /// Drop everything cached
    fn refresh(&self);

    /// Drop what is cached for `object`
    fn refresh_object(&self, object: &MetadataObject);

    /// Switch the active database and forget its cached schema
    fn update_database(&self, database: &str);

    /// Run an arbitrary query and return the first result table
    async fn execute_query(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<ResultTable>;
}

/// Builder for [`KustoDataSource`]
pub struct KustoDataSourceBuilder {
    cluster: String,
    database: Option<String>,
    executor: Arc<dyn QueryExecutor>,
    tokens: Option<Arc<TokenCache>>,
    log_queries: bool,
}

impl KustoDataSourceBuilder {
    pub fn database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.trim().is_empty()).then_some(database);
        self
    }

    pub fn token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn build(self) -> KustoDataSource {
        let cluster = MetadataObject::cluster(self.cluster);
        let mut runner = QueryRunner::new(self.executor, cluster.name())
            .with_query_logging(self.log_queries);
        if let Some(tokens) = self.tokens {
            runner = runner.with_token_cache(tokens);
        }
        let runner = Arc::new(runner);
        let cache = Arc::new(MetadataCache::new());

        KustoDataSource {
            resolver: ChildResolver::new(cluster, Arc::clone(&cache), Arc::clone(&runner)),
            cache,
            runner,
            database: RwLock::new(self.database),
        }
    }
}

/// [`DataSource`] backed by a Kusto cluster
pub struct KustoDataSource {
    resolver: ChildResolver,
    cache: Arc<MetadataCache>,
    runner: Arc<QueryRunner>,
    database: RwLock<Option<String>>,
}

impl KustoDataSource {
    /// Start building a data source for `cluster` (a canonical URI)
    pub fn builder(
        cluster: impl Into<String>,
        executor: Arc<dyn QueryExecutor>,
    ) -> KustoDataSourceBuilder {
        KustoDataSourceBuilder {
            cluster: cluster.into(),
            database: None,
            executor,
            tokens: None,
            log_queries: false,
        }
    }

    /// Database object of this cluster; no remote call is made
    pub fn database_object(&self, name: &str) -> MetadataObject {
        MetadataObject::database(self.cluster(), name, "")
    }

    /// Children of a database kept apart by kind
    pub async fn database_children(
        &self,
        database: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<DatabaseChildren> {
        if database.metadata_type() != MetadataType::Database {
            return Err(CatalogError::InvalidArgument(format!(
                "{database} is not a database"
            )));
        }
        self.resolver
            .resolve_database_children(database, cancel)
            .await
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// First cell of the first row, deserialised as `T`
    pub async fn execute_scalar_query<T: DeserializeOwned>(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<T> {
        let result = self.execute_query(query, database, cancel).await?;
        let value = result.scalar().cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| CatalogError::Deserialize(e.to_string()))
    }

    /// Every row deserialised as `T` from a `{column: value}` object
    pub async fn execute_control_command<T: DeserializeOwned>(
        &self,
        command: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<T>> {
        let result = self.execute_query(command, database, cancel).await?;
        result
            .rows()
            .map(|row| {
                serde_json::from_value(Value::Object(row.to_object()))
                    .map_err(|e| CatalogError::Deserialize(e.to_string()))
            })
            .collect()
    }

    fn active_database(&self) -> Option<String> {
        self.database
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DataSource for KustoDataSource {
    fn cluster(&self) -> &MetadataObject {
        self.resolver.cluster()
    }

    fn database_name(&self) -> Option<String> {
        self.active_database()
    }

    async fn get_child_objects(
        &self,
        parent: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>> {
        self.resolver.children(parent, cancel).await
    }

    async fn exists(
        &self,
        object: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        match object.metadata_type() {
            MetadataType::Database => self.resolver.database_exists(object.name(), cancel).await,
            other => Err(CatalogError::InvalidArgument(format!(
                "existence checks are only supported for databases, got {other}"
            ))),
        }
    }

    fn refresh(&self) {
        info!("Refreshing all metadata of {}", self.cluster().name());
        self.cache.clear();
    }

    fn refresh_object(&self, object: &MetadataObject) {
        info!("Refreshing {}", object);
        self.cache.invalidate(object);
    }

    fn update_database(&self, database: &str) {
        info!("Switching active database to {}", database);
        *self
            .database
            .write()
            .unwrap_or_else(PoisonError::into_inner) =
            (!database.trim().is_empty()).then(|| database.to_string());
        self.cache.invalidate(&self.database_object(database));
    }

    async fn execute_query(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<ResultTable> {
        let active = self.active_database();
        let database = database.or(active.as_deref());
        self.runner.run(query, database, "execute query", cancel).await
    }
}
