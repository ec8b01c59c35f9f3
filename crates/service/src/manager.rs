// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data source manager
//!
//! This module manages data source instances for the service.
//!
//! The manager is responsible for:
//! - Validating configurations before anything connects
//! - Reusing one data source (and its metadata cache) per cluster and database
//! - Sharing one token cache across every data source it creates

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kusto_metadata_catalog::{CatalogResult, KustoDataSource, QueryExecutor, TokenCache};
use tracing::info;

use crate::config::{ConfigError, DataSourceConfig};

/// Creates the executor a new data source talks through
#[async_trait]
pub trait QueryExecutorFactory: Send + Sync {
    async fn create_executor(
        &self,
        config: &DataSourceConfig,
    ) -> CatalogResult<Arc<dyn QueryExecutor>>;
}

/// Data sources keyed by `(cluster, database)`
pub struct DataSourceManager {
    factory: Arc<dyn QueryExecutorFactory>,
    tokens: Option<Arc<TokenCache>>,
    sources: HashMap<(String, Option<String>), Arc<KustoDataSource>>,
}

impl DataSourceManager {
    pub fn new(factory: Arc<dyn QueryExecutorFactory>) -> Self {
        Self {
            factory,
            tokens: None,
            sources: HashMap::new(),
        }
    }

    /// Builder method: share `tokens` with every data source
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Get or create the data source for `config`
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let source = manager.get_data_source(&config).await?;
    /// let databases = source.get_child_objects(source.cluster(), &cancel).await?;
    /// ```
    pub async fn get_data_source(
        &mut self,
        config: &DataSourceConfig,
    ) -> Result<Arc<KustoDataSource>, ConfigError> {
        config.validate()?;

        let key = (config.cluster.clone(), config.database.clone());
        if let Some(source) = self.sources.get(&key) {
            return Ok(source.clone());
        }

        info!(
            "Creating data source for {} ({})",
            config.cluster,
            config.database.as_deref().unwrap_or("no default database")
        );
        let executor = self.factory.create_executor(config).await?;

        let mut builder =
            KustoDataSource::builder(&config.cluster, executor).log_queries(config.log_queries);
        if let Some(database) = &config.database {
            builder = builder.database(database);
        }
        if let Some(tokens) = &self.tokens {
            builder = builder.token_cache(tokens.clone());
        }

        let source = Arc::new(builder.build());
        self.sources.insert(key, source.clone());
        Ok(source)
    }

    /// Forget the data source for `config`, dropping its cache
    pub fn remove(&mut self, config: &DataSourceConfig) -> bool {
        self.sources
            .remove(&(config.cluster.clone(), config.database.clone()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Drop every data source
    ///
    /// This should be called when shutting down the service.
    pub fn close_all(&mut self) {
        self.sources.clear();
    }
}
