// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Kusto Metadata - Catalog Layer
//!
//! This crate exposes the object hierarchy of a Kusto cluster to IDE-style
//! clients and caches it in memory:
//!
//! ```text
//! Cluster
//! └── Database
//!     ├── Folder ─┬─ Table ── Column
//!     │           └─ Function
//!     ├── Table ── Column
//!     └── Function
//! ```
//!
//! ## Architecture
//!
//! - [`DataSource`]: the surface the transport layer calls
//! - [`ChildResolver`]: maps "children of X" onto schema queries and
//!   partitions the rows into folders, tables and functions
//! - [`MetadataCache`]: lazily populated, invalidated explicitly, never by time
//! - [`QueryRunner`]: cancellation, one retry on an expired credential, error
//!   context
//! - [`QueryExecutor`] and [`TokenProvider`]: the network and credential
//!   plumbing, supplied by the embedding application
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kusto_metadata_catalog::{DataSource, KustoDataSource, TokenCache};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = KustoDataSource::builder("https://help.kusto.windows.net", executor)
//!     .database("Samples")
//!     .token_cache(Arc::new(TokenCache::new(provider)))
//!     .build();
//!
//! let cancel = CancellationToken::new();
//! let databases = source.get_child_objects(source.cluster(), &cancel).await?;
//! ```

pub mod cache;
pub mod datasource;
pub mod error;
pub mod executor;
pub mod keywords;
pub mod metadata;
pub mod query;
pub mod resolver;
pub mod runner;
pub mod token;

// Re-exports
pub use cache::{CacheKey, DatabaseChildren, DatabaseEntry, MetadataCache};
pub use datasource::{DataSource, KustoDataSource, KustoDataSourceBuilder};
pub use error::{CatalogError, CatalogResult};
pub use executor::{ExecutorError, QueryExecutor, ResultTable, Row};
pub use keywords::is_reserved_keyword;
pub use metadata::{FunctionDefinition, MetadataObject, MetadataType, ObjectDetails, ParentRef};
pub use query::SchemaQueryBuilder;
pub use resolver::ChildResolver;
pub use runner::QueryRunner;
pub use token::{AccessToken, TokenCache, TokenProvider};

// Callers need the token type to call any async operation.
pub use tokio_util::sync::CancellationToken;
