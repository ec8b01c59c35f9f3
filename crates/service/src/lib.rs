// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Kusto Metadata Service
//!
//! Glue between client configuration and the catalog layer:
//!
//! - [`DataSourceConfig`]: connection strings and client settings
//! - [`DataSourceManager`]: one cached data source per cluster and database
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod logging;
pub mod manager;

pub use config::{ConfigError, DataSourceConfig, canonical_cluster};
pub use logging::{LoggingError, init_logging};
pub use manager::{DataSourceManager, QueryExecutorFactory};
