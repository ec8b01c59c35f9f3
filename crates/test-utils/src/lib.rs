// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for kusto-metadata
//!
//! This crate provides common testing components including:
//! - A call-counting mock query executor
//! - A mock token provider
//! - Schema fixtures shaped like the discovery commands

pub mod fixtures;
pub mod mock_executor;
pub mod mock_token;

// Re-exports for convenience
pub use fixtures::{CLUSTER, SAMPLES, SchemaFixtures};
pub use mock_executor::{MockQueryExecutor, MockQueryExecutorBuilder, RecordedQuery};
pub use mock_token::MockTokenProvider;
