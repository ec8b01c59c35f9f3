// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Tracing subscriber setup

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to set tracing subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Filter from `RUST_LOG`, falling back to `default_filter` when unset or invalid
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global fmt subscriber.
///
/// Fails if another subscriber was installed first.
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!("Logging initialised");
    Ok(())
}
