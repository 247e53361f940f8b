//! Tracing subscriber setup for binaries and tests embedding a pipeline.
//!
//! The runtime itself only emits `tracing` spans and events; installing a
//! subscriber is left to the caller.

use crate::errors::{ConveyerError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info,conveyer=debug";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs the global subscriber, ignoring a subscriber that is already set.
pub fn init_tracing(default_directive: &str) {
    if let Err(error) = try_init_tracing(default_directive, LogFormat::Text) {
        tracing::debug!(%error, "Tracing already initialized");
    }
}

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`.
///
/// # Errors
///
/// Returns [`ConveyerError::Config`] if a global subscriber is already set.
pub fn try_init_tracing(default_directive: &str, format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let (text, json) = match format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| ConveyerError::Config(format!("tracing: {e}")))
}
