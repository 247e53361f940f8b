//! Error types for the conveyer runtime.
//!
//! Errors are split by where they surface: `ConveyerError` is returned by the
//! pipeline API, `StageError` by stage functions, `ChannelError` by channel
//! operations and `ContextError` by execution contexts.

use std::collections::HashMap;
use thiserror::Error;

/// Convenience result alias for pipeline operations.
pub type Result<T, E = ConveyerError> = std::result::Result<T, E>;

/// The main error type for conveyer operations.
#[derive(Debug, Error)]
pub enum ConveyerError {
    /// `send`/`recv` referenced a channel name that was never registered.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// A non-blocking send found the channel at capacity.
    #[error("channel full: {0}")]
    ChannelFull(String),

    /// A send targeted a channel that has already been closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// `run` was called on a pipeline that already left the idle state.
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// The pipeline wiring is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stage function failed while the pipeline was running.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        /// Diagnostic name of the failing stage.
        stage: String,
        /// The error returned by the stage.
        #[source]
        source: StageError,
    },

    /// A configuration document could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConveyerError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a stage error.
    #[must_use]
    pub fn stage(stage: impl Into<String>, source: StageError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source,
        }
    }

    /// Returns the stage error carried by this error, if any.
    #[must_use]
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns a short machine-friendly tag for the error variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ChannelNotFound(_) => "channel_not_found",
            Self::ChannelFull(_) => "channel_full",
            Self::ChannelClosed(_) => "channel_closed",
            Self::AlreadyRunning => "already_running",
            Self::Configuration(_) => "configuration",
            Self::Stage { .. } => "stage",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Stage { stage, source } = self {
            map.insert("stage".to_string(), serde_json::json!(stage));
            map.insert("stage_error".to_string(), serde_json::json!(source.kind()));
        }
        map
    }
}

/// Errors returned by stage functions.
#[derive(Debug, Error)]
pub enum StageError {
    /// The decorator received a message carrying the poison marker.
    #[error("can't be decorated: {message}")]
    CantBeDecorated {
        /// The rejected message.
        message: String,
    },

    /// A separator was invoked without any output channels.
    #[error("separator has no output channels")]
    NoOutputs,

    /// A channel operation failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The stage task panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// Any other failure raised by a user-supplied stage.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Creates a can't-be-decorated error for the given message.
    #[must_use]
    pub fn cant_be_decorated(message: impl Into<String>) -> Self {
        Self::CantBeDecorated {
            message: message.into(),
        }
    }

    /// Creates a stage error from any displayable message.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Other(anyhow::Error::msg(message))
    }

    /// Returns a short tag for the error variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CantBeDecorated { .. } => "cant_be_decorated",
            Self::NoOutputs => "no_outputs",
            Self::Channel(_) => "channel",
            Self::Panicked(_) => "panicked",
            Self::Other(_) => "other",
        }
    }
}

/// Errors from individual channel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel has been closed.
    #[error("channel '{0}' is closed")]
    Closed(String),

    /// The channel is at capacity.
    #[error("channel '{0}' is full")]
    Full(String),
}

impl From<ChannelError> for ConveyerError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed(name) => Self::ChannelClosed(name),
            ChannelError::Full(name) => Self::ChannelFull(name),
        }
    }
}

/// Why an execution context is done.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was cancelled explicitly.
    #[error("context cancelled: {0}")]
    Cancelled(String),

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
