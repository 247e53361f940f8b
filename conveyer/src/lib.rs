//! # Conveyer
//!
//! A runtime for pipelines of text messages flowing over named, bounded
//! channels.
//!
//! Conveyer provides:
//!
//! - **Named channels**: bounded FIFO queues created on first reference
//! - **Three stage shapes**: decorators (one to one), separators (one to many)
//!   and multiplexers (many to one)
//! - **Structured execution**: every stage runs as its own task, the first
//!   stage error cancels the rest, and every channel is closed exactly once
//! - **Event-driven observability**: lifecycle events through an [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyer::prelude::*;
//!
//! let pipeline = PipelineBuilder::new()
//!     .buffer_size(10)
//!     .prefix_decorator("in", "decorated")
//!     .round_robin_separator("decorated", &["left", "right"])
//!     .skipping_multiplexer(&["left", "right"], "out")
//!     .build()?;
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(1));
//! pipeline.send("in", "hello").await?;
//! let result = pipeline.run(&ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod channel;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, CleanupRegistry, StructuredTaskGroup};
    pub use crate::channel::{Channel, ChannelRegistry, UNDEFINED};
    pub use crate::config::{MarkerConfig, PipelineConfig};
    pub use crate::context::Context;
    pub use crate::errors::{ChannelError, ContextError, ConveyerError, StageError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        Pipeline, PipelineBuilder, PipelineState, StageFuture, StageKind, StageSpec,
    };
    pub use crate::stages::{Decorator, Multiplexer, Separator};
}
