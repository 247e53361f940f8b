//! Named, bounded string channels.
//!
//! This module provides:
//! - [`Channel`]: a bounded multi-producer/multi-consumer FIFO of strings
//!   with an explicit, idempotent close
//! - [`ChannelRegistry`]: the per-pipeline map from channel name to channel

mod queue;
mod registry;

pub use queue::Channel;
pub use registry::ChannelRegistry;

/// Value returned by a facade receive on a closed, drained channel.
pub const UNDEFINED: &str = "undefined";
