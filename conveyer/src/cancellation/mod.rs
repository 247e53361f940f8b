//! Structured cancellation and cleanup utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - CleanupRegistry for LIFO cleanup execution
//! - StructuredTaskGroup for running stage tasks under one shared context

mod cleanup;
mod task_group;
mod token;

pub use cleanup::CleanupRegistry;
pub use task_group::StructuredTaskGroup;
pub use token::CancellationToken;
