//! Testing utilities for conveyer pipelines.
//!
//! This module provides:
//! - Mock stage functions (failing, recording, pass-through)
//! - Fixtures for feeding, draining and running a pipeline

mod fixtures;
mod mocks;

pub use fixtures::{drain, send_all, spawn_run};
pub use mocks::{FailingStage, PassthroughStage, RecordingStage};
