//! Execution contexts for pipeline runs.
//!
//! A [`Context`] is handed to every stage task. It is the only stop signal
//! stages observe: once it is done, each stage returns at its next
//! suspension point.

mod execution;


pub use execution::Context;
