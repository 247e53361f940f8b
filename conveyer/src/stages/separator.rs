//! One-to-many round-robin stage.

use crate::channel::Channel;
use crate::context::Context;
use crate::errors::StageError;
use crate::pipeline::StageFuture;
use std::sync::Arc;
use tracing::debug;

/// Distributes input messages across outputs in round-robin order.
///
/// Message `n` (counting from zero) goes to output `n mod N`, so order is
/// preserved along each single output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Separator;

impl Separator {
    /// Creates a separator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the stage until the input closes or `ctx` is done.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::NoOutputs`] when `outputs` is empty, or a
    /// channel error if an output was closed underneath the stage.
    pub async fn run(
        &self,
        ctx: Context,
        input: Arc<Channel>,
        outputs: Vec<Arc<Channel>>,
    ) -> Result<(), StageError> {
        if outputs.is_empty() {
            return Err(StageError::NoOutputs);
        }

        let mut counter: usize = 0;
        while let Some(message) = input.recv_or_done(&ctx).await {
            let target = &outputs[counter % outputs.len()];
            counter = counter.wrapping_add(1);
            if !target.send_or_done(&ctx, message).await? {
                break;
            }
        }
        debug!(input = %input.name(), forwarded = counter, "Separator finished");
        Ok(())
    }

    /// Turns the separator into a function for `register_separator`.
    #[must_use]
    pub fn into_stage(
        self,
    ) -> impl Fn(Context, Arc<Channel>, Vec<Arc<Channel>>) -> StageFuture + Send + Sync + 'static
    {
        move |ctx: Context, input: Arc<Channel>, outputs: Vec<Arc<Channel>>| -> StageFuture {
            Box::pin(async move { self.run(ctx, input, outputs).await })
        }
    }
}
