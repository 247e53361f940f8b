//! One-to-one prefixing stage.

use crate::channel::Channel;
use crate::config::MarkerConfig;
use crate::context::Context;
use crate::errors::StageError;
use crate::pipeline::StageFuture;
use std::sync::Arc;
use tracing::debug;

/// Prepends a prefix to every message, failing on a poison marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    prefix: String,
    poison: String,
}

impl Default for Decorator {
    fn default() -> Self {
        Self::from_markers(&MarkerConfig::default())
    }
}

impl Decorator {
    /// Creates a decorator with an explicit prefix and poison marker.
    #[must_use]
    pub fn new(prefix: impl Into<String>, poison: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            poison: poison.into(),
        }
    }

    /// Creates a decorator from configured markers.
    #[must_use]
    pub fn from_markers(markers: &MarkerConfig) -> Self {
        Self::new(&markers.decorator_prefix, &markers.poison_marker)
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Decorates one message.
    ///
    /// Already-prefixed messages pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::CantBeDecorated`] if the message contains the
    /// poison marker.
    pub fn decorate(&self, message: &str) -> Result<String, StageError> {
        if !self.poison.is_empty() && message.contains(&self.poison) {
            return Err(StageError::cant_be_decorated(message));
        }
        if message.starts_with(&self.prefix) {
            Ok(message.to_string())
        } else {
            Ok(format!("{}{}", self.prefix, message))
        }
    }

    /// Runs the stage until the input closes, `ctx` is done, or a poison
    /// message arrives.
    pub async fn run(
        &self,
        ctx: Context,
        input: Arc<Channel>,
        output: Arc<Channel>,
    ) -> Result<(), StageError> {
        while let Some(message) = input.recv_or_done(&ctx).await {
            let decorated = self.decorate(&message)?;
            if !output.send_or_done(&ctx, decorated).await? {
                break;
            }
        }
        debug!(input = %input.name(), "Decorator finished");
        Ok(())
    }

    /// Turns the decorator into a function for `register_decorator`.
    #[must_use]
    pub fn into_stage(
        self,
    ) -> impl Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync + 'static {
        let stage = Arc::new(self);
        move |ctx: Context, input: Arc<Channel>, output: Arc<Channel>| -> StageFuture {
            let stage = stage.clone();
            Box::pin(async move { stage.run(ctx, input, output).await })
        }
    }
}
