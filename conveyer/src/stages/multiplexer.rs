//! Many-to-one fan-in stage.

use crate::channel::Channel;
use crate::config::MarkerConfig;
use crate::context::Context;
use crate::errors::StageError;
use crate::pipeline::StageFuture;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Merges several inputs into one output, dropping skip-marked messages.
///
/// Each input gets its own reader; a closed input stops only its reader.
/// Order is preserved per input, while the interleaving across inputs is
/// unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiplexer {
    skip: String,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::from_markers(&MarkerConfig::default())
    }
}

impl Multiplexer {
    /// Creates a multiplexer with an explicit skip marker.
    #[must_use]
    pub fn new(skip: impl Into<String>) -> Self {
        Self { skip: skip.into() }
    }

    /// Creates a multiplexer from configured markers.
    #[must_use]
    pub fn from_markers(markers: &MarkerConfig) -> Self {
        Self::new(&markers.skip_marker)
    }

    /// Returns whether a message is dropped instead of forwarded.
    #[must_use]
    pub fn skips(&self, message: &str) -> bool {
        !self.skip.is_empty() && message.contains(&self.skip)
    }

    /// Runs one reader per input and returns once all of them finished.
    ///
    /// # Errors
    ///
    /// Returns the first reader error (in input order) after every reader
    /// has stopped.
    pub async fn run(
        &self,
        ctx: Context,
        inputs: Vec<Arc<Channel>>,
        output: Arc<Channel>,
    ) -> Result<(), StageError> {
        let readers = inputs
            .iter()
            .map(|input| self.read_into(&ctx, input, &output));

        join_all(readers).await.into_iter().collect()
    }

    async fn read_into(
        &self,
        ctx: &Context,
        input: &Channel,
        output: &Channel,
    ) -> Result<(), StageError> {
        let mut skipped = 0usize;
        while let Some(message) = input.recv_or_done(ctx).await {
            if self.skips(&message) {
                skipped += 1;
                continue;
            }
            if !output.send_or_done(ctx, message).await? {
                break;
            }
        }
        debug!(input = %input.name(), skipped, "Multiplexer reader finished");
        Ok(())
    }

    /// Turns the multiplexer into a function for `register_multiplexer`.
    #[must_use]
    pub fn into_stage(
        self,
    ) -> impl Fn(Context, Vec<Arc<Channel>>, Arc<Channel>) -> StageFuture + Send + Sync + 'static
    {
        let stage = Arc::new(self);
        move |ctx: Context, inputs: Vec<Arc<Channel>>, output: Arc<Channel>| -> StageFuture {
            let stage = stage.clone();
            Box::pin(async move { stage.run(ctx, inputs, output).await })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn drain(channel: &Channel) -> Vec<String> {
        channel.close();
        let mut out = Vec::new();
        while let Some(m) = channel.recv().await {
            out.push(m);
        }
        out
    }

    #[tokio::test]
    async fn test_merges_all_inputs_and_drops_skips() {
        let x = Arc::new(Channel::new("x", 8));
        let y = Arc::new(Channel::new("y", 8));
        let out = Arc::new(Channel::new("out", 16));
        for m in ["x1", "no multiplexer", "x2"] {
            x.send(m.to_string()).await.unwrap();
        }
        for m in ["y1", "y2 no multiplexer", "y3"] {
            y.send(m.to_string()).await.unwrap();
        }
        x.close();
        y.close();

        Multiplexer::default()
            .run(Context::background(), vec![x, y], out.clone())
            .await
            .unwrap();

        let mut got = drain(&out).await;
        // Per-input order survives the merge.
        let from_x: Vec<_> = got.iter().filter(|m| m.starts_with('x')).cloned().collect();
        assert_eq!(from_x, vec!["x1", "x2"]);

        got.sort();
        assert_eq!(got, vec!["x1", "x2", "y1", "y3"]);
    }

    #[tokio::test]
    async fn test_one_closed_input_does_not_stop_others() {
        let closed = Arc::new(Channel::new("closed", 1));
        let open = Arc::new(Channel::new("open", 4));
        let out = Arc::new(Channel::new("out", 4));
        closed.close();

        let ctx = Context::background();
        let stage = {
            let (ctx, closed, open, out) = (ctx.clone(), closed.clone(), open.clone(), out.clone());
            tokio::spawn(async move { Multiplexer::default().run(ctx, vec![closed, open], out).await })
        };

        open.send("late".into()).await.unwrap();
        assert_eq!(out.recv().await.as_deref(), Some("late"));

        open.close();
        stage.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_no_inputs_finishes_immediately() {
        let out = Arc::new(Channel::new("out", 1));
        let result = Multiplexer::default()
            .run(Context::background(), Vec::new(), out)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancellation_stops_all_readers() {
        let inputs: Vec<_> = (0..3).map(|i| Arc::new(Channel::new(format!("in{i}"), 1))).collect();
        let out = Arc::new(Channel::new("out", 1));
        let ctx = Context::background();

        let stage = {
            let ctx = ctx.clone();
            tokio::spawn(async move { Multiplexer::default().run(ctx, inputs, out).await })
        };
        ctx.cancel("shutdown");

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), stage)
            .await
            .expect("readers must observe cancellation")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_skips() {
        let mux = Multiplexer::new("drop me");
        assert!(mux.skips("please drop me"));
        assert!(!mux.skips("keep"));
        assert!(!Multiplexer::new("").skips("anything"));
    }
}
