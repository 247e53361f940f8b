//! Mock stage functions for testing.

use crate::channel::Channel;
use crate::context::Context;
use crate::errors::StageError;
use crate::pipeline::StageFuture;
use parking_lot::Mutex;
use std::sync::Arc;

/// A decorator-shaped stage that forwards `pass` messages, then fails.
#[derive(Debug, Clone)]
pub struct FailingStage {
    pass: usize,
    reason: String,
}

impl FailingStage {
    /// Creates a stage that fails on the first message.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            pass: 0,
            reason: reason.into(),
        }
    }

    /// Forwards `pass` messages before failing.
    #[must_use]
    pub const fn after(mut self, pass: usize) -> Self {
        self.pass = pass;
        self
    }

    /// Returns the stage function.
    #[must_use]
    pub fn into_stage(
        self,
    ) -> impl Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync + 'static {
        move |ctx: Context, input: Arc<Channel>, output: Arc<Channel>| -> StageFuture {
            let Self { pass, reason } = self.clone();
            Box::pin(async move {
                let mut forwarded = 0;
                while let Some(message) = input.recv_or_done(&ctx).await {
                    if forwarded == pass {
                        return Err(StageError::msg(reason));
                    }
                    if !output.send_or_done(&ctx, message).await? {
                        break;
                    }
                    forwarded += 1;
                }
                Ok(())
            })
        }
    }
}

/// A decorator-shaped stage that forwards messages unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughStage;

impl PassthroughStage {
    /// Returns the stage function.
    #[must_use]
    pub fn into_stage(
        self,
    ) -> impl Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync + 'static {
        |ctx: Context, input: Arc<Channel>, output: Arc<Channel>| -> StageFuture {
            Box::pin(async move {
                while let Some(message) = input.recv_or_done(&ctx).await {
                    if !output.send_or_done(&ctx, message).await? {
                        break;
                    }
                }
                Ok(())
            })
        }
    }
}

/// A decorator-shaped stage that records every message it forwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingStage {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingStage {
    /// Creates a recording stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages forwarded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    /// Returns the stage function; recordings stay visible through `self`.
    #[must_use]
    pub fn stage(
        &self,
    ) -> impl Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync + 'static {
        let seen = self.seen.clone();
        move |ctx: Context, input: Arc<Channel>, output: Arc<Channel>| -> StageFuture {
            let seen = seen.clone();
            Box::pin(async move {
                while let Some(message) = input.recv_or_done(&ctx).await {
                    seen.lock().push(message.clone());
                    if !output.send_or_done(&ctx, message).await? {
                        break;
                    }
                }
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_failing_stage_forwards_then_fails() {
        let input = Arc::new(Channel::new("in", 4));
        let output = Arc::new(Channel::new("out", 4));
        for m in ["a", "b", "c"] {
            input.send(m.to_string()).await.unwrap();
        }

        let stage = FailingStage::new("boom").after(2).into_stage();
        let err = stage(Context::background(), input, output.clone())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(output.len(), 2);
    }

    #[tokio::test]
    async fn test_recording_stage() {
        let input = Arc::new(Channel::new("in", 4));
        let output = Arc::new(Channel::new("out", 4));
        input.send("x".into()).await.unwrap();
        input.close();

        let recorder = RecordingStage::new();
        recorder.stage()(Context::background(), input, output.clone())
            .await
            .unwrap();

        assert_eq!(recorder.recorded(), vec!["x"]);
        assert_eq!(output.recv().await.as_deref(), Some("x"));
    }
}
