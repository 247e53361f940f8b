//! Fixtures for driving a pipeline from tests.

use crate::channel::UNDEFINED;
use crate::context::Context;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Sends every message into `channel`, in order.
pub async fn send_all<I, S>(pipeline: &Pipeline, channel: &str, messages: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for message in messages {
        pipeline.send(channel, message).await?;
    }
    Ok(())
}

/// Receives from `channel` until it reports end-of-stream.
pub async fn drain(pipeline: &Pipeline, channel: &str) -> Result<Vec<String>> {
    let mut received = Vec::new();
    loop {
        let message = pipeline.recv(channel).await?;
        if message == UNDEFINED {
            return Ok(received);
        }
        received.push(message);
    }
}

/// Runs the pipeline on a separate task.
pub fn spawn_run(pipeline: Arc<Pipeline>, ctx: Context) -> JoinHandle<Result<()>> {
    tokio::spawn(async move { pipeline.run(&ctx).await })
}
