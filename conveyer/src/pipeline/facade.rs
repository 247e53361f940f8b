//! Sending to and receiving from pipeline channels from outside the stages.
//!
//! Lookups never create channels: a name nobody registered is an error
//! rather than a queue nobody will drain.

use super::Pipeline;
use crate::channel::UNDEFINED;
use crate::errors::Result;

impl Pipeline {
    /// Sends a message into the named channel, waiting while it is full.
    ///
    /// Blocks until there is room, so a caller that also drains the pipeline
    /// should not send from the same task while downstream channels are full.
    ///
    /// # Errors
    ///
    /// Fails with [`ConveyerError::ChannelNotFound`](crate::errors::ConveyerError::ChannelNotFound)
    /// for an unknown name and with
    /// [`ConveyerError::ChannelClosed`](crate::errors::ConveyerError::ChannelClosed)
    /// once the pipeline has shut down.
    pub async fn send(&self, channel: &str, message: impl Into<String>) -> Result<()> {
        let target = self.lookup(channel)?;
        target.send(message.into()).await?;
        Ok(())
    }

    /// Sends a message without waiting.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::send`], plus
    /// [`ConveyerError::ChannelFull`](crate::errors::ConveyerError::ChannelFull)
    /// when the channel is at capacity.
    pub fn try_send(&self, channel: &str, message: impl Into<String>) -> Result<()> {
        let target = self.lookup(channel)?;
        target.try_send(message.into())?;
        Ok(())
    }

    /// Receives the next message from the named channel.
    ///
    /// Waits for a message; once the channel is closed and drained, returns
    /// [`UNDEFINED`] instead of an error.
    ///
    /// # Errors
    ///
    /// Fails with [`ConveyerError::ChannelNotFound`](crate::errors::ConveyerError::ChannelNotFound)
    /// for an unknown name.
    pub async fn recv(&self, channel: &str) -> Result<String> {
        let source = self.lookup(channel)?;
        Ok(source
            .recv()
            .await
            .unwrap_or_else(|| UNDEFINED.to_string()))
    }
}
