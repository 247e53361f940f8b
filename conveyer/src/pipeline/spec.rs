//! Stage registrations.

use crate::channel::Channel;
use crate::context::Context;
use crate::errors::StageError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by every stage function.
pub type StageFuture = BoxFuture<'static, Result<(), StageError>>;

/// One input, one output.
pub type DecoratorFn = Arc<dyn Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync>;

/// One input, many outputs.
pub type SeparatorFn =
    Arc<dyn Fn(Context, Arc<Channel>, Vec<Arc<Channel>>) -> StageFuture + Send + Sync>;

/// Many inputs, one output.
pub type MultiplexerFn =
    Arc<dyn Fn(Context, Vec<Arc<Channel>>, Arc<Channel>) -> StageFuture + Send + Sync>;

/// The archetype of a registered stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// One-to-one transform.
    Decorator,
    /// One-to-many round-robin fan-out.
    Separator,
    /// Many-to-one fan-in.
    Multiplexer,
}

impl StageKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decorator => "decorator",
            Self::Separator => "separator",
            Self::Multiplexer => "multiplexer",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage function bound to channel names.
///
/// Each variant carries its own function signature, so launching a stage
/// never needs a runtime type check.
#[derive(Clone)]
pub enum StageSpec {
    /// A decorator registration.
    Decorator {
        /// The stage function.
        func: DecoratorFn,
        /// Input channel name.
        input: String,
        /// Output channel name.
        output: String,
    },
    /// A separator registration.
    Separator {
        /// The stage function.
        func: SeparatorFn,
        /// Input channel name.
        input: String,
        /// Output channel names, in round-robin order.
        outputs: Vec<String>,
    },
    /// A multiplexer registration.
    Multiplexer {
        /// The stage function.
        func: MultiplexerFn,
        /// Input channel names.
        inputs: Vec<String>,
        /// Output channel name.
        output: String,
    },
}

impl StageSpec {
    /// Creates a decorator registration from any async function.
    pub fn decorator<F, Fut>(func: F, input: impl Into<String>, output: impl Into<String>) -> Self
    where
        F: Fn(Context, Arc<Channel>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
    {
        let func: DecoratorFn = Arc::new(
            move |ctx: Context, input: Arc<Channel>, output: Arc<Channel>| -> StageFuture {
                Box::pin(func(ctx, input, output))
            },
        );
        Self::Decorator {
            func,
            input: input.into(),
            output: output.into(),
        }
    }

    /// Creates a separator registration from any async function.
    pub fn separator<F, Fut, S>(func: F, input: impl Into<String>, outputs: &[S]) -> Self
    where
        F: Fn(Context, Arc<Channel>, Vec<Arc<Channel>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        let func: SeparatorFn = Arc::new(
            move |ctx: Context, input: Arc<Channel>, outputs: Vec<Arc<Channel>>| -> StageFuture {
                Box::pin(func(ctx, input, outputs))
            },
        );
        Self::Separator {
            func,
            input: input.into(),
            outputs: outputs.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Creates a multiplexer registration from any async function.
    pub fn multiplexer<F, Fut, S>(func: F, inputs: &[S], output: impl Into<String>) -> Self
    where
        F: Fn(Context, Vec<Arc<Channel>>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        let func: MultiplexerFn = Arc::new(
            move |ctx: Context, inputs: Vec<Arc<Channel>>, output: Arc<Channel>| -> StageFuture {
                Box::pin(func(ctx, inputs, output))
            },
        );
        Self::Multiplexer {
            func,
            inputs: inputs.iter().map(|s| s.as_ref().to_string()).collect(),
            output: output.into(),
        }
    }

    /// Returns the stage kind.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Decorator { .. } => StageKind::Decorator,
            Self::Separator { .. } => StageKind::Separator,
            Self::Multiplexer { .. } => StageKind::Multiplexer,
        }
    }

    /// Returns the input channel names.
    #[must_use]
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Decorator { input, .. } | Self::Separator { input, .. } => vec![input.as_str()],
            Self::Multiplexer { inputs, .. } => inputs.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the output channel names.
    #[must_use]
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Self::Decorator { output, .. } | Self::Multiplexer { output, .. } => {
                vec![output.as_str()]
            }
            Self::Separator { outputs, .. } => outputs.iter().map(String::as_str).collect(),
        }
    }

    /// Returns every channel name the stage touches, inputs first.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names = self.inputs();
        names.extend(self.outputs());
        names
    }

    /// Returns a diagnostic label such as `decorator#0(in -> out)`.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        format!(
            "{}#{}({} -> {})",
            self.kind(),
            index,
            self.inputs().join(", "),
            self.outputs().join(", ")
        )
    }

    /// Validates the wiring.
    ///
    /// # Errors
    ///
    /// Returns an error message when a separator has no outputs.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Separator { input, outputs, .. } if outputs.is_empty() => Err(format!(
                "separator reading '{input}' must have at least one output channel"
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("kind", &self.kind())
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .finish_non_exhaustive()
    }
}
