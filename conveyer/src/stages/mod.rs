//! Built-in stage archetypes.
//!
//! Every archetype follows the same discipline: each receive and each send
//! races the shared context, and cancellation ends the stage with success.
//! Stages never close channels; the scheduler does that after all stages
//! have returned.

mod decorator;
mod multiplexer;
mod separator;

pub use decorator::Decorator;
pub use multiplexer::Multiplexer;
pub use separator::Separator;
