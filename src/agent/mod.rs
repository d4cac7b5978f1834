//! Agent module: the per-conversation chat/tool driver
//!
//! - `transcript` -- the message history and its well-formedness helpers
//! - `core`       -- the `Agent` loop

pub mod core;
pub mod transcript;

pub use core::{Agent, MAX_ROUNDS};
pub use transcript::Transcript;
