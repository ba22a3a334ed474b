//! The running machine.
//!
//! The engine owns the states, the live channels and the hooks, and drives
//! the load, init, reset and event protocol. It is strictly synchronous:
//! each event is processed to completion before the next is accepted.

mod error;
mod machine;

pub use error::EventError;
pub use machine::{Engine, EngineReport};
