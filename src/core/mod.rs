//! Core state machine types and logic.
//!
//! This module contains the declarative part of the machine:
//! - Channels holding live sensor values
//! - Conditions and the guards built from them
//! - States with their actions, transitions and per-state history
//!
//! Nothing here performs I/O; output is queued for the engine to hand over.

pub mod action;
pub mod channels;
pub mod condition;
pub mod history;
pub mod state;
pub mod transition;

pub use action::{Action, Output, Token};
pub use channels::{Channel, ChannelError, Channels, ChannelsMut};
pub use condition::{Condition, ConditionError, ConditionKind, Pattern};
pub use history::{ChannelHistory, Snapshot, TransitionLog, TransitionRecord};
pub use state::State;
pub use transition::{ChannelGuard, Transition};
