//! Runtime event errors.

use crate::core::ChannelError;
use thiserror::Error;

/// Why an event or host command was rejected. A rejected call leaves the
/// engine untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EventError {
    #[error("Ignoring '{key}': engine not initialized")]
    NotInitialized { key: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Unknown state '{0}'")]
    UnknownState(String),
}
