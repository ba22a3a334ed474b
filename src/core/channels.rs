//! Live condition channels.
//!
//! A channel is a named, fixed-length vector of numeric slots fed by
//! external sensor events. The layout (keys and lengths) is declared once
//! by the transitions header and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised when addressing a channel slot.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("Unknown channel '{key}'")]
    UnknownChannel { key: String },

    #[error("Invalid index {index} for channel '{key}' (expected 1..={len})")]
    IndexOutOfRange { key: String, index: i64, len: usize },

    #[error("Non-finite value {value} for channel '{key}'")]
    NonFinite { key: String, value: f64 },
}

/// One declared channel and its current values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub key: String,
    pub values: Vec<f64>,
}

/// Ordered map of channel key to current values.
///
/// Iteration follows declaration order, which is the column order of the
/// transitions header.
#[derive(Clone, Debug, Default)]
pub struct Channels {
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a channel with `len` zeroed slots.
    ///
    /// Redeclaring an existing key resets it to the new length. Only the
    /// loader declares channels; the layout is fixed once loaded.
    pub(crate) fn declare(&mut self, key: impl Into<String>, len: usize) {
        let key = key.into();
        let values = vec![0.0; len];
        match self.index.get(&key) {
            Some(&i) => self.channels[i].values = values,
            None => {
                self.index.insert(key.clone(), self.channels.len());
                self.channels.push(Channel { key, values });
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.index
            .get(key)
            .map(|&i| self.channels[i].values.as_slice())
    }

    /// Number of slots in a channel, if declared.
    pub fn len_of(&self, key: &str) -> Option<usize> {
        self.get(key).map(<[f64]>::len)
    }

    /// Write `value` at a 1-based `index`.
    ///
    /// Nothing is written when the key is unknown, the index falls
    /// outside `1..=len` or the value is NaN or infinite.
    pub fn set(&mut self, key: &str, index: i64, value: f64) -> Result<(), ChannelError> {
        if !value.is_finite() {
            return Err(ChannelError::NonFinite {
                key: key.to_string(),
                value,
            });
        }
        let &i = self
            .index
            .get(key)
            .ok_or_else(|| ChannelError::UnknownChannel {
                key: key.to_string(),
            })?;
        let values = &mut self.channels[i].values;
        let len = values.len();
        if index < 1 || index as u64 > len as u64 {
            return Err(ChannelError::IndexOutOfRange {
                key: key.to_string(),
                index,
                len,
            });
        }
        values[(index - 1) as usize] = value;
        Ok(())
    }

    /// Set every slot of every channel to zero.
    pub fn zero(&mut self) {
        for channel in &mut self.channels {
            channel.values.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels
            .iter()
            .map(|c| (c.key.as_str(), c.values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Owned copy of every channel, in declaration order.
    pub fn to_vec(&self) -> Vec<Channel> {
        self.channels.clone()
    }
}

/// Write access to slot values that cannot alter the channel layout.
///
/// This is what hooks receive: they may write and zero slots but never
/// add a key or change a length.
#[derive(Debug)]
pub struct ChannelsMut<'a> {
    channels: &'a mut Channels,
}

impl<'a> ChannelsMut<'a> {
    pub(crate) fn new(channels: &'a mut Channels) -> Self {
        Self { channels }
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.channels.get(key)
    }

    pub fn set(&mut self, key: &str, index: i64, value: f64) -> Result<(), ChannelError> {
        self.channels.set(key, index, value)
    }

    pub fn zero(&mut self) {
        self.channels.zero();
    }
}
