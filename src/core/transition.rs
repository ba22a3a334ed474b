//! Guarded transitions between named states.

use crate::config::Verbosity;
use crate::core::channels::Channels;
use crate::core::condition::Condition;
use crate::core::history::ChannelHistory;

/// Conditions for one channel; all must hold.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelGuard {
    pub key: String,
    pub conditions: Vec<Condition>,
}

/// A destination guarded by a conjunction of conditions.
///
/// The transition fires only when every condition on every guarded
/// channel holds. There is no disjunction.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub dest: String,
    pub guard: Vec<ChannelGuard>,
}

impl Transition {
    pub fn new(dest: impl Into<String>, guard: Vec<ChannelGuard>) -> Self {
        Self {
            dest: dest.into(),
            guard,
        }
    }

    /// Evaluate the guard against the live channels.
    ///
    /// A guarded channel missing from `channels` fails the whole check.
    pub fn check(
        &self,
        channels: &Channels,
        history: &ChannelHistory,
        verbosity: Verbosity,
    ) -> bool {
        let mut all_met = true;
        for ChannelGuard { key, conditions } in &self.guard {
            let Some(values) = channels.get(key) else {
                tracing::error!(channel = %key, "Current conditions missing values for channel");
                return false;
            };

            let mut met = true;
            for (i, condition) in conditions.iter().enumerate() {
                let outcome = condition.evaluate(key, values, history);
                if verbosity.at(3) {
                    tracing::debug!(channel = %key, index = i, %condition, outcome, "condition");
                }
                met &= outcome;
            }
            all_met &= met;
        }
        all_met
    }
}
