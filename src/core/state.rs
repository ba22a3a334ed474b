//! States loaded from the states table.
//!
//! A state owns its static output actions, its outgoing transitions and
//! its own history of the channel values it has observed.

use crate::config::Verbosity;
use crate::core::action::{Action, Output};
use crate::core::channels::Channels;
use crate::core::history::ChannelHistory;
use crate::core::transition::Transition;
use crate::hooks::{HookContext, StateHooks};

/// A named state of the machine.
#[derive(Clone, Debug)]
pub struct State {
    name: String,
    repeats: String,
    actions: Vec<Action>,
    transitions: Vec<Transition>,
    history: ChannelHistory,
}

impl State {
    /// Create a state with no transitions.
    ///
    /// `repeats` is kept verbatim from the table; the engine does not act
    /// on it.
    pub fn new(name: impl Into<String>, repeats: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            repeats: repeats.into(),
            actions,
            transitions: Vec::new(),
            history: ChannelHistory::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repeats(&self) -> &str {
        &self.repeats
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn history(&self) -> &ChannelHistory {
        &self.history
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Whether `values` were ever recorded for `key` in this state.
    pub fn was_seen(&self, key: &str, values: &[f64]) -> bool {
        self.history.was_seen(key, values)
    }

    /// Queue this state's static actions in declared order.
    pub fn send_actions(&self, outbox: &mut Vec<Output>) {
        outbox.extend(self.actions.iter().cloned().map(Output::Action));
    }

    /// Enter the state.
    ///
    /// Announces the state name, records the entry values in history,
    /// queues the static actions and finally runs the begin hook.
    pub fn begin(
        &mut self,
        channels: &mut Channels,
        outbox: &mut Vec<Output>,
        hooks: Option<&mut StateHooks>,
        verbosity: Verbosity,
    ) {
        if verbosity.at(1) {
            tracing::info!(state = %self.name, "begin state");
        }
        outbox.push(Output::State(self.name.clone()));

        self.history.recompute_change_flags(channels);
        self.history.record_flagged(channels);
        self.trace_history(channels, verbosity);

        self.send_actions(outbox);

        if let Some(hooks) = hooks {
            let mut ctx = HookContext::new(&self.name, channels, outbox);
            hooks.run_begin(&mut ctx);
        }
    }

    /// Evaluate transitions after a channel write.
    ///
    /// Every transition is checked in declared order and the last one that
    /// matches wins. The update hook, if present, may override that choice.
    /// When a destination is decided the end hook runs before returning it.
    pub fn update(
        &mut self,
        channels: &mut Channels,
        outbox: &mut Vec<Output>,
        mut hooks: Option<&mut StateHooks>,
        verbosity: Verbosity,
    ) -> Option<String> {
        self.history.recompute_change_flags(channels);
        if verbosity.at(4) {
            let changed: Vec<&str> = channels
                .keys()
                .filter(|k| self.history.changed(k))
                .collect();
            tracing::debug!(state = %self.name, ?changed, "channel changes");
        }

        let mut dest = None;
        for transition in &self.transitions {
            if verbosity.at(2) {
                tracing::debug!(from = %self.name, to = %transition.dest, "checking transition");
            }
            if transition.check(channels, &self.history, verbosity) {
                dest = Some(transition.dest.clone());
            }
        }

        self.history.record_flagged(channels);
        self.trace_history(channels, verbosity);

        if let Some(hooks) = hooks.as_deref_mut() {
            let mut ctx = HookContext::new(&self.name, channels, outbox);
            if let Some(overridden) = hooks.run_update(&mut ctx) {
                if verbosity.at(1) {
                    tracing::info!(
                        state = %self.name,
                        dest = %overridden,
                        "update hook chose destination"
                    );
                }
                dest = Some(overridden);
            }
        }

        if dest.is_some() {
            if let Some(hooks) = hooks {
                let mut ctx = HookContext::new(&self.name, channels, outbox);
                hooks.run_end(&mut ctx);
            }
        }

        dest
    }

    fn trace_history(&self, channels: &Channels, verbosity: Verbosity) {
        if !verbosity.at(5) {
            return;
        }
        for key in channels.keys() {
            for (i, snapshot) in self.history.snapshots(key).iter().enumerate() {
                tracing::trace!(
                    state = %self.name,
                    channel = key,
                    index = i,
                    values = ?snapshot.values,
                    "history"
                );
            }
        }
    }
}
