//! Host-supplied lifecycle hooks.
//!
//! Business logic that the tables cannot express is attached to states by
//! name. Each state may have a begin hook (after its actions are emitted),
//! an update hook (may override the destination chosen by the guards) and
//! an end hook (run when the state is about to be left).
//!
//! ```rust
//! use tablefsm::hooks::{HookTable, StateHooks};
//!
//! let hooks = HookTable::new().state(
//!     "await",
//!     StateHooks::new().on_update(|ctx| {
//!         let placed = ctx.channel("/placement").map(|v| v.iter().sum::<f64>());
//!         Ok((placed == Some(4.0)).then(|| "select".to_string()))
//!     }),
//! );
//! assert!(hooks.contains("await"));
//! ```

use crate::core::action::{Action, Output};
use crate::core::channels::{ChannelError, Channels, ChannelsMut};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Failure reported by a hook. The engine logs it and carries on.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Hook failed: {0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HookResult<T> = Result<T, HookError>;

pub type LifecycleHook = Box<dyn FnMut(&mut HookContext<'_>) -> HookResult<()>>;
pub type UpdateHook = Box<dyn FnMut(&mut HookContext<'_>) -> HookResult<Option<String>>>;

/// What a hook may see and touch while it runs.
pub struct HookContext<'a> {
    state: &'a str,
    channels: &'a mut Channels,
    outbox: &'a mut Vec<Output>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        state: &'a str,
        channels: &'a mut Channels,
        outbox: &'a mut Vec<Output>,
    ) -> Self {
        Self {
            state,
            channels,
            outbox,
        }
    }

    /// Name of the state the hook belongs to.
    pub fn state(&self) -> &str {
        self.state
    }

    pub fn channel(&self, key: &str) -> Option<&[f64]> {
        self.channels.get(key)
    }

    pub fn channels(&self) -> &Channels {
        self.channels
    }

    /// Slot values only; the channel layout stays as loaded.
    pub fn channels_mut(&mut self) -> ChannelsMut<'_> {
        ChannelsMut::new(self.channels)
    }

    /// Write a slot (1-based) without triggering guard evaluation.
    pub fn set(&mut self, key: &str, index: i64, value: f64) -> Result<(), ChannelError> {
        self.channels.set(key, index, value)
    }

    /// Queue an extra action on the primary channel.
    pub fn emit(&mut self, action: Action) {
        self.outbox.push(Output::Action(action));
    }
}

/// Optional begin/update/end callbacks for one state.
#[derive(Default)]
pub struct StateHooks {
    pub(crate) on_begin: Option<LifecycleHook>,
    pub(crate) on_update: Option<UpdateHook>,
    pub(crate) on_end: Option<LifecycleHook>,
}

impl StateHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_begin<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut HookContext<'_>) -> HookResult<()> + 'static,
    {
        self.on_begin = Some(Box::new(hook));
        self
    }

    /// A returned non-empty name overrides whatever the guards chose.
    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut HookContext<'_>) -> HookResult<Option<String>> + 'static,
    {
        self.on_update = Some(Box::new(hook));
        self
    }

    pub fn on_end<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut HookContext<'_>) -> HookResult<()> + 'static,
    {
        self.on_end = Some(Box::new(hook));
        self
    }

    pub(crate) fn run_begin(&mut self, ctx: &mut HookContext<'_>) {
        let state = ctx.state;
        if let Some(hook) = self.on_begin.as_mut() {
            if let Err(err) = hook(ctx) {
                tracing::error!(state, error = %err, "begin hook failed");
            }
        }
    }

    /// Destination requested by the update hook, if any.
    pub(crate) fn run_update(&mut self, ctx: &mut HookContext<'_>) -> Option<String> {
        let state = ctx.state;
        let hook = self.on_update.as_mut()?;
        match hook(ctx) {
            Ok(dest) => dest.filter(|d| !d.is_empty()),
            Err(err) => {
                tracing::error!(state, error = %err, "update hook failed");
                None
            }
        }
    }

    pub(crate) fn run_end(&mut self, ctx: &mut HookContext<'_>) {
        let state = ctx.state;
        if let Some(hook) = self.on_end.as_mut() {
            if let Err(err) = hook(ctx) {
                tracing::error!(state, error = %err, "end hook failed");
            }
        }
    }
}

impl fmt::Debug for StateHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHooks")
            .field("on_begin", &self.on_begin.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// Hooks keyed by state name, supplied by the host at configuration time.
#[derive(Debug, Default)]
pub struct HookTable {
    hooks: HashMap<String, StateHooks>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach hooks to a state, replacing any already registered.
    pub fn state(mut self, name: impl Into<String>, hooks: StateHooks) -> Self {
        self.insert(name, hooks);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, hooks: StateHooks) {
        self.hooks.insert(name.into(), hooks);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut StateHooks> {
        self.hooks.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Channels {
        let mut channels = Channels::new();
        channels.declare("/lock", 2);
        channels
    }

    #[test]
    fn update_hook_destination_is_returned() {
        let mut hooks = StateHooks::new().on_update(|_| Ok(Some("lock".to_string())));
        let mut live = channels();
        let mut outbox = Vec::new();
        let mut ctx = HookContext::new("await", &mut live, &mut outbox);
        assert_eq!(hooks.run_update(&mut ctx), Some("lock".to_string()));
    }

    #[test]
    fn empty_or_failed_update_is_no_override() {
        let mut live = channels();
        let mut outbox = Vec::new();

        let mut empty = StateHooks::new().on_update(|_| Ok(Some(String::new())));
        let mut ctx = HookContext::new("await", &mut live, &mut outbox);
        assert_eq!(empty.run_update(&mut ctx), None);

        let mut failing = StateHooks::new().on_update(|_| Err(HookError::new("boom")));
        assert_eq!(failing.run_update(&mut ctx), None);

        let mut absent = StateHooks::new();
        assert_eq!(absent.run_update(&mut ctx), None);
    }

    #[test]
    fn hooks_can_write_channels_and_emit() {
        let mut hooks = StateHooks::new().on_begin(|ctx| {
            ctx.set("/lock", 2, 1.0).map_err(|e| HookError::new(e.to_string()))?;
            ctx.emit(Action::parse("table 2 /lock 1"));
            Ok(())
        });
        let mut live = channels();
        let mut outbox = Vec::new();
        {
            let mut ctx = HookContext::new("lock", &mut live, &mut outbox);
            hooks.run_begin(&mut ctx);
        }
        assert_eq!(live.get("/lock"), Some(&[0.0, 1.0][..]));
        assert_eq!(outbox, vec![Output::Action(Action::parse("table 2 /lock 1"))]);
    }

    #[test]
    fn hooks_can_zero_values_but_not_reshape() {
        let mut hooks = StateHooks::new().on_begin(|ctx| {
            ctx.channels_mut().set("/lock", 1, 4.0).map_err(|e| HookError::new(e.to_string()))?;
            if ctx.channels_mut().set("/unlock", 1, 1.0).is_ok() {
                return Err(HookError::new("undeclared channel accepted"));
            }
            ctx.channels_mut().zero();
            Ok(())
        });
        let mut live = channels();
        live.set("/lock", 2, 1.0).unwrap();
        let mut outbox = Vec::new();
        {
            let mut ctx = HookContext::new("lock", &mut live, &mut outbox);
            hooks.run_begin(&mut ctx);
        }
        assert_eq!(live.get("/lock"), Some(&[0.0, 0.0][..]));
        assert_eq!(live.len(), 1);
        assert!(!live.contains("/unlock"));
    }

    #[test]
    fn hooks_can_keep_their_own_state() {
        let mut calls = 0;
        let mut hooks = StateHooks::new().on_end(move |_| {
            calls += 1;
            if calls > 1 {
                Err(HookError::new(format!("called {calls} times")))
            } else {
                Ok(())
            }
        });
        let mut live = channels();
        let mut outbox = Vec::new();
        let mut ctx = HookContext::new("lock", &mut live, &mut outbox);
        hooks.run_end(&mut ctx);
        hooks.run_end(&mut ctx);
    }
}
