//! Engine that loads definitions and processes channel events.

use crate::config::{EngineConfig, Verbosity};
use crate::core::{Channel, Channels, Output, State, TransitionLog, TransitionRecord};
use crate::engine::error::EventError;
use crate::hooks::HookTable;
use crate::loader::{self, LoadError, LoadReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Serializable view of the engine for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub session: Uuid,
    pub active: Option<String>,
    pub states: Vec<String>,
    pub channels: Vec<Channel>,
}

/// A loaded state machine.
///
/// Nothing is active until [`Engine::init`] runs; events arriving before
/// then are rejected.
///
/// ```rust
/// use tablefsm::{Engine, EngineConfig, Output};
///
/// let states = "name,repeats\nidle,0\narmed,0\n";
/// let transitions = "home,dest,/trigger\nidle,armed,ANY\n";
/// let mut engine = Engine::load(states, transitions, EngineConfig::default()).unwrap();
///
/// engine.init();
/// engine.handle_event("/trigger", 1, 1.0).unwrap();
///
/// assert_eq!(engine.active_name(), Some("armed"));
/// assert_eq!(
///     engine.drain_outputs(),
///     vec![Output::State("idle".into()), Output::State("armed".into())]
/// );
/// ```
#[derive(Debug)]
pub struct Engine {
    states: Vec<State>,
    index: HashMap<String, usize>,
    active: Option<usize>,
    channels: Channels,
    hooks: HookTable,
    outbox: Vec<Output>,
    log: TransitionLog,
    session: Uuid,
    config: EngineConfig,
    report: LoadReport,
}

impl Engine {
    /// Build an engine from the text of the states and transitions tables.
    pub fn load(
        states_text: &str,
        transitions_text: &str,
        config: EngineConfig,
    ) -> Result<Self, LoadError> {
        let definition = loader::parse_definition(
            states_text,
            transitions_text,
            config.delimiter,
            config.verbosity,
        )?;

        let index = definition
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name().to_string(), i))
            .collect();

        let engine = Self {
            states: definition.states,
            index,
            active: None,
            channels: definition.channels,
            hooks: HookTable::new(),
            outbox: Vec::new(),
            log: TransitionLog::with_limit(config.transition_log_limit),
            session: Uuid::new_v4(),
            config,
            report: definition.report,
        };

        if engine.verbosity().at(1) {
            tracing::info!(
                session = %engine.session,
                states = engine.states.len(),
                channels = engine.channels.len(),
                skipped = engine.report.errors.len(),
                "state machine loaded"
            );
        }
        Ok(engine)
    }

    /// Load the tables named by `config` from a definition directory.
    pub fn load_dir(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        tracing::info!(dir = %dir.display(), "creating state machine");
        let states = read(&dir.join(&config.states_file))?;
        let transitions = read(&dir.join(&config.transitions_file))?;
        Self::load(&states, &transitions, config)
    }

    pub fn with_hooks(mut self, hooks: HookTable) -> Self {
        self.set_hooks(hooks);
        self
    }

    pub fn set_hooks(&mut self, hooks: HookTable) {
        for name in hooks.names() {
            if !self.index.contains_key(name) {
                tracing::warn!(state = name, "hooks registered for undefined state");
            }
        }
        self.hooks = hooks;
    }

    /// Enter the first declared state.
    pub fn init(&mut self) {
        if self.verbosity().at(1) {
            tracing::info!(session = %self.session, "init");
        }
        self.enter(0);
    }

    /// Zero every channel and clear every state's history.
    ///
    /// The active state is left as it is. A new session id is issued and
    /// the transition log is cleared.
    pub fn reset(&mut self) {
        self.channels.zero();
        for state in &mut self.states {
            state.clear_history();
        }
        self.log.clear();
        self.session = Uuid::new_v4();
        if self.verbosity().at(1) {
            tracing::info!(session = %self.session, "reset");
        }
    }

    /// Write `value` into slot `index` (1-based) of channel `key`, then
    /// let the active state decide whether to move.
    ///
    /// Returns the name of the state entered, if any. A rejected event is
    /// logged and changes nothing.
    pub fn handle_event(
        &mut self,
        key: &str,
        index: i64,
        value: f64,
    ) -> Result<Option<String>, EventError> {
        let result = self.apply_event(key, index, value);
        if let Err(err) = &result {
            tracing::error!(error = %err, "rejected event");
        }
        result
    }

    fn apply_event(
        &mut self,
        key: &str,
        index: i64,
        value: f64,
    ) -> Result<Option<String>, EventError> {
        let Some(active) = self.active else {
            return Err(EventError::NotInitialized {
                key: key.to_string(),
            });
        };
        self.channels.set(key, index, value)?;

        let verbosity = self.verbosity();
        if verbosity.at(1) {
            tracing::info!(channel = key, index, value, "event in");
        }

        let hooks = self.hooks.get_mut(self.states[active].name());
        let dest =
            self.states[active].update(&mut self.channels, &mut self.outbox, hooks, verbosity);

        let Some(dest) = dest else {
            return Ok(None);
        };
        let Some(&next) = self.index.get(&dest) else {
            tracing::error!(
                from = self.states[active].name(),
                dest = %dest,
                "destination is not a defined state; staying put"
            );
            return Ok(None);
        };

        self.record_switch(active, next, false);
        self.enter(next);
        Ok(Some(dest))
    }

    /// Enter a named state directly, without evaluating guards.
    pub fn force_transition(&mut self, name: &str) -> Result<(), EventError> {
        let Some(&next) = self.index.get(name) else {
            let err = EventError::UnknownState(name.to_string());
            tracing::error!(error = %err, "cannot force transition");
            return Err(err);
        };
        if let Some(active) = self.active {
            self.record_switch(active, next, true);
        }
        self.enter(next);
        Ok(())
    }

    /// Queue a state's static actions without entering it.
    pub fn send_actions(&mut self, name: &str) -> Result<(), EventError> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| EventError::UnknownState(name.to_string()))?;
        self.states[i].send_actions(&mut self.outbox);
        Ok(())
    }

    /// Write a channel slot without evaluating transitions.
    pub fn set_channel(&mut self, key: &str, index: i64, value: f64) -> Result<(), EventError> {
        Ok(self.channels.set(key, index, value)?)
    }

    /// Take everything emitted since the last drain.
    pub fn drain_outputs(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_state(&self) -> Option<&State> {
        self.active.map(|i| &self.states[i])
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active_state().map(State::name)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    /// States in declared order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn channel(&self, key: &str) -> Option<&[f64]> {
        self.channels.get(key)
    }

    pub fn transition_log(&self) -> &TransitionLog {
        &self.log
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    /// Rows and columns skipped at load time.
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn report(&self) -> EngineReport {
        EngineReport {
            session: self.session,
            active: self.active_name().map(str::to_string),
            states: self.states.iter().map(|s| s.name().to_string()).collect(),
            channels: self.channels.to_vec(),
        }
    }

    fn verbosity(&self) -> Verbosity {
        self.config.verbosity
    }

    fn enter(&mut self, i: usize) {
        self.active = Some(i);
        let hooks = self.hooks.get_mut(self.states[i].name());
        self.states[i].begin(&mut self.channels, &mut self.outbox, hooks, self.config.verbosity);
    }

    fn record_switch(&mut self, from: usize, to: usize, forced: bool) {
        let record = TransitionRecord {
            from: self.states[from].name().to_string(),
            to: self.states[to].name().to_string(),
            timestamp: Utc::now(),
            forced,
        };
        if self.verbosity().at(1) {
            tracing::info!(from = %record.from, to = %record.to, forced, "transition");
        }
        self.log.record(record);
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, ChannelError};
    use crate::hooks::StateHooks;

    const STATES: &str = "name,repeats,outputs\n\
        idle,0,grid clear\n\
        armed,0,video play 1,audio cue 2\n\
        done,0\n";

    const TRANSITIONS: &str = "home,dest,/trigger,/placement 4\n\
        idle,armed,ANY,\n\
        armed,done,,SUM 3\n\
        armed,idle,~ANY,\n";

    fn engine() -> Engine {
        Engine::load(STATES, TRANSITIONS, EngineConfig::default()).unwrap()
    }

    #[test]
    fn init_enters_first_declared_state() {
        let mut engine = engine();
        assert!(!engine.is_initialized());
        engine.init();
        assert_eq!(engine.active_name(), Some("idle"));
        assert_eq!(
            engine.drain_outputs(),
            vec![
                Output::State("idle".to_string()),
                Output::Action(Action::parse("grid clear")),
            ]
        );
    }

    #[test]
    fn events_before_init_are_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.handle_event("/trigger", 1, 1.0),
            Err(EventError::NotInitialized {
                key: "/trigger".to_string()
            })
        );
        assert_eq!(engine.channel("/trigger"), Some(&[0.0][..]));
    }

    #[test]
    fn event_drives_transition_and_begin() {
        let mut engine = engine();
        engine.init();
        engine.drain_outputs();

        let entered = engine.handle_event("/trigger", 1, 1.0).unwrap();
        assert_eq!(entered.as_deref(), Some("armed"));
        assert_eq!(
            engine.drain_outputs(),
            vec![
                Output::State("armed".to_string()),
                Output::Action(Action::parse("video play 1")),
                Output::Action(Action::parse("audio cue 2")),
            ]
        );
        assert_eq!(engine.transition_log().get_path(), vec!["idle", "armed"]);
    }

    #[test]
    fn rejected_events_do_not_mutate() {
        let mut engine = engine();
        engine.init();
        assert!(engine.handle_event("/unknown", 1, 1.0).is_err());
        assert!(engine.handle_event("/placement", 0, 1.0).is_err());
        assert!(engine.handle_event("/placement", 5, 1.0).is_err());
        assert_eq!(engine.channel("/placement"), Some(&[0.0; 4][..]));
        assert_eq!(engine.active_name(), Some("idle"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut engine = engine();
        engine.init();
        for value in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                engine.handle_event("/placement", 1, value),
                Err(EventError::Channel(ChannelError::NonFinite { .. }))
            ));
        }
        assert!(engine.set_channel("/trigger", 1, f64::NEG_INFINITY).is_err());
        assert_eq!(engine.channel("/placement"), Some(&[0.0; 4][..]));
        assert_eq!(engine.state("idle").unwrap().history().snapshots("/placement").len(), 1);
    }

    #[test]
    fn transition_log_is_capped_by_config() {
        let config = EngineConfig {
            transition_log_limit: 2,
            ..EngineConfig::default()
        };
        let mut engine = Engine::load(STATES, TRANSITIONS, config).unwrap();
        engine.init();
        for name in ["armed", "done", "idle", "armed"] {
            engine.force_transition(name).unwrap();
        }
        assert_eq!(engine.transition_log().records().len(), 2);
        assert_eq!(engine.transition_log().get_path(), vec!["done", "idle", "armed"]);
    }

    #[test]
    fn reset_zeroes_channels_and_history_but_keeps_active() {
        let mut engine = engine();
        engine.init();
        engine.handle_event("/trigger", 1, 1.0).unwrap();
        engine.handle_event("/placement", 2, 2.0).unwrap();
        let session = engine.session_id();

        engine.reset();

        assert_eq!(engine.active_name(), Some("armed"));
        assert!(engine.channels().iter().all(|(_, v)| v.iter().all(|x| *x == 0.0)));
        assert!(engine.states().iter().all(|s| s.history().is_empty()));
        assert!(engine.transition_log().records().is_empty());
        assert_ne!(engine.session_id(), session);
    }

    #[test]
    fn force_transition_bypasses_guards() {
        let mut engine = engine();
        engine.init();
        engine.force_transition("done").unwrap();
        assert_eq!(engine.active_name(), Some("done"));
        assert!(engine.transition_log().records()[0].forced);
        assert_eq!(
            engine.force_transition("nowhere"),
            Err(EventError::UnknownState("nowhere".to_string()))
        );
    }

    #[test]
    fn send_actions_replays_without_entering() {
        let mut engine = engine();
        engine.init();
        engine.drain_outputs();
        engine.send_actions("armed").unwrap();
        assert_eq!(engine.active_name(), Some("idle"));
        assert_eq!(
            engine.drain_outputs(),
            vec![
                Output::Action(Action::parse("video play 1")),
                Output::Action(Action::parse("audio cue 2")),
            ]
        );
    }

    #[test]
    fn hook_override_to_unknown_state_stays_put() {
        let mut engine = engine().with_hooks(
            HookTable::new().state(
                "idle",
                StateHooks::new().on_update(|_| Ok(Some("limbo".to_string()))),
            ),
        );
        engine.init();
        assert_eq!(engine.handle_event("/placement", 1, 1.0), Ok(None));
        assert_eq!(engine.active_name(), Some("idle"));
    }

    #[test]
    fn begin_hook_runs_on_entry() {
        let mut engine = engine().with_hooks(HookTable::new().state(
            "armed",
            StateHooks::new().on_begin(|ctx| {
                ctx.emit(Action::parse("lock all"));
                Ok(())
            }),
        ));
        engine.init();
        engine.drain_outputs();
        engine.handle_event("/trigger", 1, 1.0).unwrap();
        let outputs = engine.drain_outputs();
        assert_eq!(outputs.last(), Some(&Output::Action(Action::parse("lock all"))));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut engine = engine();
        engine.init();
        let json = serde_json::to_value(engine.report()).unwrap();
        assert_eq!(json["active"], "idle");
        assert_eq!(json["states"][2], "done");
        assert_eq!(json["channels"][1]["key"], "/placement");
    }

    #[test]
    fn load_dir_reports_missing_files() {
        let err = Engine::load_dir("/definitely/not/here", EngineConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
