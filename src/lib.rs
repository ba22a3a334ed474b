//! Tablefsm: a table-driven state machine for interactive installations
//!
//! States and transitions are declared in two delimited text tables.
//! Transitions are guarded by a small condition language evaluated over
//! numeric *channels* that external sensors update one slot at a time.
//! Each state remembers the channel values it has seen, which enables the
//! temporal conditions `CHANGE` and `NEW`.
//!
//! # Core Concepts
//!
//! - **Channel**: a named, fixed-length vector of numeric slots
//! - **Condition**: one predicate over a channel (`ANY`, `SUM 3`, `EQUAL * 1`, ...)
//! - **Transition**: a destination guarded by a conjunction of conditions
//! - **State**: static output actions, transitions and per-state history
//! - **Hooks**: optional host callbacks run when a state begins, updates or ends
//!
//! # Example
//!
//! ```rust
//! use tablefsm::{Engine, EngineConfig};
//!
//! let states = "name,repeats,outputs\n\
//!               idle,0,grid clear\n\
//!               armed,0,video play 1\n";
//! let transitions = "home,dest,/placement 2\n\
//!                    idle,armed,EQUAL * 1\n";
//!
//! let mut engine = Engine::load(states, transitions, EngineConfig::default()).unwrap();
//! engine.init();
//!
//! engine.handle_event("/placement", 1, 5.0).unwrap();
//! assert_eq!(engine.active_name(), Some("idle"));
//!
//! engine.handle_event("/placement", 2, 1.0).unwrap();
//! assert_eq!(engine.active_name(), Some("armed"));
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod hooks;
pub mod loader;

// Re-export commonly used types
pub use config::{EngineConfig, Verbosity};
pub use crate::core::{Action, Condition, ConditionKind, Output, State, Token, Transition};
pub use engine::{Engine, EngineReport, EventError};
pub use hooks::{HookContext, HookError, HookTable, StateHooks};
pub use loader::{LoadError, LoadReport};
