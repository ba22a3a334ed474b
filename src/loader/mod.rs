//! Building states and transitions from the two definition tables.
//!
//! The states table has one state per row: `name, repeats, action...`.
//! The transitions table's header declares the channels from the third
//! column on (`/key` or `/key <len>`); each following row is
//! `home, dest, conditions...` with one cell per channel.
//!
//! Bad rows are logged, recorded in the [`LoadReport`] and skipped; only a
//! missing file, an empty states table or a missing header abort loading.
//! A malformed expression is reported but does not drop its row: it is kept
//! as a condition that is false before negation.

pub mod error;
pub mod table;

pub use error::{LoadError, LoadReport, RowError};

use crate::config::Verbosity;
use crate::core::{Action, ChannelGuard, Channels, Condition, ConditionError, State, Transition};
use std::collections::HashMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Everything parsed from a pair of definition tables.
#[derive(Debug)]
pub struct Definition {
    /// States in the order they were declared.
    pub states: Vec<State>,
    pub channels: Channels,
    pub report: LoadReport,
}

/// Parse both tables. States are read first since transitions refer to
/// them by name.
pub fn parse_definition(
    states_text: &str,
    transitions_text: &str,
    delimiter: char,
    verbosity: Verbosity,
) -> Result<Definition, LoadError> {
    let mut report = LoadReport::default();
    let mut states = parse_states(&table::decode(states_text, delimiter), &mut report, verbosity);
    if states.is_empty() {
        return Err(LoadError::NoStates);
    }
    let channels = parse_transitions(
        &table::decode(transitions_text, delimiter),
        &mut states,
        &mut report,
        verbosity,
    )?;
    Ok(Definition {
        states,
        channels,
        report,
    })
}

/// Read state rows, skipping the header and rows without a name.
pub fn parse_states(
    rows: &[Vec<String>],
    report: &mut LoadReport,
    verbosity: Verbosity,
) -> Vec<State> {
    let mut states: Vec<State> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row, cells) in rows.iter().enumerate().skip(1) {
        let name = cell(cells, 0);
        if name.is_empty() {
            continue;
        }
        let repeats = cell(cells, 1);
        let actions: Vec<Action> = cells
            .iter()
            .skip(2)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(Action::parse)
            .collect();

        if verbosity.at(6) {
            tracing::debug!(state = name, repeats, actions = actions.len(), "new state");
        }

        let state = State::new(name, repeats, actions);
        match index.get(name) {
            Some(&i) => {
                report.push(RowError::DuplicateState {
                    row,
                    name: name.to_string(),
                });
                states[i] = state;
            }
            None => {
                index.insert(name.to_string(), states.len());
                states.push(state);
            }
        }
    }
    states
}

/// Declare channels from the header and attach transitions to their home
/// states.
pub fn parse_transitions(
    rows: &[Vec<String>],
    states: &mut [State],
    report: &mut LoadReport,
    verbosity: Verbosity,
) -> Result<Channels, LoadError> {
    let header = rows.first().ok_or(LoadError::MissingHeader)?;
    let (channels, columns) = parse_header(header, report);

    let index: HashMap<String, usize> = states
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name().to_string(), i))
        .collect();

    for (row, cells) in rows.iter().enumerate().skip(1) {
        let home = cell(cells, 0);
        if home.is_empty() {
            continue;
        }
        let dest = cell(cells, 1);
        let Some(&home_index) = index.get(home) else {
            report.push(RowError::UndefinedHome {
                row,
                home: home.to_string(),
            });
            continue;
        };
        if !index.contains_key(dest) {
            report.push(RowError::UndefinedDest {
                row,
                dest: dest.to_string(),
            });
            continue;
        }

        let (guard, parsed) = parse_guard(cells, &columns);
        if let Validation::Failure(errors) = parsed {
            report.push(RowError::InvalidConditions {
                row,
                home: home.to_string(),
                dest: dest.to_string(),
                errors: errors.iter().cloned().collect(),
            });
        }
        if guard.is_empty() {
            report.push(RowError::NoConditions {
                row,
                home: home.to_string(),
                dest: dest.to_string(),
            });
            continue;
        }

        if verbosity.at(6) {
            for ChannelGuard { key, conditions } in &guard {
                for condition in conditions {
                    tracing::debug!(
                        from = home,
                        to = dest,
                        channel = %key,
                        %condition,
                        "new transition"
                    );
                }
            }
        }
        states[home_index].add_transition(Transition::new(dest, guard));
    }

    Ok(channels)
}

/// Channel layout from the header, plus the key for each condition column
/// (`None` where the declaration was unusable).
fn parse_header(header: &[String], report: &mut LoadReport) -> (Channels, Vec<Option<String>>) {
    let mut channels = Channels::new();
    let mut columns = Vec::new();

    for (column, text) in header.iter().enumerate().skip(2) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let declared = match tokens.as_slice() {
            [] => None,
            [key] => Some((*key, 1)),
            [key, len] => match len.parse::<usize>() {
                Ok(n) if n > 0 => Some((*key, n)),
                _ => {
                    report.push(RowError::InvalidChannel {
                        column,
                        header: text.clone(),
                    });
                    None
                }
            },
            _ => {
                report.push(RowError::InvalidChannel {
                    column,
                    header: text.clone(),
                });
                None
            }
        };
        columns.push(declared.map(|(key, len)| {
            channels.declare(key, len);
            key.to_string()
        }));
    }
    (channels, columns)
}

/// Parse every condition cell of a row.
///
/// Malformed expressions become [`Condition::unhandled`] in the guard; the
/// accompanying validation accumulates every parse error of the row rather
/// than stopping at the first.
fn parse_guard(
    cells: &[String],
    columns: &[Option<String>],
) -> (Vec<ChannelGuard>, Validation<(), NonEmptyVec<ConditionError>>) {
    let mut guard = Vec::new();
    let mut checks: Vec<Validation<(), NonEmptyVec<ConditionError>>> = Vec::new();
    for (text, key) in cells.iter().skip(2).zip(columns) {
        let Some(key) = key else { continue };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let mut conditions = Vec::new();
        for expression in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            match Condition::parse(expression) {
                Ok(condition) => conditions.push(condition),
                Err(err) => {
                    checks.push(Validation::fail(err));
                    conditions.push(Condition::unhandled(expression));
                }
            }
        }
        guard.push(ChannelGuard {
            key: key.clone(),
            conditions,
        });
    }
    (guard, Validation::all_vec(checks).map(|_| ()))
}

fn cell(cells: &[String], i: usize) -> &str {
    cells.get(i).map(|c| c.trim()).unwrap_or("")
}
