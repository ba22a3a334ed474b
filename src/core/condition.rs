//! Condition predicates over a channel's values.
//!
//! Conditions are written in a small expression language inside the
//! transitions table and parsed once at load time:
//!
//! ```text
//! [~]ANY | ALL | CHANGE | NEW | SUM <n> | COUNT <n> | EQUAL <v1> ... <vk>
//! ```
//!
//! A leading `~` negates the result. `EQUAL` arguments may be `*`, which
//! matches any value. An expression that does not parse is kept as
//! [`ConditionKind::Unhandled`], which is false before negation.

use crate::core::history::ChannelHistory;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while parsing a condition expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("Empty condition expression")]
    Empty,

    #[error("Unhandled condition '{0}'")]
    UnknownKeyword(String),

    #[error("Condition {keyword} requires an argument")]
    MissingArgument { keyword: &'static str },

    #[error("Condition {keyword} takes no arguments (got '{found}')")]
    UnexpectedArgument { keyword: &'static str, found: String },

    #[error("Invalid numeric argument '{found}' for {keyword}")]
    InvalidNumber { keyword: &'static str, found: String },
}

/// One position of an `EQUAL` pattern.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Value(f64),
}

impl Pattern {
    fn matches(&self, value: f64) -> bool {
        match self {
            Pattern::Wildcard => true,
            Pattern::Value(expected) => *expected == value,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Wildcard => write!(f, "*"),
            Pattern::Value(v) => write!(f, "{v}"),
        }
    }
}

/// The predicate a condition applies, with its parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// Any slot is non-zero.
    Any,
    /// Every slot is positive.
    All,
    /// The slots sum to the parameter.
    Sum(f64),
    /// The number of positive slots equals the parameter.
    Count(usize),
    /// Slot-by-slot match, lengths must agree.
    Equal(Vec<Pattern>),
    /// The owning state flagged this channel as changed.
    Change,
    /// The owning state has never recorded these values for this channel.
    New,
    /// An expression that did not parse, kept verbatim. Always false.
    Unhandled(String),
}

impl ConditionKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::All => "ALL",
            Self::Sum(_) => "SUM",
            Self::Count(_) => "COUNT",
            Self::Equal(_) => "EQUAL",
            Self::Change => "CHANGE",
            Self::New => "NEW",
            Self::Unhandled(_) => "UNHANDLED",
        }
    }
}

/// A single, possibly negated, predicate over one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub negate: bool,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            negate: false,
        }
    }

    pub fn negated(kind: ConditionKind) -> Self {
        Self { kind, negate: true }
    }

    /// Parse one expression such as `~EQUAL * 1` or `SUM 3`.
    pub fn parse(expression: &str) -> Result<Self, ConditionError> {
        let expression = expression.trim();
        let (negate, body) = match expression.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, expression),
        };

        let mut tokens = body.split_whitespace();
        let keyword = tokens.next().ok_or(ConditionError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        let kind = match keyword {
            "ANY" => no_args("ANY", &args, ConditionKind::Any)?,
            "ALL" => no_args("ALL", &args, ConditionKind::All)?,
            "CHANGE" => no_args("CHANGE", &args, ConditionKind::Change)?,
            "NEW" => no_args("NEW", &args, ConditionKind::New)?,
            "SUM" => ConditionKind::Sum(single_number("SUM", &args)?),
            "COUNT" => ConditionKind::Count(count("COUNT", &args)?),
            "EQUAL" => {
                if args.is_empty() {
                    return Err(ConditionError::MissingArgument { keyword: "EQUAL" });
                }
                let patterns = args
                    .iter()
                    .map(|arg| match *arg {
                        "*" => Ok(Pattern::Wildcard),
                        other => parse_number("EQUAL", other).map(Pattern::Value),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ConditionKind::Equal(patterns)
            }
            other => return Err(ConditionError::UnknownKeyword(other.to_string())),
        };

        Ok(Self { kind, negate })
    }

    /// Keep an expression that failed to [`parse`](Self::parse).
    ///
    /// A leading `~` still negates, so `~BOGUS` holds.
    pub fn unhandled(expression: &str) -> Self {
        let expression = expression.trim();
        match expression.strip_prefix('~') {
            Some(rest) => Self::negated(ConditionKind::Unhandled(rest.trim().to_string())),
            None => Self::new(ConditionKind::Unhandled(expression.to_string())),
        }
    }

    /// Evaluate against a channel's current values.
    ///
    /// `history` is the owning state's record for the channel named `key`;
    /// it is only consulted by `CHANGE` and `NEW`.
    pub fn evaluate(&self, key: &str, values: &[f64], history: &ChannelHistory) -> bool {
        let met = match &self.kind {
            ConditionKind::Any => values.iter().any(|v| *v != 0.0),
            ConditionKind::All => values.iter().all(|v| *v > 0.0),
            ConditionKind::Sum(target) => values.iter().sum::<f64>() == *target,
            ConditionKind::Count(target) => values.iter().filter(|v| **v > 0.0).count() == *target,
            ConditionKind::Equal(patterns) => {
                if patterns.len() != values.len() {
                    tracing::error!(
                        channel = key,
                        expected = patterns.len(),
                        found = values.len(),
                        "EQUAL pattern length does not match channel length"
                    );
                    false
                } else {
                    patterns.iter().zip(values).all(|(p, v)| p.matches(*v))
                }
            }
            ConditionKind::Change => history.changed(key),
            ConditionKind::New => !history.was_seen(key, values),
            ConditionKind::Unhandled(expression) => {
                tracing::error!(channel = key, %expression, "Unhandled condition");
                false
            }
        };
        met != self.negate
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "~")?;
        }
        if let ConditionKind::Unhandled(expression) = &self.kind {
            return write!(f, "{expression}");
        }
        write!(f, "{}", self.kind.keyword())?;
        match &self.kind {
            ConditionKind::Sum(n) => write!(f, " {n}"),
            ConditionKind::Count(n) => write!(f, " {n}"),
            ConditionKind::Equal(patterns) => {
                for p in patterns {
                    write!(f, " {p}")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn no_args(
    keyword: &'static str,
    args: &[&str],
    kind: ConditionKind,
) -> Result<ConditionKind, ConditionError> {
    match args.first() {
        None => Ok(kind),
        Some(found) => Err(ConditionError::UnexpectedArgument {
            keyword,
            found: (*found).to_string(),
        }),
    }
}

fn single_number(keyword: &'static str, args: &[&str]) -> Result<f64, ConditionError> {
    match args {
        [] => Err(ConditionError::MissingArgument { keyword }),
        [arg] => parse_number(keyword, arg),
        [_, extra, ..] => Err(ConditionError::UnexpectedArgument {
            keyword,
            found: (*extra).to_string(),
        }),
    }
}

fn count(keyword: &'static str, args: &[&str]) -> Result<usize, ConditionError> {
    let n = single_number(keyword, args)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(ConditionError::InvalidNumber {
            keyword,
            found: n.to_string(),
        });
    }
    Ok(n as usize)
}

fn parse_number(keyword: &'static str, token: &str) -> Result<f64, ConditionError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ConditionError::InvalidNumber {
            keyword,
            found: token.to_string(),
        })
}
