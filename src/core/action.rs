//! Output actions emitted when a state begins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One token of an action message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Number(f64),
    Symbol(String),
}

impl Token {
    /// Numeric if the text parses as a finite number, otherwise a symbol.
    pub fn parse(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Token::Number(n),
            _ => Token::Symbol(text.to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Symbol(s) => write!(f, "{s}"),
        }
    }
}

/// An ordered list of tokens sent on the action channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub Vec<Token>);

impl Action {
    /// Split a table cell on whitespace into tokens.
    pub fn parse(cell: &str) -> Self {
        Action(cell.split_whitespace().map(Token::parse).collect())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{token}")?;
            first = false;
        }
        Ok(())
    }
}

impl<const N: usize> From<[Token; N]> for Action {
    fn from(tokens: [Token; N]) -> Self {
        Action(tokens.into())
    }
}

/// Something the engine sends to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outlet", content = "message", rename_all = "lowercase")]
pub enum Output {
    /// Name of the state just entered, on the status channel.
    State(String),
    /// An action message, on the primary channel.
    Action(Action),
}
