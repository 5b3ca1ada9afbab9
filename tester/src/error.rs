//! Error taxonomy for a test run.
//!
//! Every variant except [`TesterError::FatalSetup`] is a per-directive
//! failure: it is handed to the reporter and the run continues.

use anyhow::Result;
use thiserror::Error;

use crate::core::mode::Scope;

/// Malformed nesting of only-scopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("nested {0} begin")]
    Nested(Scope),
    #[error("cannot begin {inner} within {outer}")]
    Crossed { inner: Scope, outer: Scope },
    #[error("no {0} to end")]
    NotOpen(Scope),
}

/// Malformed control-directive arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveSyntaxError {
    #[error("incorrect syntax for {directive} in: {text:?}")]
    ArgumentCount { directive: &'static str, text: String },
    #[error("invalid version {value:?} for {directive} in: {text:?}")]
    Version {
        directive: &'static str,
        value: String,
        text: String,
    },
    #[error("incorrect syntax for {directive} in: {text:?} (expected begin or end)")]
    ScopeEdge { directive: &'static str, text: String },
}

#[derive(Debug, Error)]
pub enum TesterError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    DirectiveSyntax(#[from] DirectiveSyntaxError),

    /// A backend rejected a statement (or backends diverged on it).
    #[error("run {query:?} at line {line}: {message}")]
    Statement {
        query: String,
        line: usize,
        message: String,
    },

    #[error("trace: {0}")]
    TraceIo(String),

    #[error("setup: {0}")]
    FatalSetup(String),

    #[error("{0} not supported")]
    Unsupported(&'static str),

    /// Several failures raised while handling one query.
    #[error("{}", .0.join("; "))]
    Aggregate(Vec<String>),
}

/// Combine the errors collected while handling one query into at most one.
///
/// No errors yields `Ok(())`, a single error is returned unchanged, and
/// several are folded into [`TesterError::Aggregate`].
pub fn aggregate(mut errors: Vec<anyhow::Error>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => {
            let messages = errors.iter().map(|err| format!("{err:#}")).collect();
            Err(TesterError::Aggregate(messages).into())
        }
    }
}
