//! Differential SQL test engine.
//!
//! Replays a script of directives and SQL statements against a reference
//! backend (MySQL) and a target backend (Vitess), reports divergence, and
//! optionally records a per-query execution trace from the target.
//!
//! - **[`core`]**: Pure, deterministic logic (directives, mode state,
//!   statement classification). No I/O, fully testable in isolation.
//! - **[`io`]**: Collaborator contracts and their side-effecting adapters
//!   (connections, comparator, reporter, trace writer, config).
//! - **[`pipeline`]**: The query runner chain: a comparing base runner wrapped
//!   by decorators such as the trace recorder.
//!
//! [`run`] drives the directive stream through the pipeline; [`setup`] wires
//! a [`run::Tester`] from configuration for the CLI.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod run;
pub mod setup;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
