//! Backend abstractions consumed by the pipeline and the run loop.
//!
//! The [`Comparator`] owns the reference/target connection pair; the tester
//! only borrows it for the duration of one directive. Tests use scripted
//! connections that return predetermined rows without a database.

use anyhow::Result;

use crate::core::statement::Statement;
use crate::core::types::RowSet;

/// No row limit for [`Connection::execute_fetch`].
pub const UNLIMITED_ROWS: usize = usize::MAX;

/// One blocking connection to a backend.
pub trait Connection {
    /// Execute `sql` and return at most `row_limit` rows; more rows is an error.
    fn execute_fetch(&mut self, sql: &str, row_limit: usize, want_fields: bool) -> Result<RowSet>;
}

/// Dual-connection comparator: reference (MySQL) and target (Vitess).
pub trait Comparator {
    fn reference(&mut self) -> &mut dyn Connection;

    fn target(&mut self) -> &mut dyn Connection;

    /// Execute on both backends and fail if either errors or their results diverge.
    fn exec(&mut self, sql: &str) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Called once the target has applied schema changes for a created table.
pub type SchemaReady = Box<dyn FnOnce() -> Result<()>>;

/// Schema/VSchema management for tables the script creates.
pub trait SchemaManager {
    /// Register the table created by `statement` before it executes.
    ///
    /// The returned callback runs after execution and waits for the schema.
    fn on_create_table(&mut self, statement: &Statement) -> Result<SchemaReady>;

    /// Keyspace holding `table`; fails if it is unknown or ambiguous.
    fn find_table(&self, table: &str) -> Result<String>;

    fn wait_for_authoritative(&mut self, keyspace: &str, table: &str) -> Result<()>;
}

/// Everything a directive may touch on the backend side.
pub struct Backends {
    pub comparator: Box<dyn Comparator>,
    pub schema: Box<dyn SchemaManager>,
}

impl Backends {
    pub fn new(comparator: Box<dyn Comparator>, schema: Box<dyn SchemaManager>) -> Self {
        Self { comparator, schema }
    }
}
