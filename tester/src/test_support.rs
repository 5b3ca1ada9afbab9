//! Test-only backends for driving a [`Tester`] without a database.
//!
//! Scripted connections answer by exact SQL text and record every statement
//! they receive in a shared [`ExecLog`], so tests can assert which backend
//! saw what, and in which order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::mode::VersionOracle;
use crate::core::statement::Statement;
use crate::core::types::RowSet;
use crate::io::backend::{Backends, Connection, SchemaManager, SchemaReady};
use crate::io::compare::DualComparator;
use crate::io::reporter::SummaryReporter;
use crate::io::schema::LocalSchema;
use crate::pipeline::QueryRunner;
use crate::run::{Tester, TesterOptions};

/// Shared, ordered record of executed statements or schema events.
#[derive(Debug, Clone, Default)]
pub struct ExecLog(Rc<RefCell<Vec<String>>>);

impl ExecLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Number of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// A connection answering from a table of canned responses.
///
/// Unscripted statements succeed with no rows.
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    responses: HashMap<String, Result<RowSet, String>>,
    log: ExecLog,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, sql: &str, rows: RowSet) -> Self {
        self.responses.insert(sql.to_string(), Ok(rows));
        self
    }

    pub fn fail(mut self, sql: &str, message: &str) -> Self {
        self.responses
            .insert(sql.to_string(), Err(message.to_string()));
        self
    }

    /// Record executed statements into `log`.
    pub fn with_log(mut self, log: &ExecLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn log(&self) -> ExecLog {
        self.log.clone()
    }
}

impl Connection for ScriptedConnection {
    fn execute_fetch(&mut self, sql: &str, row_limit: usize, _want_fields: bool) -> Result<RowSet> {
        self.log.push(sql);
        let rows = match self.responses.get(sql) {
            Some(Ok(rows)) => rows.clone(),
            Some(Err(message)) => return Err(anyhow!("{message}")),
            None => RowSet::default(),
        };
        if rows.rows.len() > row_limit {
            bail!("row count exceeded {row_limit}");
        }
        Ok(rows)
    }
}

/// Schema manager that records `create`, `ready` and `wait` events.
#[derive(Debug)]
pub struct RecordingSchemaManager {
    inner: LocalSchema,
    events: ExecLog,
}

impl RecordingSchemaManager {
    pub fn new(keyspaces: &[&str], events: &ExecLog) -> Self {
        Self {
            inner: LocalSchema::new(keyspaces.iter().map(|ks| ks.to_string()).collect()),
            events: events.clone(),
        }
    }
}

impl SchemaManager for RecordingSchemaManager {
    fn on_create_table(&mut self, statement: &Statement) -> Result<SchemaReady> {
        let table = statement.created_table().unwrap_or_default().to_string();
        self.events.push(format!("create {table}"));
        let ready = self.inner.on_create_table(statement)?;
        let events = self.events.clone();
        Ok(Box::new(move || {
            ready()?;
            events.push(format!("ready {table}"));
            Ok(())
        }))
    }

    fn find_table(&self, table: &str) -> Result<String> {
        self.inner.find_table(table)
    }

    fn wait_for_authoritative(&mut self, keyspace: &str, table: &str) -> Result<()> {
        self.events.push(format!("wait {keyspace}.{table}"));
        self.inner.wait_for_authoritative(keyspace, table)
    }
}

/// Every binary reports the same installed version.
#[derive(Debug, Clone, Copy)]
pub struct FixedVersionOracle(pub u32);

impl VersionOracle for FixedVersionOracle {
    fn is_binary_at_least_version(&self, version: u32, _binary: &str) -> bool {
        self.0 >= version
    }
}

/// Comparator over two scripted connections with a single `ks` keyspace.
pub fn backends(reference: ScriptedConnection, target: ScriptedConnection) -> Backends {
    Backends::new(
        Box::new(DualComparator::new(reference, target, 10_000)),
        Box::new(LocalSchema::new(vec!["ks".to_string()])),
    )
}

/// A tester named `t.test` with a summary reporter.
pub fn tester(
    backends: Backends,
    pipeline: Box<dyn QueryRunner>,
    oracle: FixedVersionOracle,
    options: TesterOptions,
) -> Tester<SummaryReporter> {
    Tester::new(
        "t.test",
        backends,
        pipeline,
        SummaryReporter::new("t.test"),
        Box::new(oracle),
        options,
    )
}

/// Writer that accepts `capacity` bytes, then fails like a full disk.
#[derive(Debug)]
pub struct FullWriter {
    remaining: usize,
}

impl FullWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            remaining: capacity,
        }
    }
}

impl Write for FullWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::other("no space left on device"));
        }
        let n = buf.len().min(self.remaining);
        self.remaining -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A trace file path inside a temporary directory.
pub struct TraceFile {
    _dir: TempDir,
    path: PathBuf,
}

impl TraceFile {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let path = dir.path().join("trace.json");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_json(&self) -> Result<Value> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", self.path.display()))
    }
}
