//! Connection that runs each statement through a SQL client command.
//!
//! The configured command (e.g. `mysql --batch -h 127.0.0.1 -P 15306 -e`)
//! receives the statement as its final argument and prints tab-separated
//! batch output: a header line followed by one line per row.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::types::RowSet;
use crate::io::backend::Connection;
use crate::io::process::run_with_timeout;

pub struct CommandConnection {
    label: String,
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    /// Successful `SET`/`USE` statements, replayed ahead of every statement
    /// since each invocation is a fresh client session.
    session: Vec<String>,
}

impl CommandConnection {
    pub fn new(label: impl Into<String>, command: Vec<String>) -> Result<Self> {
        if command.first().is_none_or(|program| program.trim().is_empty()) {
            bail!("client command must be a non-empty array");
        }
        Ok(Self {
            label: label.into(),
            command,
            timeout: Duration::from_secs(60),
            output_limit_bytes: 10_000_000,
            session: Vec::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    pub fn session(&self) -> &[String] {
        &self.session
    }

    fn script_for(&self, sql: &str) -> String {
        let mut parts: Vec<&str> = self.session.iter().map(String::as_str).collect();
        parts.push(sql);
        parts.join("; ")
    }
}

impl Connection for CommandConnection {
    #[instrument(skip_all, fields(backend = %self.label))]
    fn execute_fetch(&mut self, sql: &str, row_limit: usize, want_fields: bool) -> Result<RowSet> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]).arg(self.script_for(sql));
        debug!(sql, "executing statement");

        let output = run_with_timeout(cmd, self.timeout, self.output_limit_bytes)?;
        if output.timed_out {
            bail!("{}: statement timed out after {:?}", self.label, self.timeout);
        }
        if !output.status.success() {
            return Err(anyhow!("{}: {}", self.label, output.failure_message()));
        }
        if output.truncated > 0 {
            bail!(
                "{}: result exceeds {} bytes of output",
                self.label,
                self.output_limit_bytes
            );
        }

        let mut rows = parse_batch_output(&output.stdout_text());
        if rows.rows.len() > row_limit {
            bail!(
                "{}: row count exceeded {row_limit} ({} rows)",
                self.label,
                rows.rows.len()
            );
        }
        if !want_fields {
            rows.fields.clear();
        }
        if is_session_statement(sql) {
            self.session.push(sql.trim().trim_end_matches(';').to_string());
        }
        Ok(rows)
    }
}

/// Parse `mysql --batch` output: header line, then tab-separated rows.
pub fn parse_batch_output(stdout: &str) -> RowSet {
    let mut lines = stdout.lines();
    let Some(header) = lines.next() else {
        return RowSet::default();
    };
    RowSet {
        fields: split_row(header),
        rows: lines.map(split_row).collect(),
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.split('\t').map(unescape).collect()
}

/// Undo batch-mode escaping of `\t`, `\n`, `\\` and `\0`.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn is_session_statement(sql: &str) -> bool {
    let mut words = sql.split_whitespace();
    words
        .next()
        .is_some_and(|verb| verb.eq_ignore_ascii_case("set") || verb.eq_ignore_ascii_case("use"))
}
