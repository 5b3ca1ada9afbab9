//! Trace recorder: records `vexplain trace` output from the target for each
//! select or DML statement into the trace file.

use std::io::Write;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::directive::Directive;
use crate::core::types::ExecutionRequest;
use crate::error::{TesterError, aggregate};
use crate::io::backend::Backends;
use crate::io::trace_writer::JsonArrayWriter;
use crate::pipeline::{Decorator, Delegation};

/// One element of the trace file.
#[derive(Debug, Serialize)]
pub struct TraceEntry<'a> {
    #[serde(rename = "Query")]
    pub query: &'a str,
    #[serde(rename = "LineNumber")]
    pub line_number: String,
    #[serde(rename = "Trace")]
    pub trace: Value,
}

pub struct Tracer<W: Write> {
    writer: JsonArrayWriter<W>,
    row_limit: usize,
}

impl<W: Write> Tracer<W> {
    pub fn new(writer: JsonArrayWriter<W>, row_limit: usize) -> Self {
        Self { writer, row_limit }
    }

    /// DML that is traced runs exactly once on the target, through the trace
    /// itself, so the comparing runner must not run it again.
    fn handles_directly(expect_error: bool, request: &ExecutionRequest) -> bool {
        request.is_dml() && !expect_error && request.target
    }

    fn run_traced_dml(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        request: &ExecutionRequest,
    ) -> Result<()> {
        let mut errors = Vec::new();
        if let Err(err) = self.capture(backends, query) {
            errors.push(err);
        }
        if request.reference
            && let Err(err) = backends
                .comparator
                .reference()
                .execute_fetch(&query.text, self.row_limit, false)
        {
            errors.push(err.context("reference"));
        }
        aggregate(errors)
    }

    /// Fetch the target's trace for `query` and append it to the trace file.
    #[instrument(skip_all, fields(line = query.line))]
    fn capture(&mut self, backends: &mut Backends, query: &Directive) -> Result<()> {
        let rows = backends
            .comparator
            .target()
            .execute_fetch(
                &format!("vexplain trace {}", query.text),
                self.row_limit,
                false,
            )
            .context("vexplain trace")?;
        let payload = rows
            .first_cell()
            .ok_or_else(|| anyhow!("vexplain trace returned no rows"))?;
        let trace: Value = serde_json::from_str(payload).map_err(|err| {
            TesterError::TraceIo(format!("invalid trace payload at line {}: {err}", query.line))
        })?;

        self.writer
            .push(&TraceEntry {
                query: &query.text,
                line_number: query.line.to_string(),
                trace,
            })
            .map_err(|err| TesterError::TraceIo(format!("{err:#}")))?;
        debug!(entries = self.writer.len(), "trace entry written");
        Ok(())
    }
}

impl<W: Write> Decorator for Tracer<W> {
    fn before(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<Delegation> {
        if !Self::handles_directly(expect_error, request) {
            return Ok(Delegation::Inner);
        }
        self.run_traced_dml(backends, query, request)?;
        Ok(Delegation::Handled)
    }

    fn after(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        request: &ExecutionRequest,
    ) -> Result<()> {
        if request.target && (request.is_select() || request.is_dml()) {
            return self.capture(backends, query);
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        let entries = self.writer.len();
        self.writer
            .finish()
            .map_err(|err| TesterError::FatalSetup(format!("close trace file: {err:#}")))?;
        info!(entries, "trace file closed");
        Ok(())
    }
}
