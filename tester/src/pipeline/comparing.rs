//! Base runner: executes a statement on the backends in scope and compares.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::directive::Directive;
use crate::core::statement::StatementKind;
use crate::core::types::ExecutionRequest;
use crate::error::{TesterError, aggregate};
use crate::io::backend::{Backends, SchemaReady};
use crate::pipeline::QueryRunner;

pub struct ComparingRunner {
    row_limit: usize,
    auto_schema: bool,
}

impl ComparingRunner {
    pub fn new(row_limit: usize, auto_schema: bool) -> Self {
        Self {
            row_limit,
            auto_schema,
        }
    }

    fn execute(
        &self,
        backends: &mut Backends,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<()> {
        if request.statement.kind == StatementKind::CommentOnly {
            return Ok(());
        }

        let schema_ready = match request.statement.created_table() {
            Some(table) if self.auto_schema && !expect_error && request.target => {
                debug!(table, "registering created table");
                Some(backends.schema.on_create_table(&request.statement)?)
            }
            _ => None,
        };

        let executed = self.execute_in_scope(backends, expect_error, request);
        finish_schema(executed, schema_ready)
    }

    fn execute_in_scope(
        &self,
        backends: &mut Backends,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<()> {
        let sql = request.sql();
        let comparator = backends.comparator.as_mut();

        if expect_error {
            // Only whether a backend errors matters; the error itself is discarded.
            if request.reference
                && let Err(err) = comparator.reference().execute_fetch(sql, self.row_limit, false)
            {
                debug!(err = %err, "expected error from reference");
            }
            if request.target
                && let Err(err) = comparator.target().execute_fetch(sql, self.row_limit, false)
            {
                debug!(err = %err, "expected error from target");
            }
            return Ok(());
        }

        if request.capture_reference {
            let mut errors = Vec::new();
            if request.target {
                match comparator.target().execute_fetch(sql, self.row_limit, true) {
                    Ok(baseline) => debug!(rows = baseline.rows.len(), "captured target baseline"),
                    Err(err) => errors.push(err.context("target")),
                }
            }
            if request.reference
                && let Err(err) = comparator.reference().execute_fetch(sql, self.row_limit, true)
            {
                errors.push(err.context("reference"));
            }
            return aggregate(errors);
        }

        match (request.target, request.reference) {
            (true, true) => comparator.exec(sql),
            (true, false) => comparator
                .target()
                .execute_fetch(sql, self.row_limit, false)
                .map(drop),
            (false, true) => comparator
                .reference()
                .execute_fetch(sql, self.row_limit, false)
                .map(drop),
            (false, false) => Ok(()),
        }
    }
}

/// Run the schema-ready callback whatever the statement's outcome.
fn finish_schema(executed: Result<()>, schema_ready: Option<SchemaReady>) -> Result<()> {
    let Some(ready) = schema_ready else {
        return executed;
    };
    let ready = ready().context("wait for schema after create table");
    let errors = [executed, ready]
        .into_iter()
        .filter_map(Result::err)
        .collect();
    aggregate(errors)
}

impl QueryRunner for ComparingRunner {
    #[instrument(skip_all, fields(line = query.line))]
    fn run_query(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<()> {
        if query.text.trim().is_empty() {
            return Ok(());
        }
        self.execute(backends, expect_error, request)
            .map_err(|err| {
                TesterError::Statement {
                    query: query.text.clone(),
                    line: query.line,
                    message: format!("{err:#}"),
                }
                .into()
            })
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
