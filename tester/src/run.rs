//! Run loop: replays a directive stream through the query pipeline.
//!
//! Control directives mutate the [`ModeState`]; query directives are
//! dispatched through the pipeline. Per-directive failures go to the
//! reporter and never stop the loop. Only setup/teardown failures (session
//! preparation, schema teardown, closing the pipeline or comparator) are
//! returned as errors.

use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::directive::{
    AuthoritativeTarget, Directive, DirectiveKind, ScopeEdge, parse_authoritative_target,
    parse_explain_mode, parse_scope_edge, parse_version_gate,
};
use crate::core::mode::{ModeState, VersionOracle};
use crate::core::statement::classify;
use crate::core::types::ExecutionRequest;
use crate::error::{TesterError, aggregate};
use crate::io::backend::{Backends, UNLIMITED_ROWS};
use crate::io::reporter::Reporter;
use crate::pipeline::QueryRunner;

/// Script-level switches that are fixed for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TesterOptions {
    /// Put the target session in OLAP workload before the first directive.
    pub olap: bool,
    /// Drop every reference table once the script ends.
    pub auto_schema: bool,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome<R> {
    pub report: String,
    pub failures: usize,
    pub reporter: R,
}

pub struct Tester<R: Reporter> {
    name: String,
    backends: Backends,
    pipeline: Box<dyn QueryRunner>,
    reporter: R,
    oracle: Box<dyn VersionOracle>,
    options: TesterOptions,
    state: ModeState,
}

impl<R: Reporter> Tester<R> {
    pub fn new(
        name: impl Into<String>,
        backends: Backends,
        pipeline: Box<dyn QueryRunner>,
        reporter: R,
        oracle: Box<dyn VersionOracle>,
        options: TesterOptions,
    ) -> Self {
        Self {
            name: name.into(),
            backends,
            pipeline,
            reporter,
            oracle,
            options,
            state: ModeState::new(),
        }
    }

    /// Replay `directives` in order, then tear down and close everything.
    ///
    /// Teardown and close run even when preparing the session failed.
    #[instrument(skip_all, fields(name = %self.name, directives = directives.len()))]
    pub fn run(mut self, directives: &[Directive]) -> Result<RunOutcome<R>> {
        info!("starting script");
        let prepared = self.prepare_session();
        if prepared.is_ok() {
            for directive in directives {
                self.handle(directive);
            }
        }

        let teardown = if self.options.auto_schema {
            self.drop_reference_tables()
        } else {
            Ok(())
        };
        let Tester {
            mut backends,
            pipeline,
            reporter,
            ..
        } = self;
        let closed = pipeline.close();
        let disconnected = backends.comparator.close().context("close comparator");

        let errors = [prepared, teardown, closed, disconnected]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        aggregate(errors)?;

        let failures = reporter.failure_count();
        info!(failures, "script finished");
        Ok(RunOutcome {
            report: reporter.report(),
            failures,
            reporter,
        })
    }

    fn prepare_session(&mut self) -> Result<()> {
        if self.options.olap {
            self.backends
                .comparator
                .target()
                .execute_fetch("set workload = 'olap'", 0, false)
                .map_err(|err| {
                    TesterError::FatalSetup(format!("set workload to olap: {err:#}"))
                })?;
        }
        Ok(())
    }

    fn drop_reference_tables(&mut self) -> Result<()> {
        let tables = self
            .backends
            .comparator
            .reference()
            .execute_fetch("show tables", 1000, true)
            .map_err(|err| TesterError::FatalSetup(format!("show tables: {err:#}")))?;
        for row in &tables.rows {
            let Some(table) = row.first() else {
                continue;
            };
            debug!(table, "dropping table");
            if let Err(err) = self.backends.comparator.exec(&format!("drop table {table}")) {
                self.reporter.add_failure(&err.context(format!("drop table {table}")));
            }
        }
        Ok(())
    }

    fn handle(&mut self, directive: &Directive) {
        debug!(kind = %directive.kind, line = directive.line, "directive");
        if let Err(err) = self.dispatch(directive) {
            warn!(line = directive.line, err = %format!("{err:#}"), "directive failed");
            self.reporter.add_failure(&err);
        }
    }

    fn dispatch(&mut self, directive: &Directive) -> Result<()> {
        let text = directive.text.as_str();
        match directive.kind {
            DirectiveKind::Query => self.run_query(directive),
            DirectiveKind::Skip => {
                self.state.skip_next();
                Ok(())
            }
            DirectiveKind::SkipIfBelowVersion => {
                self.state.skip_if_below_version(parse_version_gate(text)?);
                Ok(())
            }
            DirectiveKind::Error => {
                self.state.expect_error();
                Ok(())
            }
            DirectiveKind::VExplain => {
                self.state.explain_next(parse_explain_mode(text)?);
                Ok(())
            }
            DirectiveKind::WaitForAuthoritative => self.wait_authoritative(text),
            DirectiveKind::RemoveFile => {
                let path = text.trim();
                fs::remove_file(path).with_context(|| format!("failed to remove file {path}"))
            }
            DirectiveKind::VitessOnly => {
                match parse_scope_edge(directive.kind, text)? {
                    ScopeEdge::Begin => self.state.begin_vitess_only()?,
                    ScopeEdge::End => self.state.end_vitess_only()?,
                }
                Ok(())
            }
            DirectiveKind::MysqlOnly => {
                match parse_scope_edge(directive.kind, text)? {
                    ScopeEdge::Begin => self.state.begin_mysql_only()?,
                    ScopeEdge::End => self.state.end_mysql_only()?,
                }
                Ok(())
            }
            DirectiveKind::Reference => {
                self.state.mark_reference();
                Ok(())
            }
            kind @ (DirectiveKind::Comment | DirectiveKind::EmptyLine | DirectiveKind::Unknown) => {
                Err(TesterError::Unsupported(kind.name()).into())
            }
        }
    }

    fn run_query(&mut self, query: &Directive) -> Result<()> {
        // A pending vexplain belongs to the next query record, skipped or not.
        if let Some(mode) = self.state.take_explain_mode() {
            self.vexplain(&mode, query);
        }
        if self.state.should_skip(self.oracle.as_ref()) {
            debug!(line = query.line, "skipping query");
            return Ok(());
        }
        let capture_reference = self.state.should_treat_as_reference();
        let expect_error = self.state.take_expected_error();

        self.reporter.add_test_case(&query.text, query.line);
        if let Err(err) = self.execute(query, expect_error, capture_reference) {
            warn!(line = query.line, err = %format!("{err:#}"), "query failed");
            self.reporter.add_failure(&err);
        }
        self.reporter.end_test_case();
        Ok(())
    }

    fn execute(
        &mut self,
        query: &Directive,
        expect_error: bool,
        capture_reference: bool,
    ) -> Result<()> {
        let statement = classify(&query.text).map_err(|err| TesterError::Statement {
            query: query.text.clone(),
            line: query.line,
            message: err.to_string(),
        })?;
        let request = ExecutionRequest {
            statement,
            target: self.state.target_in_scope(),
            reference: self.state.reference_in_scope(),
            capture_reference,
        };
        self.pipeline
            .run_query(&mut self.backends, query, expect_error, &request)
    }

    fn vexplain(&mut self, mode: &str, query: &Directive) {
        let sql = format!("vexplain {mode} {}", query.text);
        let result = self
            .backends
            .comparator
            .target()
            .execute_fetch(&sql, UNLIMITED_ROWS, false)
            .and_then(|rows| {
                rows.first_cell()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("vexplain {mode} returned no rows"))
            });
        match result {
            Ok(output) => self
                .reporter
                .add_info(&format!("VExplain Output:\n {output}\n")),
            Err(err) => self.reporter.add_failure(&err),
        }
    }

    fn wait_authoritative(&mut self, text: &str) -> Result<()> {
        let (table, keyspace) = match parse_authoritative_target(text)? {
            AuthoritativeTarget::Explicit { table, keyspace } => (table, keyspace),
            AuthoritativeTarget::Lookup { table } => {
                let keyspace = self.backends.schema.find_table(&table)?;
                (table, keyspace)
            }
        };
        info!(%table, %keyspace, "waiting for authoritative schema");
        self.backends
            .schema
            .wait_for_authoritative(&keyspace, &table)
            .with_context(|| format!("failed to wait for authoritative schema for table {table}"))
    }
}
