//! Query runner pipeline.
//!
//! Every query goes through one [`QueryRunner`]: the comparing base runner,
//! optionally wrapped by decorators. A decorator decides per query, before
//! anything runs, whether the inner runner is called at all
//! ([`Delegation`]). The chain is assembled once per script by
//! [`PipelineBuilder`] and closed once at the end of the script.

pub mod comparing;
pub mod tracer;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::directive::Directive;
use crate::core::types::ExecutionRequest;
use crate::error::{TesterError, aggregate};
use crate::io::backend::Backends;
use crate::io::trace_writer::JsonArrayWriter;
use comparing::ComparingRunner;
use tracer::Tracer;

pub trait QueryRunner {
    /// Run one query. `Ok(())` means the query passed, or failed while
    /// `expect_error` allowed it.
    fn run_query(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<()>;

    /// Release resources held by this runner and everything it wraps.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Outcome of a decorator's pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegation {
    /// Call the inner runner, then [`Decorator::after`].
    Inner,
    /// The decorator fully handled the query; the inner runner is not called.
    Handled,
}

/// Side behavior layered around an inner runner.
pub trait Decorator {
    fn before(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<Delegation>;

    /// Runs only after the inner runner succeeded.
    fn after(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        request: &ExecutionRequest,
    ) -> Result<()>;

    fn close(self) -> Result<()>;
}

pub struct Decorated<D: Decorator> {
    decorator: D,
    inner: Box<dyn QueryRunner>,
}

impl<D: Decorator> Decorated<D> {
    pub fn new(decorator: D, inner: Box<dyn QueryRunner>) -> Self {
        Self { decorator, inner }
    }
}

impl<D: Decorator> QueryRunner for Decorated<D> {
    fn run_query(
        &mut self,
        backends: &mut Backends,
        query: &Directive,
        expect_error: bool,
        request: &ExecutionRequest,
    ) -> Result<()> {
        match self
            .decorator
            .before(backends, query, expect_error, request)?
        {
            Delegation::Handled => Ok(()),
            Delegation::Inner => {
                self.inner
                    .run_query(backends, query, expect_error, request)?;
                self.decorator.after(backends, query, request)
            }
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Decorated { decorator, inner } = *self;
        let mut errors = Vec::new();
        if let Err(err) = decorator.close() {
            errors.push(err);
        }
        if let Err(err) = inner.close() {
            errors.push(err);
        }
        aggregate(errors)
    }
}

/// Builds the runner chain for one script: the comparing runner, wrapped by
/// the trace recorder when a trace file is requested.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    row_limit: usize,
    auto_schema: bool,
    trace_file: Option<PathBuf>,
}

impl PipelineBuilder {
    pub fn new(row_limit: usize) -> Self {
        Self {
            row_limit,
            auto_schema: false,
            trace_file: None,
        }
    }

    pub fn with_auto_schema(mut self, auto_schema: bool) -> Self {
        self.auto_schema = auto_schema;
        self
    }

    pub fn with_trace_file(mut self, path: Option<&Path>) -> Self {
        self.trace_file = path.map(Path::to_path_buf);
        self
    }

    /// Assemble the chain, creating and opening the trace file if requested.
    ///
    /// Failing to open the trace file is a fatal setup error.
    #[instrument(skip_all, fields(trace = self.trace_file.is_some(), auto_schema = self.auto_schema))]
    pub fn build(self) -> Result<Box<dyn QueryRunner>> {
        let base: Box<dyn QueryRunner> =
            Box::new(ComparingRunner::new(self.row_limit, self.auto_schema));
        let Some(path) = self.trace_file else {
            debug!("pipeline without trace recorder");
            return Ok(base);
        };

        let file = File::create(&path).map_err(|err| {
            TesterError::FatalSetup(format!("create trace file {}: {err}", path.display()))
        })?;
        let writer = JsonArrayWriter::begin(BufWriter::new(file)).map_err(|err| {
            TesterError::FatalSetup(format!("open trace file {}: {err:#}", path.display()))
        })?;
        info!(path = %path.display(), "recording traces");
        Ok(Box::new(Decorated::new(
            Tracer::new(writer, self.row_limit),
            base,
        )))
    }
}
