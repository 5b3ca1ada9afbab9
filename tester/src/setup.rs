//! Wiring a [`Tester`] from configuration for the CLI.

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::error::TesterError;
use crate::io::backend::Backends;
use crate::io::command_conn::CommandConnection;
use crate::io::compare::DualComparator;
use crate::io::config::{BackendConfig, TesterConfig};
use crate::io::reporter::SummaryReporter;
use crate::io::schema::LocalSchema;
use crate::io::version::CommandVersionOracle;
use crate::pipeline::PipelineBuilder;
use crate::run::{Tester, TesterOptions};

/// Build an engine instance for one script: its own connections, pipeline and reporter.
///
/// Any failure here is a fatal setup error.
pub fn tester_from_config(
    config: &TesterConfig,
    name: &str,
    trace_file: Option<&Path>,
) -> Result<Tester<SummaryReporter>> {
    config
        .validate()
        .map_err(|err| TesterError::FatalSetup(format!("{err:#}")))?;

    let reference = connection(config, "reference", &config.reference)?;
    let target = connection(config, "target", &config.target)?;
    let comparator = DualComparator::new(reference, target, config.row_limit);
    let schema = LocalSchema::new(config.keyspaces.clone()).with_tables(&config.keyspace_tables);

    let pipeline = PipelineBuilder::new(config.row_limit)
        .with_auto_schema(config.auto_schema)
        .with_trace_file(trace_file)
        .build()?;
    debug!(name, "tester ready");

    Ok(Tester::new(
        name,
        Backends::new(Box::new(comparator), Box::new(schema)),
        pipeline,
        SummaryReporter::new(name),
        Box::new(CommandVersionOracle::new(config.statement_timeout())),
        TesterOptions {
            olap: config.olap,
            auto_schema: config.auto_schema,
        },
    ))
}

fn connection(
    config: &TesterConfig,
    label: &str,
    backend: &BackendConfig,
) -> Result<CommandConnection> {
    let conn = CommandConnection::new(label, backend.command.clone())
        .map_err(|err| TesterError::FatalSetup(format!("{label} connection: {err:#}")))?;
    Ok(conn
        .with_timeout(config.statement_timeout())
        .with_output_limit(config.output_limit_bytes))
}
