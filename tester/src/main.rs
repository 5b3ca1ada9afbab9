//! Differential SQL tester CLI.
//!
//! Replays mysqltest-style scripts against MySQL and Vitess and prints one
//! summary per script.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use vt_tester::exit_codes;
use vt_tester::io::config::load_config;
use vt_tester::io::loader::load_directives;
use vt_tester::logging;
use vt_tester::setup::tester_from_config;

const DEFAULT_CONFIG: &str = "vt-tester.toml";

#[derive(Parser)]
#[command(
    name = "vt-tester",
    version,
    about = "Differential SQL tester: MySQL as reference, Vitess as target"
)]
struct Cli {
    /// Log progress to stderr (`RUST_LOG` overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run test scripts and report divergences.
    Run {
        /// Config file (defaults to `vt-tester.toml` when present).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write `vexplain trace` output for every traced query to this file.
        #[arg(long)]
        trace_file: Option<PathBuf>,
        /// Run the target session with `workload = 'olap'`.
        #[arg(long)]
        olap: bool,
        /// Track created tables and drop all tables at the end of each script.
        #[arg(long)]
        auto_schema: bool,
        /// Scripts to run, in order.
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run {
            config,
            trace_file,
            olap,
            auto_schema,
            scripts,
        } => cmd_run(
            config.as_deref(),
            trace_file.as_deref(),
            olap,
            auto_schema,
            &scripts,
        ),
    }
}

fn cmd_run(
    config_path: Option<&Path>,
    trace_file: Option<&Path>,
    olap: bool,
    auto_schema: bool,
    scripts: &[PathBuf],
) -> Result<i32> {
    if trace_file.is_some() && scripts.len() > 1 {
        bail!("--trace-file records a single script; got {}", scripts.len());
    }
    let mut config = load_config(config_path.unwrap_or(Path::new(DEFAULT_CONFIG)))?;
    config.olap |= olap;
    config.auto_schema |= auto_schema;

    let mut failures = 0usize;
    for script in scripts {
        let name = script.display().to_string();
        let directives = load_directives(script)?;
        info!(script = %name, directives = directives.len(), "loaded script");

        let tester = tester_from_config(&config, &name, trace_file)?;
        let outcome = tester
            .run(&directives)
            .with_context(|| format!("run {name}"))?;
        println!("{}", outcome.report);
        failures += outcome.failures;
    }

    Ok(if failures > 0 {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_flags() {
        let cli = Cli::parse_from([
            "vt-tester",
            "run",
            "-v",
            "--trace-file",
            "trace.json",
            "--olap",
            "t/select.test",
        ]);
        let Command::Run {
            trace_file,
            olap,
            auto_schema,
            scripts,
            ..
        } = cli.command;
        assert!(cli.verbose);
        assert_eq!(trace_file, Some(PathBuf::from("trace.json")));
        assert!(olap);
        assert!(!auto_schema);
        assert_eq!(scripts, vec![PathBuf::from("t/select.test")]);
    }

    #[test]
    fn run_requires_a_script() {
        assert!(Cli::try_parse_from(["vt-tester", "run"]).is_err());
    }

    #[test]
    fn trace_file_with_several_scripts_is_rejected() {
        let scripts = vec![PathBuf::from("a.test"), PathBuf::from("b.test")];
        let err = cmd_run(None, Some(Path::new("trace.json")), false, false, &scripts).unwrap_err();
        assert!(err.to_string().contains("single script"));
    }
}
