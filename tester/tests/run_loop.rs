//! Run-loop tests: mode directives, scopes and failure reporting, driven
//! through scripted connections.

use std::fs;

use vt_tester::core::directive::{Directive, DirectiveKind};
use vt_tester::core::types::RowSet;
use vt_tester::io::backend::Backends;
use vt_tester::io::compare::DualComparator;
use vt_tester::io::loader::parse_script;
use vt_tester::io::reporter::SummaryReporter;
use vt_tester::pipeline::PipelineBuilder;
use vt_tester::run::{RunOutcome, TesterOptions};
use vt_tester::test_support::{
    ExecLog, FixedVersionOracle, RecordingSchemaManager, ScriptedConnection, backends, tester,
};

struct Logs {
    reference: ExecLog,
    target: ExecLog,
}

fn run_script(
    script: &str,
    reference: ScriptedConnection,
    target: ScriptedConnection,
) -> (RunOutcome<SummaryReporter>, Logs) {
    run_with(script, reference, target, FixedVersionOracle(80_030), TesterOptions::default())
}

fn run_with(
    script: &str,
    reference: ScriptedConnection,
    target: ScriptedConnection,
    oracle: FixedVersionOracle,
    options: TesterOptions,
) -> (RunOutcome<SummaryReporter>, Logs) {
    let logs = Logs {
        reference: reference.log(),
        target: target.log(),
    };
    let directives = parse_script(script).expect("parse");
    let pipeline = PipelineBuilder::new(10_000).build().expect("pipeline");
    let outcome = tester(backends(reference, target), pipeline, oracle, options)
        .run(&directives)
        .expect("run");
    (outcome, logs)
}

fn messages(outcome: &RunOutcome<SummaryReporter>) -> Vec<String> {
    outcome
        .reporter
        .failures()
        .iter()
        .map(|f| f.message.clone())
        .collect()
}

#[test]
fn identical_results_pass() {
    let rows = RowSet::new(vec![vec!["1".into()], vec!["2".into()]]);
    let reference = ScriptedConnection::new().respond("select id from t", rows.clone());
    let target = ScriptedConnection::new().respond("select id from t", rows);
    let (outcome, logs) = run_script("select id from t;\n", reference, target);

    assert_eq!(outcome.failures, 0);
    assert_eq!(outcome.report, "t.test: 1 queries, 0 failed");
    assert_eq!(logs.reference.entries(), vec!["select id from t"]);
    assert_eq!(logs.target.entries(), vec!["select id from t"]);
}

#[test]
fn skip_suppresses_exactly_the_next_query() {
    let (outcome, logs) = run_script(
        "--skip\nselect 1;\nselect 2;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );

    assert_eq!(outcome.reporter.cases(), &[("select 2".to_string(), 3)]);
    assert_eq!(logs.target.entries(), vec!["select 2"]);
    assert_eq!(logs.reference.entries(), vec!["select 2"]);
}

#[test]
fn version_gate_skips_one_query_when_binary_is_too_old() {
    let script = "--skip_if_below_version mysqld 80000\nselect 1;\nselect 2;\n";

    let (outcome, logs) = run_with(
        script,
        ScriptedConnection::new(),
        ScriptedConnection::new(),
        FixedVersionOracle(50_744),
        TesterOptions::default(),
    );
    assert_eq!(outcome.failures, 0);
    assert_eq!(logs.target.entries(), vec!["select 2"]);

    let (_, logs) = run_with(
        script,
        ScriptedConnection::new(),
        ScriptedConnection::new(),
        FixedVersionOracle(80_030),
        TesterOptions::default(),
    );
    assert_eq!(logs.target.entries(), vec!["select 1", "select 2"]);
}

#[test]
fn expected_error_is_swallowed_and_applies_once() {
    let sql = "select * from missing";
    let failing = || {
        (
            ScriptedConnection::new().fail(sql, "Table 'missing' doesn't exist"),
            ScriptedConnection::new().fail(sql, "table missing not found"),
        )
    };

    let (reference, target) = failing();
    let (outcome, logs) = run_script(&format!("--error\n{sql};\n"), reference, target);
    assert_eq!(outcome.failures, 0);
    assert_eq!(logs.reference.count(sql), 1);
    assert_eq!(logs.target.count(sql), 1);

    let (reference, target) = failing();
    let (outcome, _) = run_script(&format!("--error\n{sql};\n{sql};\n"), reference, target);
    assert_eq!(outcome.failures, 1);
    assert_eq!(outcome.reporter.failures()[0].line, Some(3));
}

#[test]
fn divergent_results_fail_with_query_and_line() {
    let reference =
        ScriptedConnection::new().respond("select a from t", RowSet::new(vec![vec!["1".into()]]));
    let target =
        ScriptedConnection::new().respond("select a from t", RowSet::new(vec![vec!["2".into()]]));
    let (outcome, _) = run_script("\nselect a from t;\n", reference, target);

    assert_eq!(outcome.failures, 1);
    let message = &messages(&outcome)[0];
    assert!(message.starts_with("run \"select a from t\" at line 2: "), "{message}");
    assert!(message.contains("results differ"), "{message}");
    assert!(outcome.report.contains("line 2: run"));
}

#[test]
fn reference_accepts_divergence_for_one_query() {
    let respond = |value: &str| {
        ScriptedConnection::new().respond("select a from t", RowSet::cell(value))
    };

    let (outcome, logs) = run_script(
        "--reference\nselect a from t;\n",
        respond("1"),
        respond("2"),
    );
    assert_eq!(outcome.failures, 0);
    assert_eq!(logs.target.entries(), vec!["select a from t"]);
    assert_eq!(logs.reference.entries(), vec!["select a from t"]);

    let (outcome, _) = run_script(
        "--reference\nselect a from t;\nselect a from t;\n",
        respond("1"),
        respond("2"),
    );
    assert_eq!(outcome.failures, 1);
}

#[test]
fn vitess_only_scope_runs_on_target_alone() {
    let (outcome, logs) = run_script(
        "--vitess_only begin\nselect 1;\n--vitess_only end\nselect 2;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );

    assert_eq!(outcome.failures, 0);
    assert_eq!(logs.target.entries(), vec!["select 1", "select 2"]);
    assert_eq!(logs.reference.entries(), vec!["select 2"]);
}

#[test]
fn mysql_only_scope_runs_on_reference_alone() {
    let (outcome, logs) = run_script(
        "--mysql_only begin\nselect 1;\n--mysql_only end\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );

    assert_eq!(outcome.failures, 0);
    assert!(logs.target.is_empty());
    assert_eq!(logs.reference.entries(), vec!["select 1"]);
}

#[test]
fn scope_errors_are_reported_and_the_run_continues() {
    let (outcome, logs) = run_script(
        "--vitess_only end\n--mysql_only begin\n--vitess_only begin\nselect 1;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );

    assert_eq!(
        messages(&outcome),
        vec!["no vitess_only to end", "cannot begin vitess_only within mysql_only"]
    );
    assert_eq!(logs.reference.entries(), vec!["select 1"]);
    assert!(logs.target.is_empty());
}

#[test]
fn reference_is_ignored_inside_a_scope() {
    let reference =
        ScriptedConnection::new().respond("select a from t", RowSet::cell("1"));
    let target = ScriptedConnection::new().respond("select a from t", RowSet::cell("2"));
    let (outcome, logs) = run_script(
        "--vitess_only begin\n--reference\n--vitess_only end\nselect a from t;\n",
        reference,
        target,
    );

    assert_eq!(outcome.failures, 1);
    assert_eq!(logs.reference.entries(), vec!["select a from t"]);
}

#[test]
fn non_actionable_directives_are_unsupported() {
    let directives = vec![
        Directive::new(DirectiveKind::Comment, "note", 1),
        Directive::new(DirectiveKind::EmptyLine, "", 2),
        Directive::query("select 1", 3),
    ];
    let pipeline = PipelineBuilder::new(10_000).build().expect("pipeline");
    let outcome = tester(
        backends(ScriptedConnection::new(), ScriptedConnection::new()),
        pipeline,
        FixedVersionOracle(80_030),
        TesterOptions::default(),
    )
    .run(&directives)
    .expect("run");

    assert_eq!(
        messages(&outcome),
        vec!["comment not supported", "empty_line not supported"]
    );
    assert_eq!(outcome.reporter.cases().len(), 1);
}

#[test]
fn unknown_directive_from_script_is_unsupported() {
    let (outcome, _) = run_script(
        "--frobnicate now\nselect 1;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );
    assert_eq!(messages(&outcome), vec!["unknown not supported"]);
}

#[test]
fn malformed_directive_arguments_are_reported() {
    let (outcome, logs) = run_script(
        "--skip_if_below_version mysqld\n--vexplain\nselect 1;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );

    assert_eq!(outcome.failures, 2);
    assert_eq!(logs.target.entries(), vec!["select 1"]);
}

#[test]
fn vexplain_output_is_reported_as_info() {
    let target = ScriptedConnection::new()
        .respond("vexplain plan select 1", RowSet::cell("{\"OperatorType\": \"Route\"}"));
    let (outcome, logs) = run_script("--vexplain plan\nselect 1;\n", ScriptedConnection::new(), target);

    assert_eq!(outcome.failures, 0);
    assert_eq!(
        outcome.reporter.infos(),
        &["VExplain Output:\n {\"OperatorType\": \"Route\"}\n".to_string()]
    );
    assert_eq!(logs.target.entries(), vec!["vexplain plan select 1", "select 1"]);
}

#[test]
fn vexplain_is_consumed_by_a_skipped_query() {
    let target = ScriptedConnection::new()
        .respond("vexplain plan select 1", RowSet::cell("{\"OperatorType\": \"Route\"}"));
    let (outcome, logs) = run_script(
        "--vexplain plan\n--skip\nselect 1;\nselect 2;\n",
        ScriptedConnection::new(),
        target,
    );

    assert_eq!(outcome.failures, 0, "{}", outcome.report);
    assert_eq!(outcome.reporter.infos().len(), 1);
    assert_eq!(outcome.reporter.cases(), &[("select 2".to_string(), 4)]);
    assert_eq!(logs.target.entries(), vec!["vexplain plan select 1", "select 2"]);
}

#[test]
fn expected_error_carries_past_a_skipped_query() {
    let sql = "select * from missing";
    let reference = ScriptedConnection::new().fail(sql, "Table 'missing' doesn't exist");
    let target = ScriptedConnection::new().fail(sql, "table missing not found");
    let (outcome, _) = run_script(&format!("--error\n--skip\nselect 1;\n{sql};\n"), reference, target);

    assert_eq!(outcome.failures, 0, "{}", outcome.report);
}

#[test]
fn olap_session_is_prepared_on_target() {
    let (outcome, logs) = run_with(
        "select 1;\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
        FixedVersionOracle(80_030),
        TesterOptions {
            olap: true,
            auto_schema: false,
        },
    );

    assert_eq!(outcome.failures, 0);
    assert_eq!(
        logs.target.entries(),
        vec!["set workload = 'olap'", "select 1"]
    );
}

#[test]
fn failing_olap_setup_is_fatal() {
    let target = ScriptedConnection::new().fail("set workload = 'olap'", "unknown variable");
    let directives = parse_script("select 1;\n").expect("parse");
    let pipeline = PipelineBuilder::new(10_000).build().expect("pipeline");
    let log = target.log();
    let err = tester(
        backends(ScriptedConnection::new(), target),
        pipeline,
        FixedVersionOracle(80_030),
        TesterOptions {
            olap: true,
            auto_schema: false,
        },
    )
    .run(&directives)
    .err()
    .expect("run must fail");

    assert!(format!("{err:#}").contains("olap"));
    assert_eq!(log.entries(), vec!["set workload = 'olap'"]);
}

#[test]
fn remove_file_deletes_the_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("dump.txt");
    fs::write(&path, "rows").expect("write");

    let script = format!("--remove_file {}\n--remove_file {}\n", path.display(), path.display());
    let (outcome, _) = run_script(&script, ScriptedConnection::new(), ScriptedConnection::new());

    assert!(!path.exists());
    assert_eq!(outcome.failures, 1);
    assert!(messages(&outcome)[0].starts_with("failed to remove file"));
}

fn schema_backends(
    reference: ScriptedConnection,
    target: ScriptedConnection,
    events: &ExecLog,
) -> Backends {
    Backends::new(
        Box::new(DualComparator::new(reference, target, 10_000)),
        Box::new(RecordingSchemaManager::new(&["ks"], events)),
    )
}

#[test]
fn auto_schema_registers_tables_and_drops_them_at_the_end() {
    let events = ExecLog::new();
    let reference = ScriptedConnection::new().respond(
        "show tables",
        RowSet::new(vec![vec!["t1".into()]]),
    );
    let target = ScriptedConnection::new();
    let (reference_log, target_log) = (reference.log(), target.log());

    let directives = parse_script(
        "create table t1 (id bigint primary key);\n--wait_authoritative t1\nselect * from t1;\n",
    )
    .expect("parse");
    let pipeline = PipelineBuilder::new(10_000)
        .with_auto_schema(true)
        .build()
        .expect("pipeline");
    let outcome = tester(
        schema_backends(reference, target, &events),
        pipeline,
        FixedVersionOracle(80_030),
        TesterOptions {
            olap: false,
            auto_schema: true,
        },
    )
    .run(&directives)
    .expect("run");

    assert_eq!(outcome.failures, 0, "{}", outcome.report);
    assert_eq!(events.entries(), vec!["create t1", "ready t1", "wait ks.t1"]);
    assert_eq!(reference_log.count("show tables"), 1);
    assert_eq!(reference_log.count("drop table t1"), 1);
    assert_eq!(target_log.count("drop table t1"), 1);
}

#[test]
fn create_table_with_expected_error_is_not_registered() {
    let events = ExecLog::new();
    let directives = parse_script("--error\ncreate table t1 (id int);\n").expect("parse");
    let pipeline = PipelineBuilder::new(10_000)
        .with_auto_schema(true)
        .build()
        .expect("pipeline");
    tester(
        schema_backends(ScriptedConnection::new(), ScriptedConnection::new(), &events),
        pipeline,
        FixedVersionOracle(80_030),
        TesterOptions::default(),
    )
    .run(&directives)
    .expect("run");

    assert!(events.is_empty());
}

#[test]
fn wait_authoritative_for_unknown_table_fails() {
    let (outcome, _) = run_script(
        "--wait_authoritative nope\n",
        ScriptedConnection::new(),
        ScriptedConnection::new(),
    );
    assert_eq!(
        messages(&outcome),
        vec!["table nope not found in any keyspace"]
    );
}
