use std::fs;
use std::path::{Path, PathBuf};

use reflex_core::ReflexEngine;
use reflex_core::models::{AnalysisStatus, SampleRecord};
use tempfile::tempdir;

use super::import::import_rules;
use super::{run_sample_file, run_validated};
use crate::cli::{Commands, LogsArgs, RetryArgs, RuleArgs, RuleCommand, SampleArgs};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn rule(command: RuleCommand) -> Commands {
    Commands::Rule(RuleArgs { command })
}

fn copy_sample(dir: &Path) -> PathBuf {
    let path = dir.join("sample.json");
    fs::copy(fixture("sample_low_cd4.json"), &path).expect("copy sample");
    path
}

fn read_sample(path: &Path) -> SampleRecord {
    let raw = fs::read_to_string(path).expect("read sample");
    serde_json::from_str(&raw).expect("parse sample")
}

fn save_cd4(engine: &ReflexEngine) {
    run_validated(
        engine,
        rule(RuleCommand::Save {
            graph: fixture("cd4_graph.json"),
            format: None,
            name: "CD4 reflex".to_string(),
            uid: Some("cd4".to_string()),
            description: String::new(),
            priority: 0,
        }),
    )
    .expect("save");
}

#[test]
fn run_writes_created_analyses_back_to_the_sample_file() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    save_cd4(&engine);
    run_validated(&engine, rule(RuleCommand::Publish { uid: "cd4".to_string() })).expect("publish");

    let sample = copy_sample(temp.path());
    run_validated(&engine, Commands::Run(SampleArgs { sample: sample.clone() })).expect("run");

    let record = read_sample(&sample);
    let vl = record
        .analyses
        .iter()
        .filter(|analysis| analysis.analysis_uid == "VL")
        .collect::<Vec<_>>();
    assert_eq!(vl.len(), 1);
    assert_eq!(vl[0].status, AnalysisStatus::Pending);
    assert_eq!(vl[0].sample_uid, "S-100");

    run_validated(&engine, Commands::Run(SampleArgs { sample: sample.clone() })).expect("rerun");
    let record = read_sample(&sample);
    assert_eq!(
        record
            .analyses
            .iter()
            .filter(|analysis| analysis.analysis_uid == "VL")
            .count(),
        1,
        "an applied decision must not fire twice"
    );
}

fn write_sample(path: &Path, record: &SampleRecord) {
    fs::write(path, serde_json::to_string_pretty(record).expect("encode")).expect("write sample");
}

fn vl_count(path: &Path) -> usize {
    read_sample(path)
        .analyses
        .iter()
        .filter(|analysis| analysis.analysis_uid == "VL")
        .count()
}

#[test]
fn retry_applies_actions_that_failed_during_run() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    save_cd4(&engine);
    run_validated(&engine, rule(RuleCommand::Publish { uid: "cd4".to_string() })).expect("publish");

    let sample = copy_sample(temp.path());
    let mut record = read_sample(&sample);
    record.orderable = Some(vec!["CD4".to_string()]);
    write_sample(&sample, &record);

    let report = run_sample_file(&engine, &sample).expect("run");
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].rule_uid, "cd4");
    assert_eq!(vl_count(&sample), 0);
    let failed = temp.path().join("run.json");
    fs::write(&failed, serde_json::to_string(&report).expect("encode")).expect("write report");

    // The decision is already recorded, so a plain rerun cannot recover it.
    run_validated(&engine, Commands::Run(SampleArgs { sample: sample.clone() })).expect("rerun");
    assert_eq!(vl_count(&sample), 0);

    let mut record = read_sample(&sample);
    record.orderable = None;
    write_sample(&sample, &record);
    run_validated(
        &engine,
        Commands::Retry(RetryArgs {
            sample: sample.clone(),
            failed: failed.clone(),
        }),
    )
    .expect("retry");
    assert_eq!(vl_count(&sample), 1);

    run_validated(&engine, Commands::Run(SampleArgs { sample: sample.clone() })).expect("run again");
    assert_eq!(vl_count(&sample), 1);
    let logs = engine.list_request_logs(10).expect("logs");
    assert!(logs.iter().any(|entry| entry.operation == "reflex.retry"));
}

#[test]
fn retry_rejects_a_report_for_another_sample() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    let sample = copy_sample(temp.path());
    let failed = temp.path().join("run.json");
    fs::write(
        &failed,
        r#"{"sample_uid": "S-999", "levels": [], "truncated": false}"#,
    )
    .expect("write report");

    let err = run_validated(&engine, Commands::Retry(RetryArgs { sample, failed }))
        .expect_err("foreign report");
    assert!(err.to_string().contains("S-999"));
}

#[test]
fn evaluate_leaves_the_sample_file_untouched() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    save_cd4(&engine);
    run_validated(&engine, rule(RuleCommand::Publish { uid: "cd4".to_string() })).expect("publish");

    let sample = copy_sample(temp.path());
    let before = fs::read_to_string(&sample).expect("before");
    run_validated(&engine, Commands::Evaluate(SampleArgs { sample: sample.clone() }))
        .expect("evaluate");
    assert_eq!(fs::read_to_string(&sample).expect("after"), before);
}

#[test]
fn saved_rule_is_inactive_until_published() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    save_cd4(&engine);
    assert!(!engine.get_rule("cd4").expect("rule").is_active);

    let sample = copy_sample(temp.path());
    run_validated(&engine, Commands::Run(SampleArgs { sample: sample.clone() })).expect("run");
    assert_eq!(read_sample(&sample).analyses.len(), 1);
}

#[test]
fn import_saves_graph_files_and_reports_broken_ones() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    let graphs = temp.path().join("graphs");
    fs::create_dir_all(graphs.join("nested")).expect("graphs dir");
    fs::copy(fixture("cd4_graph.json"), graphs.join("cd4.json")).expect("copy json");
    fs::copy(fixture("hiv_confirm.yaml"), graphs.join("nested/hiv.yaml")).expect("copy yaml");
    fs::write(graphs.join("broken.json"), "{ not json").expect("write broken");
    fs::write(graphs.join("notes.txt"), "ignored").expect("write notes");

    let report = import_rules(&engine, &graphs, true).expect("import");
    let mut imported = report
        .imported
        .iter()
        .map(|rule| (rule.uid.as_str(), rule.is_active))
        .collect::<Vec<_>>();
    imported.sort_unstable();
    assert_eq!(imported, vec![("cd4", true), ("hiv", true)]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].path.ends_with("broken.json"));

    let uids = engine
        .list_rules()
        .expect("list")
        .into_iter()
        .map(|rule| rule.uid)
        .collect::<Vec<_>>();
    assert_eq!(uids, vec!["cd4".to_string(), "hiv".to_string()]);
}

#[test]
fn import_rejects_missing_directory() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    let err = import_rules(&engine, &temp.path().join("missing"), false).expect_err("missing");
    assert!(err.to_string().contains("import directory not found"));
}

#[test]
fn run_with_unreadable_sample_fails_with_path_context() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    let sample = temp.path().join("absent.json");
    let err = run_validated(&engine, Commands::Run(SampleArgs { sample })).expect_err("absent");
    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn deleting_unknown_rule_is_not_an_error() {
    let temp = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(temp.path().join("root")).expect("engine");
    run_validated(&engine, rule(RuleCommand::Delete { uid: "nope".to_string() })).expect("delete");
    run_validated(&engine, Commands::Logs(LogsArgs { limit: 5 })).expect("logs");
    let logs = engine.list_request_logs(5).expect("read logs");
    assert_eq!(logs[0].operation, "rule.delete");
}
