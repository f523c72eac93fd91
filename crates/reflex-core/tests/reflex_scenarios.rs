use std::path::PathBuf;

use reflex_core::models::{Analysis, ResultValue, SampleResultView};
use reflex_core::{
    AnalysisStore, InMemorySampleStore, ReflexEngine, Result, RuleDraft, compile, evaluate,
    read_graph_file,
};
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn serum(sample_uid: &str) -> SampleResultView {
    SampleResultView::new(sample_uid, "serum")
}

fn fired_decisions(graph: &str, view: &SampleResultView) -> Vec<String> {
    let graph = read_graph_file(&fixture(graph)).expect("read graph");
    let compiled = compile(&graph).expect("compile");
    evaluate(&compiled.triggers, view)
        .into_iter()
        .map(|fired| fired.decision_uid)
        .collect()
}

/// Results every newly ordered HIV analysis as reactive, standing in for an
/// instrument that reports between reflex levels.
struct ReactiveHivLab<'a> {
    samples: &'a InMemorySampleStore,
}

impl AnalysisStore for ReactiveHivLab<'_> {
    fn create_analyses(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        count: u32,
    ) -> Result<Vec<Analysis>> {
        let created = self
            .samples
            .create_analyses(sample_uid, analysis_uid, count)?;
        if analysis_uid == "HIV" {
            self.samples
                .record_result(sample_uid, analysis_uid, ResultValue::from("reactive"))?;
        }
        Ok(created)
    }

    fn finalize_analysis(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        value: &ResultValue,
    ) -> Result<Analysis> {
        self.samples
            .finalize_analysis(sample_uid, analysis_uid, value)
    }
}

fn publish(engine: &ReflexEngine, uid: &str, graph: &str) {
    let graph = read_graph_file(&fixture(graph)).expect("read graph");
    engine
        .save_rule(
            RuleDraft {
                uid: Some(uid.to_string()),
                name: uid.to_string(),
                ..RuleDraft::default()
            },
            &graph,
        )
        .expect("save");
    engine.publish_rule(uid).expect("publish");
}

fn count_of(samples: &InMemorySampleStore, sample_uid: &str, analysis_uid: &str) -> usize {
    samples
        .analyses(sample_uid)
        .expect("analyses")
        .iter()
        .filter(|analysis| analysis.analysis_uid == analysis_uid)
        .count()
}

#[test]
fn cd4_below_threshold_orders_one_viral_load() {
    let graph = read_graph_file(&fixture("cd4_viral_load.json")).expect("read graph");
    let compiled = compile(&graph).expect("compile");
    assert!(compiled.errors.is_empty(), "errors: {:?}", compiled.errors);

    let fired = evaluate(&compiled.triggers, &serum("S-1").with_result("CD4", 150));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].add_actions.len(), 1);
    assert_eq!(fired[0].add_actions[0].analysis_uid, "VL");
    assert_eq!(fired[0].add_actions[0].count, 1);

    assert!(evaluate(&compiled.triggers, &serum("S-1").with_result("CD4", 250)).is_empty());
}

#[test]
fn decision_fires_when_any_group_holds_all_its_rules() {
    let graph = "either_group.yaml";
    assert_eq!(fired_decisions(graph, &serum("S-1").with_result("A", 1)), vec!["d-any"]);
    assert_eq!(
        fired_decisions(graph, &serum("S-1").with_result("B", 2).with_result("C", 3)),
        vec!["d-any"]
    );
    assert!(fired_decisions(graph, &serum("S-1").with_result("B", 2)).is_empty());
    assert!(fired_decisions(graph, &serum("S-1").with_result("C", 3)).is_empty());
}

#[test]
fn missing_or_pending_results_never_satisfy_a_rule() {
    let graph = "cd4_viral_load.json";
    assert!(fired_decisions(graph, &serum("S-1")).is_empty());
    assert!(fired_decisions(graph, &serum("S-1").with_pending("CD4")).is_empty());
    assert!(fired_decisions(graph, &serum("S-1").with_result("CD4", "low")).is_empty());
    assert!(
        fired_decisions(
            graph,
            &SampleResultView::new("S-1", "plasma").with_result("CD4", 150)
        )
        .is_empty()
    );
}

#[test]
fn level_two_reads_results_produced_after_level_one_applied() {
    let root = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(root.path()).expect("engine");
    publish(&engine, "hiv-cascade", "hiv_cascade.json");

    let samples = InMemorySampleStore::new();
    samples.insert_sample("S-7", "serum");
    samples
        .record_result("S-7", "CD4", ResultValue::from(150))
        .expect("cd4 result");

    let preview = engine.evaluate_sample("S-7", &samples).expect("preview");
    assert_eq!(
        preview
            .iter()
            .map(|fired| fired.decision_uid.as_str())
            .collect::<Vec<_>>(),
        vec!["d-low"],
        "one snapshot cannot see what level one will order"
    );

    let lab = ReactiveHivLab { samples: &samples };
    let report = engine.run_sample("S-7", &samples, &lab).expect("run");
    assert_eq!(
        report.levels.iter().map(|level| level.level).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(report.applied_count(), 2);
    assert!(report.failed().is_empty());
    assert!(!report.truncated);
    assert_eq!(count_of(&samples, "S-7", "HIV"), 1);
    assert_eq!(count_of(&samples, "S-7", "WB"), 1);
}

#[test]
fn applied_decisions_survive_reopening_the_root() {
    let root = tempdir().expect("tempdir");
    let samples = InMemorySampleStore::new();
    samples.insert_sample("S-8", "serum");
    samples
        .record_result("S-8", "CD4", ResultValue::from(120))
        .expect("cd4 result");

    {
        let engine = ReflexEngine::open(root.path()).expect("engine");
        publish(&engine, "cd4", "cd4_viral_load.json");
        let report = engine.run_sample("S-8", &samples, &samples).expect("run");
        assert_eq!(report.applied_count(), 1);
    }

    let reopened = ReflexEngine::open(root.path()).expect("reopen");
    assert!(reopened.get_rule("cd4").expect("rule").is_active);
    let report = reopened.run_sample("S-8", &samples, &samples).expect("rerun");
    assert_eq!(report.applied_count(), 0);
    assert_eq!(count_of(&samples, "S-8", "VL"), 1);
}

#[test]
fn exported_graph_recompiles_to_the_same_tree() {
    let root = tempdir().expect("tempdir");
    let engine = ReflexEngine::open(root.path()).expect("engine");
    publish(&engine, "panel", "either_group.yaml");

    let stored = engine.get_rule("panel").expect("rule");
    let exported = engine.export_rule_graph("panel").expect("export");
    let recompiled = compile(&exported).expect("recompile");
    assert_eq!(recompiled.triggers, stored.triggers);
}
