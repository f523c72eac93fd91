use std::collections::HashSet;

use crate::catalog::AnalysisCatalog;
use crate::models::{ReflexTrigger, ValidationIssue, ValidationReport};

pub mod issue_codes {
    pub const TRIGGER_MISSING_SAMPLE_TYPE: &str = "trigger_missing_sample_type";
    pub const TRIGGER_INVALID_LEVEL: &str = "trigger_invalid_level";
    pub const RULE_MISSING_ANALYSIS: &str = "rule_missing_analysis";
    pub const ACTION_MISSING_ANALYSIS: &str = "action_missing_analysis";
    pub const ADD_ACTION_ZERO_COUNT: &str = "add_action_zero_count";
    pub const FINALIZE_MISSING_VALUE: &str = "finalize_missing_value";

    pub const TRIGGER_WITHOUT_DECISIONS: &str = "trigger_without_decisions";
    pub const DECISION_WITHOUT_RULE_GROUPS: &str = "decision_without_rule_groups";
    pub const DECISION_WITHOUT_ACTIONS: &str = "decision_without_actions";
    pub const EMPTY_RULE_GROUP: &str = "empty_rule_group";
    pub const RULE_ANALYSIS_NOT_TARGETED: &str = "rule_analysis_not_targeted";
    pub const DUPLICATE_RULE_IN_GROUP: &str = "duplicate_rule_in_group";

    pub const RULE_CHAIN_CYCLE: &str = "rule_chain_cycle";
    pub const ORPHAN_DECISION: &str = "orphan_decision";
    pub const ORPHAN_RULE: &str = "orphan_rule";
    pub const ORPHAN_ACTION: &str = "orphan_action";

    pub const UNKNOWN_ANALYSIS: &str = "unknown_analysis";
    pub const FINALIZE_VALUE_NOT_AN_OPTION: &str = "finalize_value_not_an_option";
}

/// Lints a compiled trigger tree. The result is advisory: it gates publishing
/// a rule, never compilation or storage.
#[must_use]
pub fn lint_triggers(triggers: &[ReflexTrigger]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for trigger in triggers {
        lint_trigger(trigger, &mut report);
    }
    report
}

fn lint_trigger(trigger: &ReflexTrigger, report: &mut ValidationReport) {
    if trigger.sample_type_uid.trim().is_empty() {
        report.push(ValidationIssue::error(
            issue_codes::TRIGGER_MISSING_SAMPLE_TYPE,
            &trigger.uid,
            "trigger does not reference a sample type",
        ));
    }
    if trigger.level < 1 {
        report.push(ValidationIssue::error(
            issue_codes::TRIGGER_INVALID_LEVEL,
            &trigger.uid,
            format!("trigger level must be >= 1, got {}", trigger.level),
        ));
    }
    if trigger.decisions.is_empty() {
        report.push(ValidationIssue::warning(
            issue_codes::TRIGGER_WITHOUT_DECISIONS,
            &trigger.uid,
            "trigger has no decisions and is inert",
        ));
    }

    let targeted = trigger
        .analysis_uids
        .iter()
        .map(|uid| uid.trim())
        .collect::<HashSet<_>>();

    for decision in &trigger.decisions {
        if decision.rule_groups.is_empty() {
            report.push(ValidationIssue::warning(
                issue_codes::DECISION_WITHOUT_RULE_GROUPS,
                &decision.uid,
                "decision has no rule groups and can never fire",
            ));
        }
        if !decision.has_actions() {
            report.push(ValidationIssue::warning(
                issue_codes::DECISION_WITHOUT_ACTIONS,
                &decision.uid,
                "decision fires without any action",
            ));
        }

        for group in &decision.rule_groups {
            if group.rules.is_empty() {
                report.push(ValidationIssue::warning(
                    issue_codes::EMPTY_RULE_GROUP,
                    &group.uid,
                    "rule group has no rules and never matches",
                ));
            }
            let mut seen = HashSet::<(String, &'static str, String)>::new();
            for rule in &group.rules {
                let analysis_uid = rule.analysis_uid.trim();
                if analysis_uid.is_empty() {
                    report.push(ValidationIssue::error(
                        issue_codes::RULE_MISSING_ANALYSIS,
                        &rule.uid,
                        "rule does not reference an analysis",
                    ));
                } else if !targeted.contains(analysis_uid) {
                    report.push(ValidationIssue::warning(
                        issue_codes::RULE_ANALYSIS_NOT_TARGETED,
                        &rule.uid,
                        format!(
                            "rule reads analysis '{analysis_uid}' which is not among trigger '{}' target analyses",
                            trigger.uid
                        ),
                    ));
                }
                let key = (
                    analysis_uid.to_string(),
                    rule.operator.as_str(),
                    rule.value.canonical_key(),
                );
                if !seen.insert(key) {
                    report.push(ValidationIssue::warning(
                        issue_codes::DUPLICATE_RULE_IN_GROUP,
                        &rule.uid,
                        format!(
                            "rule '{analysis_uid} {} {}' repeats within group '{}'",
                            rule.operator, rule.value, group.uid
                        ),
                    ));
                }
            }
        }

        for action in &decision.add_actions {
            if action.analysis_uid.trim().is_empty() {
                report.push(ValidationIssue::error(
                    issue_codes::ACTION_MISSING_ANALYSIS,
                    &action.uid,
                    "add action does not reference an analysis",
                ));
            }
            if action.count == 0 {
                report.push(ValidationIssue::error(
                    issue_codes::ADD_ACTION_ZERO_COUNT,
                    &action.uid,
                    "add action must request at least one analysis",
                ));
            }
        }
        for action in &decision.finalize_actions {
            if action.analysis_uid.trim().is_empty() {
                report.push(ValidationIssue::error(
                    issue_codes::ACTION_MISSING_ANALYSIS,
                    &action.uid,
                    "finalize action does not reference an analysis",
                ));
            }
            if action.value.is_blank() {
                report.push(ValidationIssue::error(
                    issue_codes::FINALIZE_MISSING_VALUE,
                    &action.uid,
                    "finalize action has an empty value",
                ));
            }
        }
    }
}

/// Catalog-aware pass: flags analyses the catalog does not know and finalize
/// values outside an analysis' declared result options.
#[must_use]
pub fn validate_with_catalog(
    triggers: &[ReflexTrigger],
    catalog: &dyn AnalysisCatalog,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut flagged = HashSet::<String>::new();
    let mut check_known = |analysis_uid: &str, subject_uid: &str, report: &mut ValidationReport| {
        let analysis_uid = analysis_uid.trim();
        if analysis_uid.is_empty() || catalog.resolve(analysis_uid).is_some() {
            return;
        }
        if flagged.insert(format!("{subject_uid}\u{1f}{analysis_uid}")) {
            report.push(ValidationIssue::warning(
                issue_codes::UNKNOWN_ANALYSIS,
                subject_uid,
                format!("analysis '{analysis_uid}' is not in the analysis catalog"),
            ));
        }
    };

    for trigger in triggers {
        for analysis_uid in &trigger.analysis_uids {
            check_known(analysis_uid, &trigger.uid, &mut report);
        }
        for decision in &trigger.decisions {
            for rule in decision.rule_groups.iter().flat_map(|group| group.rules.iter()) {
                check_known(&rule.analysis_uid, &rule.uid, &mut report);
            }
            for action in &decision.add_actions {
                check_known(&action.analysis_uid, &action.uid, &mut report);
            }
            for action in &decision.finalize_actions {
                check_known(&action.analysis_uid, &action.uid, &mut report);
                let Some(info) = catalog.resolve(action.analysis_uid.trim()) else {
                    continue;
                };
                let value = action.value.to_string();
                if !info.result_options.is_empty()
                    && !info
                        .result_options
                        .iter()
                        .any(|option| option.trim() == value.trim())
                {
                    report.push(ValidationIssue::warning(
                        issue_codes::FINALIZE_VALUE_NOT_AN_OPTION,
                        &action.uid,
                        format!(
                            "finalize value '{value}' is not a result option of '{}'",
                            info.name
                        ),
                    ));
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AnalysisInfo, StaticAnalysisCatalog};
    use crate::models::{
        AddAnalysisAction, FinalizeAnalysisAction, Operator, ReflexDecision, ResultValue, Rule,
        RuleGroup,
    };

    fn rule(uid: &str, analysis_uid: &str, operator: Operator, value: ResultValue) -> Rule {
        Rule {
            uid: uid.to_string(),
            analysis_uid: analysis_uid.to_string(),
            operator,
            value,
            priority: 0,
            node_id: None,
        }
    }

    fn trigger(decisions: Vec<ReflexDecision>) -> ReflexTrigger {
        ReflexTrigger {
            uid: "t1".to_string(),
            rule_uid: String::new(),
            level: 1,
            description: String::new(),
            sample_type_uid: "serum".to_string(),
            analysis_uids: vec!["CD4".to_string()],
            decisions,
        }
    }

    fn decision(groups: Vec<RuleGroup>) -> ReflexDecision {
        ReflexDecision {
            uid: "d1".to_string(),
            rule_groups: groups,
            add_actions: vec![AddAnalysisAction {
                uid: "a1".to_string(),
                analysis_uid: "VL".to_string(),
                count: 1,
            }],
            ..ReflexDecision::default()
        }
    }

    fn group(rules: Vec<Rule>) -> RuleGroup {
        RuleGroup {
            uid: "g1".to_string(),
            rules,
            ..RuleGroup::default()
        }
    }

    #[test]
    fn well_formed_trigger_is_clean() {
        let report = lint_triggers(&[trigger(vec![decision(vec![group(vec![rule(
            "r1",
            "CD4",
            Operator::Lt,
            ResultValue::from(200),
        )])])])]);
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn missing_references_are_errors() {
        let mut broken = trigger(vec![ReflexDecision {
            finalize_actions: vec![FinalizeAnalysisAction {
                uid: "f1".to_string(),
                analysis_uid: String::new(),
                value: ResultValue::from("  "),
            }],
            ..decision(vec![group(vec![rule("r1", "", Operator::Eq, ResultValue::from(1))])])
        }]);
        broken.sample_type_uid = " ".to_string();
        broken.level = 0;

        let report = lint_triggers(&[broken]);
        let codes = report
            .errors
            .iter()
            .map(|issue| issue.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec![
                issue_codes::TRIGGER_MISSING_SAMPLE_TYPE,
                issue_codes::TRIGGER_INVALID_LEVEL,
                issue_codes::RULE_MISSING_ANALYSIS,
                issue_codes::ACTION_MISSING_ANALYSIS,
                issue_codes::FINALIZE_MISSING_VALUE,
            ]
        );
        assert!(!report.is_publishable(false));
    }

    #[test]
    fn advisory_findings_are_warnings_only() {
        let report = lint_triggers(&[trigger(vec![
            decision(vec![group(vec![
                rule("r1", "HB", Operator::Gt, ResultValue::from("10")),
                rule("r2", "HB", Operator::Gt, ResultValue::from(10)),
            ])]),
            ReflexDecision {
                uid: "d2".to_string(),
                ..ReflexDecision::default()
            },
        ])]);

        assert!(report.errors.is_empty());
        assert!(report.has_code(issue_codes::RULE_ANALYSIS_NOT_TARGETED));
        assert!(report.has_code(issue_codes::DUPLICATE_RULE_IN_GROUP));
        assert!(report.has_code(issue_codes::DECISION_WITHOUT_RULE_GROUPS));
        assert!(report.has_code(issue_codes::DECISION_WITHOUT_ACTIONS));
        assert!(report.is_publishable(false));
        assert!(!report.is_publishable(true));
    }

    #[test]
    fn catalog_pass_flags_unknown_analyses_and_foreign_finalize_values() {
        let mut catalog = StaticAnalysisCatalog::default();
        catalog.insert("CD4", AnalysisInfo::new("CD4 count"));
        catalog.insert(
            "HIV",
            AnalysisInfo::new("HIV screen").with_options(&["Reactive", "Non-reactive"]),
        );

        let mut target = trigger(vec![ReflexDecision {
            finalize_actions: vec![FinalizeAnalysisAction {
                uid: "f1".to_string(),
                analysis_uid: "HIV".to_string(),
                value: ResultValue::from("Indeterminate"),
            }],
            ..decision(vec![group(vec![rule(
                "r1",
                "CD4",
                Operator::Lt,
                ResultValue::from(200),
            )])])
        }]);
        target.analysis_uids.push("HIV".to_string());

        let report = validate_with_catalog(&[target], &catalog);
        assert_eq!(report.warnings.len(), 2, "{report:?}");
        assert_eq!(report.warnings[0].code, issue_codes::UNKNOWN_ANALYSIS);
        assert_eq!(report.warnings[0].subject_uid, "a1");
        assert_eq!(
            report.warnings[1].code,
            issue_codes::FINALIZE_VALUE_NOT_AN_OPTION
        );
    }
}
