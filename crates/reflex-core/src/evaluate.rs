use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    FiredDecision, Operator, ReflexDecision, ReflexTrigger, ResultValue, Rule, RuleGroup,
    SampleResultView,
};

/// How much of a trigger's target analysis set must be present on a sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMatchPolicy {
    /// Every target analysis must be present.
    #[default]
    All,
    /// At least one target analysis must be present.
    Any,
}

impl FromStr for TriggerMatchPolicy {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(format!("unsupported trigger match policy '{other}' (expected: all|any)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationOptions {
    pub trigger_match: TriggerMatchPolicy,
}

/// Supplies fresh result snapshots between level passes.
pub trait SampleResultProvider {
    fn sample_view(&self, sample_uid: &str) -> Result<SampleResultView>;
}

/// Evaluates every level against one snapshot.
///
/// Output is ordered by trigger level, then trigger order, then decision
/// priority. Every matching decision fires.
#[must_use]
pub fn evaluate(triggers: &[ReflexTrigger], sample: &SampleResultView) -> Vec<FiredDecision> {
    evaluate_with(triggers, sample, EvaluationOptions::default())
}

#[must_use]
pub fn evaluate_with(
    triggers: &[ReflexTrigger],
    sample: &SampleResultView,
    options: EvaluationOptions,
) -> Vec<FiredDecision> {
    let mut ordered = triggers.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|trigger| trigger.level);
    ordered
        .into_iter()
        .flat_map(|trigger| fire_trigger(trigger, sample, options))
        .collect()
}

/// Evaluates only the triggers of one level.
#[must_use]
pub fn evaluate_level(
    triggers: &[ReflexTrigger],
    level: u32,
    sample: &SampleResultView,
    options: EvaluationOptions,
) -> Vec<FiredDecision> {
    triggers
        .iter()
        .filter(|trigger| trigger.level == level)
        .flat_map(|trigger| fire_trigger(trigger, sample, options))
        .collect()
}

/// Distinct trigger levels in ascending order.
#[must_use]
pub fn trigger_levels(triggers: &[ReflexTrigger]) -> Vec<u32> {
    let mut levels = triggers
        .iter()
        .map(|trigger| trigger.level)
        .collect::<Vec<_>>();
    levels.sort_unstable();
    levels.dedup();
    levels
}

fn fire_trigger(
    trigger: &ReflexTrigger,
    sample: &SampleResultView,
    options: EvaluationOptions,
) -> Vec<FiredDecision> {
    if !trigger_applies(trigger, sample, options.trigger_match) {
        return Vec::new();
    }
    let mut decisions = trigger.decisions.iter().collect::<Vec<_>>();
    decisions.sort_by_key(|decision| decision.priority);
    decisions
        .into_iter()
        .filter(|decision| decision_matches(decision, sample))
        .map(|decision| FiredDecision {
            rule_uid: trigger.rule_uid.clone(),
            trigger_uid: trigger.uid.clone(),
            level: trigger.level,
            decision_uid: decision.uid.clone(),
            add_actions: decision.add_actions.clone(),
            finalize_actions: decision.finalize_actions.clone(),
        })
        .collect()
}

#[must_use]
pub fn trigger_applies(
    trigger: &ReflexTrigger,
    sample: &SampleResultView,
    policy: TriggerMatchPolicy,
) -> bool {
    if trigger.sample_type_uid.trim() != sample.sample_type_uid.trim() {
        return false;
    }
    if trigger.analysis_uids.is_empty() {
        return true;
    }
    let mut present = trigger
        .analysis_uids
        .iter()
        .map(|analysis_uid| sample.has_analysis(analysis_uid.trim()));
    match policy {
        TriggerMatchPolicy::All => present.all(|found| found),
        TriggerMatchPolicy::Any => present.any(|found| found),
    }
}

/// OR across rule groups.
#[must_use]
pub fn decision_matches(decision: &ReflexDecision, sample: &SampleResultView) -> bool {
    decision
        .rule_groups
        .iter()
        .any(|group| group_matches(group, sample))
}

/// AND across the group's rules; an empty group never matches.
#[must_use]
pub fn group_matches(group: &RuleGroup, sample: &SampleResultView) -> bool {
    !group.rules.is_empty() && group.rules.iter().all(|rule| rule_matches(rule, sample))
}

/// A missing or pending result never satisfies a rule, whatever the operator.
#[must_use]
pub fn rule_matches(rule: &Rule, sample: &SampleResultView) -> bool {
    sample
        .result(rule.analysis_uid.trim())
        .is_some_and(|actual| rule.operator.holds(actual, &rule.value))
}

impl Operator {
    /// `gt`/`lt` need two finite numbers; `eq`/`neq` compare numerically when
    /// both sides are numbers and by exact text otherwise.
    #[must_use]
    pub fn holds(self, actual: &ResultValue, expected: &ResultValue) -> bool {
        let numbers = actual.as_number().zip(expected.as_number());
        match self {
            Self::Gt => numbers.is_some_and(|(left, right)| left > right),
            Self::Lt => numbers.is_some_and(|(left, right)| left < right),
            Self::Eq => values_equal(actual, expected, numbers),
            Self::Neq => !values_equal(actual, expected, numbers),
        }
    }
}

#[allow(clippy::float_cmp)]
fn values_equal(
    actual: &ResultValue,
    expected: &ResultValue,
    numbers: Option<(f64, f64)>,
) -> bool {
    match numbers {
        Some((left, right)) => left == right,
        None => actual.to_string() == expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddAnalysisAction, ReflexDecision, RuleGroup};

    fn rule(analysis_uid: &str, operator: Operator, value: impl Into<ResultValue>) -> Rule {
        Rule {
            uid: format!("{analysis_uid}-{operator}"),
            analysis_uid: analysis_uid.to_string(),
            operator,
            value: value.into(),
            priority: 0,
            node_id: None,
        }
    }

    fn group(uid: &str, rules: Vec<Rule>) -> RuleGroup {
        RuleGroup {
            uid: uid.to_string(),
            rules,
            ..RuleGroup::default()
        }
    }

    fn decision(uid: &str, priority: i64, groups: Vec<RuleGroup>) -> ReflexDecision {
        ReflexDecision {
            uid: uid.to_string(),
            priority,
            rule_groups: groups,
            ..ReflexDecision::default()
        }
    }

    fn trigger(
        uid: &str,
        level: u32,
        analyses: &[&str],
        decisions: Vec<ReflexDecision>,
    ) -> ReflexTrigger {
        ReflexTrigger {
            uid: uid.to_string(),
            rule_uid: String::new(),
            level,
            description: String::new(),
            sample_type_uid: "serum".to_string(),
            analysis_uids: analyses.iter().map(ToString::to_string).collect(),
            decisions,
        }
    }

    fn cd4_trigger() -> ReflexTrigger {
        let mut decision = decision(
            "d1",
            0,
            vec![group("g1", vec![rule("CD4", Operator::Lt, 200)])],
        );
        decision.add_actions.push(AddAnalysisAction {
            uid: "a1".to_string(),
            analysis_uid: "VL".to_string(),
            count: 1,
        });
        trigger("t1", 1, &["CD4"], vec![decision])
    }

    #[test]
    fn cd4_scenario_fires_below_threshold_only() {
        let triggers = [cd4_trigger()];

        let low = SampleResultView::new("S-1", "serum").with_result("CD4", 150);
        let fired = evaluate(&triggers, &low);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].trigger_uid, "t1");
        assert_eq!(fired[0].decision_uid, "d1");
        assert_eq!(fired[0].add_actions.len(), 1);
        assert_eq!(fired[0].add_actions[0].analysis_uid, "VL");

        let high = SampleResultView::new("S-1", "serum").with_result("CD4", 250);
        assert!(evaluate(&triggers, &high).is_empty());
    }

    #[test]
    fn groups_are_ored_and_rules_are_anded() {
        let triggers = [trigger(
            "t1",
            1,
            &[],
            vec![decision(
                "d1",
                0,
                vec![
                    group("g1", vec![rule("A", Operator::Eq, 1)]),
                    group(
                        "g2",
                        vec![rule("B", Operator::Eq, 2), rule("C", Operator::Eq, 3)],
                    ),
                ],
            )],
        )];

        let only_a = SampleResultView::new("S", "serum").with_result("A", 1);
        let b_and_c = SampleResultView::new("S", "serum")
            .with_result("B", 2)
            .with_result("C", "3");
        let only_b = SampleResultView::new("S", "serum")
            .with_result("B", 2)
            .with_result("C", 4);

        assert_eq!(evaluate(&triggers, &only_a).len(), 1);
        assert_eq!(evaluate(&triggers, &b_and_c).len(), 1);
        assert!(evaluate(&triggers, &only_b).is_empty());
    }

    #[test]
    fn missing_or_pending_results_never_satisfy_a_rule() {
        let sample = SampleResultView::new("S", "serum").with_pending("HB");
        for operator in [Operator::Eq, Operator::Neq, Operator::Gt, Operator::Lt] {
            assert!(!rule_matches(&rule("HB", operator, 10), &sample));
            assert!(!rule_matches(&rule("ALT", operator, 10), &sample));
        }
    }

    #[test]
    fn ordering_comparisons_need_two_finite_numbers() {
        let text = ResultValue::from("positive");
        assert!(!Operator::Gt.holds(&text, &ResultValue::from(1)));
        assert!(!Operator::Lt.holds(&ResultValue::from(1), &text));
        assert!(Operator::Gt.holds(&ResultValue::from("12.5"), &ResultValue::from(12)));
        assert!(Operator::Lt.holds(&ResultValue::from(-3), &ResultValue::from("0")));
        assert!(!Operator::Gt.holds(&ResultValue::from("inf"), &ResultValue::from(0)));
    }

    #[test]
    fn equality_is_numeric_when_possible_and_textual_otherwise() {
        assert!(Operator::Eq.holds(&ResultValue::from("200.0"), &ResultValue::from(200)));
        assert!(Operator::Eq.holds(&ResultValue::from("Reactive"), &ResultValue::from("Reactive")));
        assert!(!Operator::Eq.holds(&ResultValue::from("reactive"), &ResultValue::from("Reactive")));
        assert!(Operator::Neq.holds(&ResultValue::from("Reactive"), &ResultValue::from(1)));
        assert!(!Operator::Neq.holds(&ResultValue::from(" 7 "), &ResultValue::from(7)));
    }

    #[test]
    fn empty_group_fails_closed() {
        let sample = SampleResultView::new("S", "serum").with_result("A", 1);
        assert!(!group_matches(&group("g", Vec::new()), &sample));
    }

    #[test]
    fn trigger_gating_checks_sample_type_and_target_presence() {
        let trigger = trigger("t1", 1, &["CD4", "CD8"], Vec::new());
        let partial = SampleResultView::new("S", "serum").with_result("CD4", 100);
        let complete = partial.clone().with_pending("CD8");
        let other_type = SampleResultView::new("S", "plasma")
            .with_result("CD4", 100)
            .with_result("CD8", 100);

        assert!(!trigger_applies(&trigger, &partial, TriggerMatchPolicy::All));
        assert!(trigger_applies(&trigger, &partial, TriggerMatchPolicy::Any));
        assert!(trigger_applies(&trigger, &complete, TriggerMatchPolicy::All));
        assert!(!trigger_applies(&trigger, &other_type, TriggerMatchPolicy::Any));
    }

    #[test]
    fn output_follows_level_then_decision_priority_and_fires_all_matches() {
        let always = || vec![group("g", vec![rule("A", Operator::Eq, 1)])];
        let triggers = [
            trigger(
                "t2",
                2,
                &["A"],
                vec![decision("d2", 0, always())],
            ),
            trigger(
                "t1",
                1,
                &["A"],
                vec![decision("d1b", 3, always()), decision("d1a", 1, always())],
            ),
        ];
        let sample = SampleResultView::new("S", "serum").with_result("A", 1);

        let order = evaluate(&triggers, &sample)
            .into_iter()
            .map(|fired| fired.decision_uid)
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["d1a", "d1b", "d2"]);

        let level_two = evaluate_level(&triggers, 2, &sample, EvaluationOptions::default());
        assert_eq!(level_two.len(), 1);
        assert_eq!(trigger_levels(&triggers), vec![1, 2]);
    }
}
