use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::AnalysisCatalog;
use crate::compile::compile;
use crate::error::{ReflexError, Result};
use crate::graph::{ReflexGraph, export_graph};
use crate::models::{CompileOutput, ReflexRule, ReflexTrigger, ValidationReport};
use crate::validate::{lint_triggers, validate_with_catalog};

use super::ReflexEngine;

/// Editable rule header submitted together with a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDraft {
    /// Existing rule to replace; a fresh uid is minted when absent.
    #[serde(default)]
    pub uid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedRule {
    pub rule: ReflexRule,
    pub report: ValidationReport,
}

fn report_status(report: &ValidationReport) -> &'static str {
    if report.is_clean() { "ok" } else { "warning" }
}

fn issue_codes(report: &ValidationReport, strict: bool) -> String {
    let mut codes = report
        .errors
        .iter()
        .chain(report.warnings.iter().filter(|_| strict))
        .map(|issue| issue.code.as_str())
        .collect::<Vec<_>>();
    codes.sort_unstable();
    codes.dedup();
    codes.join(", ")
}

impl ReflexEngine {
    pub fn compile_graph(&self, graph: &ReflexGraph) -> Result<CompileOutput> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let output = compile(graph);
        self.log_outcome(request_id, "graph.compile", started, None, &output, |out| {
            let report = out.report();
            (
                report_status(&report),
                Some(json!({
                    "nodes": graph.nodes.len(),
                    "edges": graph.edges.len(),
                    "triggers": out.triggers.len(),
                    "errors": out.errors.len(),
                    "warnings": out.warnings.len(),
                })),
            )
        });
        output
    }

    /// Compiles `graph` and stores it as the rule described by `draft`.
    ///
    /// New rules start inactive. A replaced rule keeps its active flag only
    /// while the new tree is still publishable.
    pub fn save_rule(&self, draft: RuleDraft, graph: &ReflexGraph) -> Result<SavedRule> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let target_uid = draft.uid.clone();

        let output = (|| -> Result<SavedRule> {
            let name = draft.name.trim();
            if name.is_empty() {
                return Err(ReflexError::Validation(
                    "rule name must not be empty".to_string(),
                ));
            }
            let compiled = compile(graph)?;
            let report = compiled.report();

            let uid = draft
                .uid
                .as_deref()
                .map(str::trim)
                .filter(|uid| !uid.is_empty())
                .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);
            let was_active = self
                .rules
                .load(&uid)?
                .is_some_and(|existing| existing.is_active);

            let rule = ReflexRule {
                uid,
                name: name.to_string(),
                description: draft.description.trim().to_string(),
                is_active: was_active && report.is_publishable(self.config.strict_publish),
                priority: draft.priority,
                triggers: compiled.triggers,
                layout: graph
                    .nodes
                    .iter()
                    .map(|node| (node.id().to_string(), node.position()))
                    .collect(),
            };
            self.rules.save(&rule)?;
            Ok(SavedRule { rule, report })
        })();

        let logged_uid = output
            .as_ref()
            .map(|saved| saved.rule.uid.clone())
            .ok()
            .or(target_uid);
        self.log_outcome(request_id, "rule.save", started, logged_uid, &output, |saved| {
            (
                report_status(&saved.report),
                Some(json!({
                    "is_active": saved.rule.is_active,
                    "triggers": saved.rule.triggers.len(),
                    "errors": saved.report.errors.len(),
                    "warnings": saved.report.warnings.len(),
                })),
            )
        });
        output
    }

    /// Re-validates the stored tree and activates the rule when nothing
    /// blocks it.
    pub fn publish_rule(&self, uid: &str) -> Result<SavedRule> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = (|| -> Result<SavedRule> {
            let mut rule = self.get_rule(uid)?;
            let report = lint_triggers(&rule.triggers);
            if !report.is_publishable(self.config.strict_publish) {
                return Err(ReflexError::PublishBlocked(format!(
                    "rule {uid}: {}",
                    issue_codes(&report, self.config.strict_publish)
                )));
            }
            rule.is_active = true;
            self.rules.save(&rule)?;
            Ok(SavedRule { rule, report })
        })();

        self.log_outcome(
            request_id,
            "rule.publish",
            started,
            Some(uid.to_string()),
            &output,
            |saved| {
                (
                    report_status(&saved.report),
                    Some(json!({ "warnings": saved.report.warnings.len() })),
                )
            },
        );
        output
    }

    pub fn deactivate_rule(&self, uid: &str) -> Result<ReflexRule> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let output = self.get_rule(uid).and_then(|mut rule| {
            rule.is_active = false;
            self.rules.save(&rule)?;
            Ok(rule)
        });
        self.log_outcome(
            request_id,
            "rule.deactivate",
            started,
            Some(uid.to_string()),
            &output,
            |_| ("ok", None),
        );
        output
    }

    /// Removes the rule with its whole subtree. `false` when nothing was
    /// stored under `uid`.
    pub fn delete_rule(&self, uid: &str) -> Result<bool> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let output = self.rules.delete(uid);
        self.log_outcome(
            request_id,
            "rule.delete",
            started,
            Some(uid.to_string()),
            &output,
            |deleted| ("ok", Some(json!({ "deleted": deleted }))),
        );
        output
    }

    pub fn get_rule(&self, uid: &str) -> Result<ReflexRule> {
        self.rules
            .load(uid)?
            .ok_or_else(|| ReflexError::NotFound(format!("reflex rule {uid}")))
    }

    pub fn list_rules(&self) -> Result<Vec<ReflexRule>> {
        let mut rules = self.rules.list()?;
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.uid.cmp(&b.uid)));
        Ok(rules)
    }

    pub fn export_rule_graph(&self, uid: &str) -> Result<ReflexGraph> {
        Ok(export_graph(&self.get_rule(uid)?))
    }

    /// Lint report for a stored rule, plus the catalog pass when a catalog
    /// is supplied.
    pub fn validate_rule(
        &self,
        uid: &str,
        catalog: Option<&dyn AnalysisCatalog>,
    ) -> Result<ValidationReport> {
        let rule = self.get_rule(uid)?;
        let mut report = lint_triggers(&rule.triggers);
        if let Some(catalog) = catalog {
            report.extend(validate_with_catalog(&rule.triggers, catalog));
        }
        Ok(report)
    }

    /// Triggers of every active rule, rules ordered by priority then uid.
    /// Each trigger carries its rule uid.
    pub fn active_triggers(&self) -> Result<Vec<ReflexTrigger>> {
        Ok(self
            .list_rules()?
            .iter()
            .flat_map(|rule| {
                rule.active_triggers().iter().map(|trigger| ReflexTrigger {
                    rule_uid: rule.uid.clone(),
                    ..trigger.clone()
                })
            })
            .collect())
    }
}
