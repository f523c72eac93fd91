//! Translation from the editor's flat node/edge graph into the nested
//! `Trigger -> Decision -> RuleGroup -> Rule` tree used for evaluation.

use std::collections::{HashMap, HashSet};

use crate::error::{ReflexError, Result};
use crate::graph::{ActionType, GraphNode, NodeKind, ReflexGraph};
use crate::models::{
    AddAnalysisAction, CompileOutput, FinalizeAnalysisAction, ReflexDecision, ReflexTrigger, Rule,
    RuleGroup, ValidationIssue, ValidationReport,
};
use crate::validate::{issue_codes, lint_triggers};

mod paths;


use self::paths::{cyclic_edges, enumerate_paths};

/// Compiles the graph into a fresh trigger tree plus advisory issues.
///
/// Malformed graphs (duplicate node ids, dangling edges, edges between
/// unsupported node kinds, nodes with several parents) abort with an error
/// and no tree. The input is never modified.
pub fn compile(graph: &ReflexGraph) -> Result<CompileOutput> {
    let index = GraphIndex::build(graph)?;
    let mut report = index.graph_warnings();

    let triggers = graph
        .nodes
        .iter()
        .filter_map(|node| match node {
            GraphNode::Trigger { id, data, .. } => Some((id.as_str(), data)),
            _ => None,
        })
        .map(|(id, data)| ReflexTrigger {
            uid: id.to_string(),
            rule_uid: String::new(),
            level: data.level,
            description: data.description.clone(),
            sample_type_uid: data.sample_type_uid.trim().to_string(),
            analysis_uids: data.analysis_uids.clone(),
            decisions: index.compile_decisions(id),
        })
        .collect::<Vec<_>>();

    report.extend(lint_triggers(&triggers));
    Ok(CompileOutput {
        triggers,
        errors: report.errors,
        warnings: report.warnings,
    })
}

struct GraphIndex<'a> {
    nodes: HashMap<&'a str, &'a GraphNode>,
    order: Vec<&'a str>,
    trigger_decisions: HashMap<&'a str, Vec<&'a str>>,
    decision_rules: HashMap<&'a str, Vec<&'a str>>,
    decision_actions: HashMap<&'a str, Vec<&'a str>>,
    rule_successors: HashMap<&'a str, Vec<&'a str>>,
    parents: HashMap<&'a str, Vec<&'a str>>,
    cyclic: HashSet<(&'a str, &'a str)>,
}

impl<'a> GraphIndex<'a> {
    fn build(graph: &'a ReflexGraph) -> Result<Self> {
        let mut nodes = HashMap::<&str, &GraphNode>::with_capacity(graph.nodes.len());
        let mut order = Vec::<&str>::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let id = node.id();
            if nodes.insert(id, node).is_some() {
                return Err(ReflexError::DuplicateNode(id.to_string()));
            }
            order.push(id);
        }

        let mut index = Self {
            nodes,
            order,
            trigger_decisions: HashMap::new(),
            decision_rules: HashMap::new(),
            decision_actions: HashMap::new(),
            rule_successors: HashMap::new(),
            parents: HashMap::new(),
            cyclic: HashSet::new(),
        };

        let mut seen = HashSet::<(&str, &str)>::new();
        let mut oriented = Vec::<(&str, &str)>::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            let source = index
                .nodes
                .get_key_value(edge.source.as_str())
                .ok_or_else(|| ReflexError::DanglingEdge(edge.label()))?;
            let target = index
                .nodes
                .get_key_value(edge.target.as_str())
                .ok_or_else(|| ReflexError::DanglingEdge(edge.label()))?;
            let (from, to) = orient(
                (*source.0, source.1.kind()),
                (*target.0, target.1.kind()),
            )
            .ok_or_else(|| {
                ReflexError::InvalidEdge(format!(
                    "{}: {} -> {}",
                    edge.label(),
                    source.1.kind(),
                    target.1.kind()
                ))
            })?;
            if seen.insert((from, to)) {
                oriented.push((from, to));
            }
        }

        for &(from, to) in &oriented {
            let bucket = match (index.kind_of(from), index.kind_of(to)) {
                (NodeKind::Trigger, _) => &mut index.trigger_decisions,
                (NodeKind::Decision, NodeKind::Rule) => &mut index.decision_rules,
                (NodeKind::Decision, _) => &mut index.decision_actions,
                _ => &mut index.rule_successors,
            };
            bucket.entry(from).or_default().push(to);
        }

        index.cyclic = cyclic_edges(&index.rule_successors);
        for &(from, to) in &oriented {
            if !index.cyclic.contains(&(from, to)) {
                index.parents.entry(to).or_default().push(from);
            }
        }
        for id in &index.order {
            if let Some(parents) = index.parents.get(id)
                && parents.len() > 1
            {
                return Err(ReflexError::MultiParent(format!(
                    "{id} (parents: {})",
                    parents.join(", ")
                )));
            }
        }

        Ok(index)
    }

    fn kind_of(&self, id: &str) -> NodeKind {
        self.nodes
            .get(id)
            .map_or(NodeKind::Rule, |node| node.kind())
    }

    fn graph_warnings(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut cyclic = self.cyclic.iter().copied().collect::<Vec<_>>();
        cyclic.sort_unstable();
        for (from, to) in cyclic {
            report.push(ValidationIssue::warning(
                issue_codes::RULE_CHAIN_CYCLE,
                from,
                format!("rule chain edge {from} -> {to} closes a cycle; the path is truncated"),
            ));
        }

        let reachable_rules = self.rules_reachable_from_decisions();
        for &id in &self.order {
            let has_parent = self.parents.contains_key(id);
            match self.kind_of(id) {
                NodeKind::Decision if !has_parent => report.push(ValidationIssue::warning(
                    issue_codes::ORPHAN_DECISION,
                    id,
                    "decision is not connected to any trigger and never fires",
                )),
                NodeKind::Rule if !reachable_rules.contains(id) => {
                    report.push(ValidationIssue::warning(
                        issue_codes::ORPHAN_RULE,
                        id,
                        "rule is not reachable from any decision",
                    ));
                }
                NodeKind::Action if !has_parent => report.push(ValidationIssue::warning(
                    issue_codes::ORPHAN_ACTION,
                    id,
                    "action is not connected to any decision",
                )),
                _ => {}
            }
        }

        report
    }

    fn rules_reachable_from_decisions(&self) -> HashSet<&'a str> {
        let mut reachable = HashSet::<&str>::new();
        let mut pending = self
            .decision_rules
            .values()
            .flatten()
            .copied()
            .collect::<Vec<_>>();
        while let Some(id) = pending.pop() {
            if reachable.insert(id)
                && let Some(next) = self.rule_successors.get(id)
            {
                pending.extend(next.iter().copied());
            }
        }
        reachable
    }

    fn compile_decisions(&self, trigger_id: &str) -> Vec<ReflexDecision> {
        let mut decisions = self
            .trigger_decisions
            .get(trigger_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| match self.nodes.get(id) {
                Some(GraphNode::Decision { id, data, .. }) => Some(ReflexDecision {
                    uid: id.clone(),
                    description: data.description.clone(),
                    priority: data.priority,
                    rule_groups: self.compile_rule_groups(id),
                    add_actions: Vec::new(),
                    finalize_actions: Vec::new(),
                }),
                _ => None,
            })
            .collect::<Vec<_>>();

        for decision in &mut decisions {
            self.attach_actions(decision);
        }
        decisions.sort_by_key(|decision| decision.priority);
        decisions
    }

    fn compile_rule_groups(&self, decision_id: &str) -> Vec<RuleGroup> {
        let entries = self
            .decision_rules
            .get(decision_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        enumerate_paths(entries, &self.rule_successors)
            .into_iter()
            .enumerate()
            .map(|(position, path)| {
                let group_uid = derive_uid("grp", decision_id, &path);
                let rules = path
                    .iter()
                    .filter_map(|node_id| match self.nodes.get(node_id) {
                        Some(GraphNode::Rule { id, data, .. }) => Some(Rule {
                            uid: derive_uid("rul", &group_uid, &[id.as_str()]),
                            analysis_uid: data.analysis_uid.trim().to_string(),
                            operator: data.operator,
                            value: data.value.clone(),
                            priority: data.priority,
                            node_id: Some(id.clone()),
                        }),
                        _ => None,
                    })
                    .collect();
                RuleGroup {
                    uid: group_uid,
                    description: String::new(),
                    priority: i64::try_from(position).unwrap_or(i64::MAX),
                    rules,
                }
            })
            .collect()
    }

    fn attach_actions(&self, decision: &mut ReflexDecision) {
        let Some(action_ids) = self.decision_actions.get(decision.uid.as_str()) else {
            return;
        };
        for action_id in action_ids {
            let Some(GraphNode::Action { id, data, .. }) = self.nodes.get(action_id) else {
                continue;
            };
            match data.action_type {
                ActionType::Add => decision.add_actions.push(AddAnalysisAction {
                    uid: id.clone(),
                    analysis_uid: data.analysis_uid.trim().to_string(),
                    count: data.count,
                }),
                ActionType::Finalize => decision.finalize_actions.push(FinalizeAnalysisAction {
                    uid: id.clone(),
                    analysis_uid: data.analysis_uid.trim().to_string(),
                    value: data.value.clone().unwrap_or_default(),
                }),
            }
        }
    }
}

/// Reads a stored edge in its semantic direction, or `None` when the pair of
/// node kinds cannot be connected.
fn orient<'a>(a: (&'a str, NodeKind), b: (&'a str, NodeKind)) -> Option<(&'a str, &'a str)> {
    use NodeKind::{Action, Decision, Rule, Trigger};
    match (a.1, b.1) {
        (Rule, Rule) => Some((a.0, b.0)),
        _ if a.0 == b.0 => None,
        (Trigger, Decision) | (Decision, Rule) | (Decision, Action) => Some((a.0, b.0)),
        (Decision, Trigger) | (Rule, Decision) | (Action, Decision) => Some((b.0, a.0)),
        _ => None,
    }
}

fn derive_uid(prefix: &str, scope: &str, parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(scope.as_bytes());
    for part in parts {
        hasher.update(&[0x1f]);
        hasher.update(part.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("{prefix}-{}", &hex.as_str()[..16])
}
