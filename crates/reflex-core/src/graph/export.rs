use std::collections::HashSet;

use crate::models::{CanvasPosition, ReflexRule};

use super::model::{
    ActionNodeData, ActionType, DecisionNodeData, GraphEdge, GraphNode, ReflexGraph,
    RuleNodeData, TriggerNodeData,
};

/// Rebuilds the editor graph for a stored rule, re-attaching canvas positions.
///
/// Rules compiled from one shared node (a branch prefix) are emitted once, so
/// compiling the exported graph yields the same groups again.
#[must_use]
pub fn export_graph(rule: &ReflexRule) -> ReflexGraph {
    let mut builder = GraphBuilder {
        rule,
        graph: ReflexGraph::default(),
        seen_nodes: HashSet::new(),
        seen_edges: HashSet::new(),
    };

    for trigger in &rule.triggers {
        builder.node(GraphNode::Trigger {
            id: trigger.uid.clone(),
            data: TriggerNodeData {
                level: trigger.level,
                description: trigger.description.clone(),
                sample_type_uid: trigger.sample_type_uid.clone(),
                analysis_uids: trigger.analysis_uids.clone(),
            },
            position: builder.position(&trigger.uid),
        });

        for decision in &trigger.decisions {
            builder.node(GraphNode::Decision {
                id: decision.uid.clone(),
                data: DecisionNodeData {
                    description: decision.description.clone(),
                    priority: decision.priority,
                },
                position: builder.position(&decision.uid),
            });
            builder.edge(&trigger.uid, &decision.uid);

            for group in &decision.rule_groups {
                let mut previous = decision.uid.as_str();
                for rule_entry in &group.rules {
                    let node_id = rule_entry.node_id.as_deref().unwrap_or(&rule_entry.uid);
                    builder.node(GraphNode::Rule {
                        id: node_id.to_string(),
                        data: RuleNodeData {
                            analysis_uid: rule_entry.analysis_uid.clone(),
                            operator: rule_entry.operator,
                            value: rule_entry.value.clone(),
                            priority: rule_entry.priority,
                        },
                        position: builder.position(node_id),
                    });
                    builder.edge(previous, node_id);
                    previous = node_id;
                }
            }

            for action in &decision.add_actions {
                builder.node(GraphNode::Action {
                    id: action.uid.clone(),
                    data: ActionNodeData {
                        action_type: ActionType::Add,
                        analysis_uid: action.analysis_uid.clone(),
                        count: action.count,
                        value: None,
                    },
                    position: builder.position(&action.uid),
                });
                builder.edge(&decision.uid, &action.uid);
            }
            for action in &decision.finalize_actions {
                builder.node(GraphNode::Action {
                    id: action.uid.clone(),
                    data: ActionNodeData {
                        action_type: ActionType::Finalize,
                        analysis_uid: action.analysis_uid.clone(),
                        count: 1,
                        value: Some(action.value.clone()),
                    },
                    position: builder.position(&action.uid),
                });
                builder.edge(&decision.uid, &action.uid);
            }
        }
    }

    builder.graph
}

struct GraphBuilder<'a> {
    rule: &'a ReflexRule,
    graph: ReflexGraph,
    seen_nodes: HashSet<String>,
    seen_edges: HashSet<(String, String)>,
}

impl GraphBuilder<'_> {
    fn position(&self, node_id: &str) -> CanvasPosition {
        self.rule.layout.get(node_id).copied().unwrap_or_default()
    }

    fn node(&mut self, node: GraphNode) {
        if self.seen_nodes.insert(node.id().to_string()) {
            self.graph.nodes.push(node);
        }
    }

    fn edge(&mut self, source: &str, target: &str) {
        if self
            .seen_edges
            .insert((source.to_string(), target.to_string()))
        {
            let mut edge = GraphEdge::new(source, target);
            edge.id = Some(format!("e-{source}-{target}"));
            self.graph.edges.push(edge);
        }
    }
}
