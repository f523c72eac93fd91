mod export;
mod model;
mod parse;

pub use export::export_graph;
pub use model::{
    ActionNodeData, ActionType, DecisionNodeData, GraphEdge, GraphNode, NodeKind, ReflexGraph,
    RuleNodeData, TriggerNodeData,
};
pub use parse::{GraphFormat, parse_graph, read_graph_file};
