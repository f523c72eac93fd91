use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{CanvasPosition, Operator, ResultValue};

/// Flat node/edge document produced by the decision-graph editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ReflexGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphNode {
    Trigger {
        id: String,
        data: TriggerNodeData,
        #[serde(default)]
        position: CanvasPosition,
    },
    Decision {
        id: String,
        #[serde(default)]
        data: DecisionNodeData,
        #[serde(default)]
        position: CanvasPosition,
    },
    Rule {
        id: String,
        data: RuleNodeData,
        #[serde(default)]
        position: CanvasPosition,
    },
    Action {
        id: String,
        data: ActionNodeData,
        #[serde(default)]
        position: CanvasPosition,
    },
}

impl GraphNode {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Trigger { id, .. }
            | Self::Decision { id, .. }
            | Self::Rule { id, .. }
            | Self::Action { id, .. } => id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger { .. } => NodeKind::Trigger,
            Self::Decision { .. } => NodeKind::Decision,
            Self::Rule { .. } => NodeKind::Rule,
            Self::Action { .. } => NodeKind::Action,
        }
    }

    #[must_use]
    pub const fn position(&self) -> CanvasPosition {
        match self {
            Self::Trigger { position, .. }
            | Self::Decision { position, .. }
            | Self::Rule { position, .. }
            | Self::Action { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Trigger,
    Decision,
    Rule,
    Action,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Decision => "decision",
            Self::Rule => "rule",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored edge. The direction a consumer should read is decided by the kinds
/// of its endpoints, except between two rule nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

impl GraphEdge {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{id} ({} -> {})", self.source, self.target),
            None => format!("{} -> {}", self.source, self.target),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TriggerNodeData {
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sample_type_uid: String,
    #[serde(default)]
    pub analysis_uids: Vec<String>,
}

impl Default for TriggerNodeData {
    fn default() -> Self {
        Self {
            level: default_level(),
            description: String::new(),
            sample_type_uid: String::new(),
            analysis_uids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct DecisionNodeData {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuleNodeData {
    #[serde(default)]
    pub analysis_uid: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: ResultValue,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Add,
    Finalize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActionNodeData {
    pub action_type: ActionType,
    #[serde(default)]
    pub analysis_uid: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ResultValue>,
}

const fn default_level() -> u32 {
    1
}

const fn default_count() -> u32 {
    1
}
