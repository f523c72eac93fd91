use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A result value as entered on an analysis or written in a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    /// Numeric reading of the value; only finite numbers qualify.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value).filter(|value| value.is_finite()),
            Self::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(raw) => raw.trim().is_empty(),
        }
    }

    /// Key used to compare values for redundancy checks: numbers compare by
    /// magnitude, text compares trimmed.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self.as_number() {
            Some(number) => format!("n:{number}"),
            None => format!("s:{}", self.to_string().trim()),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(raw) => f.write_str(raw),
        }
    }
}

impl From<f64> for ResultValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ResultValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Default for ResultValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Eq,
    Neq,
    Gt,
    Lt,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            other => Err(format!("unsupported operator '{other}' (expected: eq|neq|gt|lt)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CanvasPosition {
    pub x: f64,
    pub y: f64,
}

impl Default for CanvasPosition {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub uid: String,
    pub analysis_uid: String,
    pub operator: Operator,
    pub value: ResultValue,
    #[serde(default)]
    pub priority: i64,
    /// Editor node this rule was compiled from. Several groups may share one
    /// node when a rule chain branches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RuleGroup {
    pub uid: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddAnalysisAction {
    pub uid: String,
    pub analysis_uid: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalizeAnalysisAction {
    pub uid: String,
    pub analysis_uid: String,
    pub value: ResultValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReflexDecision {
    pub uid: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
    #[serde(default)]
    pub add_actions: Vec<AddAnalysisAction>,
    #[serde(default)]
    pub finalize_actions: Vec<FinalizeAnalysisAction>,
}

impl ReflexDecision {
    #[must_use]
    pub fn has_actions(&self) -> bool {
        !self.add_actions.is_empty() || !self.finalize_actions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReflexTrigger {
    pub uid: String,
    /// Rule the trigger belongs to. Editor node ids are only unique within
    /// one graph, so decision identity is scoped by this uid. Set when an
    /// engine collects active triggers; empty on a freshly compiled tree.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_uid: String,
    pub level: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sample_type_uid: String,
    #[serde(default)]
    pub analysis_uids: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<ReflexDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReflexRule {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub triggers: Vec<ReflexTrigger>,
    /// Editor canvas positions by node id; never read during evaluation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layout: BTreeMap<String, CanvasPosition>,
}

impl ReflexRule {
    /// Triggers that take part in evaluation. An inactive rule contributes
    /// nothing.
    #[must_use]
    pub fn active_triggers(&self) -> &[ReflexTrigger] {
        if self.is_active { &self.triggers } else { &[] }
    }

    #[must_use]
    pub fn decision(&self, decision_uid: &str) -> Option<&ReflexDecision> {
        self.triggers
            .iter()
            .flat_map(|trigger| trigger.decisions.iter())
            .find(|decision| decision.uid == decision_uid)
    }

    /// Drops a decision together with its groups, rules and actions.
    pub fn remove_decision(&mut self, decision_uid: &str) -> bool {
        for trigger in &mut self.triggers {
            let before = trigger.decisions.len();
            trigger.decisions.retain(|decision| decision.uid != decision_uid);
            if trigger.decisions.len() != before {
                return true;
            }
        }
        false
    }

    /// Drops a rule group together with its rules.
    pub fn remove_rule_group(&mut self, group_uid: &str) -> bool {
        for decision in self
            .triggers
            .iter_mut()
            .flat_map(|trigger| trigger.decisions.iter_mut())
        {
            let before = decision.rule_groups.len();
            decision.rule_groups.retain(|group| group.uid != group_uid);
            if decision.rule_groups.len() != before {
                return true;
            }
        }
        false
    }
}
