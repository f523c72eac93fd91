use std::path::Path;
use std::str::FromStr;

use crate::error::{ReflexError, Result};

use super::model::ReflexGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Json,
    Yaml,
}

impl GraphFormat {
    /// Picks the format from a file extension; unknown extensions read as JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    #[must_use]
    pub fn is_graph_file(path: &Path) -> bool {
        matches!(
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
                .as_deref(),
            Some("json" | "yaml" | "yml")
        )
    }
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unsupported graph format '{other}' (expected: json|yaml)")),
        }
    }
}

pub fn parse_graph(raw: &str, format: GraphFormat) -> Result<ReflexGraph> {
    match format {
        GraphFormat::Json => serde_json::from_str::<ReflexGraph>(raw)
            .map_err(|err| ReflexError::GraphParse(format!("json: {err}"))),
        GraphFormat::Yaml => serde_norway::from_str::<ReflexGraph>(raw)
            .map_err(|err| ReflexError::GraphParse(format!("yaml: {err}"))),
    }
}

pub fn read_graph_file(path: &Path) -> Result<ReflexGraph> {
    let raw = std::fs::read_to_string(path)?;
    parse_graph(&raw, GraphFormat::from_path(path)).map_err(|err| match err {
        ReflexError::GraphParse(detail) => {
            ReflexError::GraphParse(format!("{}: {detail}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{GraphNode, NodeKind};

    #[test]
    fn parses_json_and_yaml_into_the_same_graph() {
        let json = r#"{
            "nodes": [
                {"id": "t1", "type": "trigger", "data": {"level": 1, "sample_type_uid": "serum", "analysis_uids": ["CD4"]}, "position": {"x": 10, "y": 20}},
                {"id": "r1", "type": "rule", "data": {"analysis_uid": "CD4", "operator": "lt", "value": 200}}
            ],
            "edges": [{"source": "t1", "target": "r1"}]
        }"#;
        let yaml = r"
nodes:
  - id: t1
    type: trigger
    data:
      level: 1
      sample_type_uid: serum
      analysis_uids: [CD4]
    position: {x: 10, y: 20}
  - id: r1
    type: rule
    data:
      analysis_uid: CD4
      operator: lt
      value: 200
edges:
  - source: t1
    target: r1
";
        let from_json = parse_graph(json, GraphFormat::Json).expect("json");
        let from_yaml = parse_graph(yaml, GraphFormat::Yaml).expect("yaml");
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.nodes[0].kind(), NodeKind::Trigger);
        assert!(matches!(&from_json.nodes[1], GraphNode::Rule { data, .. } if data.analysis_uid == "CD4"));
    }

    #[test]
    fn unknown_node_type_is_a_parse_error() {
        let raw = r#"{"nodes": [{"id": "x", "type": "gateway", "data": {}}], "edges": []}"#;
        let err = parse_graph(raw, GraphFormat::Json).expect_err("unknown type must fail");
        assert!(matches!(err, ReflexError::GraphParse(_)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(GraphFormat::from_path(Path::new("a/b.YML")), GraphFormat::Yaml);
        assert_eq!(GraphFormat::from_path(Path::new("a/b.json")), GraphFormat::Json);
        assert!(!GraphFormat::is_graph_file(Path::new("notes.md")));
    }
}
