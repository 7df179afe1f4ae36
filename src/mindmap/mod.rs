//! 思维导图模块：把模型返回的 JSON 解析为层级树并展平成图。
//!
//! # Mind Map Module
//!
//! The model is asked for a JSON tree (`central_topic`, `theme`, `metadata`,
//! nested `children` with `importance`). [`MindMap::parse`] tolerates fences
//! and commentary around the JSON; [`MindMap::to_graph`] flattens the tree
//! into nodes and edges for whatever renders it. Layout is not done here.

use crate::pipeline::{PipelineOrchestrator, PipelineRequest};
use crate::structured::extract_json;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Characters of source content sent to the model.
const MAX_SOURCE_CHARS: usize = 25_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    /// Unknown strings map to `Medium`.
    fn lenient<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("high") => Self::High,
            Some("low") => Self::Low,
            _ => Self::Medium,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub name: String,
    #[serde(default, deserialize_with = "Importance::lenient")]
    pub importance: Importance,
    #[serde(default)]
    pub children: Vec<MindMapNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMap {
    pub central_topic: String,
    #[serde(default)]
    pub theme: Option<String>,
    /// Free-form: `source_type`, `estimated_reading_time`, `key_takeaway`.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<MindMapNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    pub depth: usize,
    pub importance: Importance,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MindMapGraph {
    pub nodes: Vec<GraphNode>,
    /// `(parent id, child id)`.
    pub edges: Vec<(usize, usize)>,
}

impl MindMap {
    /// Parse a model reply. Fails when no JSON object with a non-empty
    /// `central_topic` can be found.
    pub fn parse(text: &str) -> Result<Self> {
        let value = extract_json(text).ok_or_else(|| {
            Error::validation_with_context(
                "no JSON found in mind map reply",
                ErrorContext::new().with_source("mind_map"),
            )
        })?;
        let map: MindMap = serde_json::from_value(value).map_err(|e| {
            Error::validation_with_context(
                format!("mind map JSON has the wrong shape: {}", e),
                ErrorContext::new().with_source("mind_map"),
            )
        })?;
        if map.central_topic.trim().is_empty() {
            return Err(Error::validation_with_context(
                "mind map has no central topic",
                ErrorContext::new()
                    .with_field_path("central_topic")
                    .with_source("mind_map"),
            ));
        }
        Ok(map)
    }

    /// Flatten depth-first, pre-order. The central topic is node 0 at depth 0;
    /// nodes deeper than `max_depth` are dropped with their subtrees.
    pub fn to_graph(&self, max_depth: usize) -> MindMapGraph {
        let mut graph = MindMapGraph::default();
        graph.nodes.push(GraphNode {
            id: 0,
            label: self.central_topic.clone(),
            depth: 0,
            importance: Importance::High,
            parent: None,
        });
        for child in &self.children {
            add_node(&mut graph, child, 0, 1, max_depth);
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        fn count(nodes: &[MindMapNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        1 + count(&self.children)
    }
}

fn add_node(graph: &mut MindMapGraph, node: &MindMapNode, parent: usize, depth: usize, max_depth: usize) {
    if depth > max_depth {
        return;
    }
    let id = graph.nodes.len();
    graph.nodes.push(GraphNode {
        id,
        label: node.name.clone(),
        depth,
        importance: node.importance,
        parent: Some(parent),
    });
    graph.edges.push((parent, id));
    for child in &node.children {
        add_node(graph, child, id, depth + 1, max_depth);
    }
}

/// How detailed a generated map should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Standard,
    Detailed,
}

impl Complexity {
    /// `(max levels, max subtopics, max details per subtopic)`.
    pub fn limits(&self) -> (usize, usize, usize) {
        match self {
            Self::Simple => (3, 5, 3),
            Self::Standard => (4, 7, 5),
            Self::Detailed => (5, 8, 6),
        }
    }
}

pub fn mind_map_prompt(content: &str, theme: &str, complexity: Complexity) -> String {
    let (levels, subtopics, details) = complexity.limits();
    let content: String = content.chars().take(MAX_SOURCE_CHARS).collect();
    format!(
        r#"Analyze the following content and create a hierarchical mind map structure in JSON format.

The JSON should have the following structure:
{{
  "central_topic": "Main Topic",
  "theme": "{theme}",
  "metadata": {{"source_type": "article/video/pdf/webpage", "key_takeaway": "Brief summary"}},
  "children": [
    {{"name": "Subtopic", "importance": "high/medium/low", "children": [{{"name": "Detail", "importance": "high/medium/low"}}]}}
  ]
}}

Guidelines:
1. Use up to {levels} levels of hierarchy.
2. Keep node names concise (max 50 characters).
3. Include {subtopics} main subtopics and up to {details} details for each.
4. Mark importance "high" for critical concepts, "medium" for supporting concepts, "low" for minor details.

Content for analysis:
{content}

Output only valid JSON, no explanation or other text."#
    )
}

/// Generates mind maps through the pipeline.
pub struct MindMapper {
    pipeline: PipelineOrchestrator,
    model_id: String,
    max_attempts: u32,
    use_cache: bool,
}

impl MindMapper {
    pub fn new(pipeline: PipelineOrchestrator, model_id: impl Into<String>) -> Self {
        Self {
            pipeline,
            model_id: model_id.into(),
            max_attempts: 3,
            use_cache: true,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub async fn generate(&self, content: &str, theme: &str, complexity: Complexity) -> Result<MindMap> {
        if content.trim().is_empty() {
            return Err(Error::validation_with_context(
                "no content to map",
                ErrorContext::new().with_source("mind_map"),
            ));
        }
        let request = PipelineRequest::new(mind_map_prompt(content, theme, complexity), self.model_id.as_str())
            .with_max_attempts(self.max_attempts)
            .with_max_tokens(4000)
            .with_cache(self.use_cache);
        let outcome = self.pipeline.run_text_request(&request).await;
        if let Some(error) = outcome.error {
            return Err(error.into());
        }
        let mut map = match MindMap::parse(outcome.text.as_deref().unwrap_or_default()) {
            Ok(map) => map,
            Err(e) => {
                // An unusable reply must not be served again from the cache.
                if self.use_cache {
                    self.pipeline.forget(&request).await;
                }
                warn!(from_cache = outcome.from_cache, error = %e, "mind map reply rejected");
                return Err(e);
            }
        };
        if map.theme.is_none() {
            map.theme = Some(theme.to_string());
        }
        Ok(map)
    }
}
