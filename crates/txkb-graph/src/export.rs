//! Node/link graph export
//!
//! The JSON layout (`{"nodes": [...], "links": [...]}`) is what force-directed
//! graph viewers load directly.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use txkb_core::Result;

use crate::KnowledgeBase;

/// One entity node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub url: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_date: Option<String>,
}

/// One relation edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub label: String,
    /// Source ids the relation was seen in
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl GraphExport {
    pub fn from_kb(kb: &KnowledgeBase) -> Self {
        let nodes = kb
            .entities()
            .map(|(title, record)| GraphNode {
                id: title.to_string(),
                label: title.to_string(),
                url: record.url.clone(),
                summary: record.summary.clone(),
                first_seen_source_id: record.first_seen_source_id.clone(),
                first_seen_date: record.first_seen_date.clone(),
            })
            .collect();

        let mut links = Vec::with_capacity(kb.relation_count());
        for relation in kb.relations() {
            if kb.entity(&relation.head).is_none() || kb.entity(&relation.tail).is_none() {
                warn!(
                    head = %relation.head,
                    tail = %relation.tail,
                    "Skipping link with dangling endpoint"
                );
                continue;
            }
            links.push(GraphLink {
                source: relation.head.clone(),
                target: relation.tail.clone(),
                label: relation.relation_type.clone(),
                sources: relation.provenance.keys().cloned().collect(),
            });
        }

        Self { nodes, links }
    }

    /// Build a petgraph graph with entity titles as node weights and
    /// relation types as edge weights
    pub fn to_petgraph(&self) -> DiGraph<String, String> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.links.len());
        let mut indices: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let index = graph.add_node(node.id.clone());
            indices.insert(node.id.as_str(), index);
        }
        for link in &self.links {
            if let (Some(&from), Some(&to)) = (
                indices.get(link.source.as_str()),
                indices.get(link.target.as_str()),
            ) {
                graph.add_edge(from, to, link.label.clone());
            }
        }

        graph
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing graph export {}", path.display()))?;
        Ok(())
    }
}
