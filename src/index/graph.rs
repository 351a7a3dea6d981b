//! Semantic document graph - each document linked to its nearest neighbours
//!
//! A document is represented by the mean of its passage vectors (its
//! centroid). When a document is stored it is linked to the most similar
//! other documents. Edges are undirected, stored once per pair, and weighted
//! by cosine similarity clamped to [0, 1].
//!
//! ```json
//! { "nodes": { "a.txt": { "id": "a.txt", "type": "document", "title": "a", "language": "eng" } },
//!   "edges": [ { "source": "a.txt", "target": "b.txt", "weight": 0.42 } ] }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Neighbours linked to a newly stored document
pub const GRAPH_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: f32,
}

impl GraphEdge {
    fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    /// Unordered pair key
    fn key(&self) -> (&str, &str) {
        pair(&self.source, &self.target)
    }
}

fn pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticGraph {
    #[serde(default)]
    nodes: BTreeMap<String, GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

impl SemanticGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the node for a document
    pub fn upsert_document(&mut self, id: &str, title: &str, language: Option<&str>) {
        self.nodes.insert(
            id.to_string(),
            GraphNode {
                id: id.to_string(),
                kind: "document".to_string(),
                title: title.to_string(),
                language: language.map(str::to_string),
            },
        );
    }

    /// Link `id` to each `(other, similarity)`, skipping self-links and
    /// pairs that already have an edge. Returns the number of edges added.
    pub fn add_edges(&mut self, id: &str, similar: &[(String, f32)]) -> usize {
        let mut existing: BTreeSet<(String, String)> = self
            .edges
            .iter()
            .map(|e| {
                let (a, b) = e.key();
                (a.to_string(), b.to_string())
            })
            .collect();

        let mut added = 0;
        for (other, similarity) in similar {
            if other == id {
                continue;
            }
            let (a, b) = pair(id, other);
            if !existing.insert((a.to_string(), b.to_string())) {
                continue;
            }
            self.edges.push(GraphEdge {
                source: id.to_string(),
                target: other.clone(),
                weight: similarity.clamp(0.0, 1.0),
            });
            added += 1;
        }

        debug!("Linked {} to {} documents", id, added);
        added
    }

    /// Drop every edge touching `id`, keeping its node
    pub fn unlink(&mut self, id: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        before - self.edges.len()
    }

    /// Drop a document's node and its edges; returns whether a node existed
    pub fn remove_document(&mut self, id: &str) -> bool {
        self.unlink(id);
        self.nodes.remove(id).is_some()
    }

    /// Documents linked to `id`, strongest first, ties by ascending id
    pub fn neighbors(&self, id: &str) -> Vec<(&str, f32)> {
        let mut out: Vec<(&str, f32)> = self
            .edges
            .iter()
            .filter_map(|e| {
                if e.source == id {
                    Some((e.target.as_str(), e.weight))
                } else if e.target == id {
                    Some((e.source.as_str(), e.weight))
                } else {
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        out
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let graph: Self = serde_json::from_str(&content)
            .map_err(|e| Error::CorruptIndex(format!("graph: {}", e)))?;

        if let Some(edge) = graph.edges.iter().find(|e| !(0.0..=1.0).contains(&e.weight)) {
            return Err(Error::CorruptIndex(format!(
                "graph edge {} - {} has weight {}",
                edge.source, edge.target, edge.weight
            )));
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SemanticGraph {
        let mut graph = SemanticGraph::new();
        for id in ["a", "b", "c"] {
            graph.upsert_document(id, id, Some("eng"));
        }
        graph.add_edges("a", &[("b".to_string(), 0.8), ("c".to_string(), 0.3)]);
        graph
    }

    #[test]
    fn test_edges_are_undirected_and_unique() {
        let mut graph = sample();
        let added = graph.add_edges("b", &[("a".to_string(), 0.9), ("b".to_string(), 1.0), ("c".to_string(), 0.5)]);

        assert_eq!(added, 1);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.neighbors("b"), vec![("a", 0.8), ("c", 0.5)]);
    }

    #[test]
    fn test_weights_are_clamped() {
        let mut graph = SemanticGraph::new();
        graph.add_edges("x", &[("y".to_string(), -0.4), ("z".to_string(), 1.5)]);
        assert_eq!(graph.neighbors("x"), vec![("z", 1.0), ("y", 0.0)]);
    }

    #[test]
    fn test_remove_document_drops_incident_edges() {
        let mut graph = sample();
        assert!(graph.remove_document("a"));
        assert!(!graph.remove_document("a"));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.neighbors("b").is_empty());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let graph = sample();
        graph.save(&path).unwrap();

        let loaded = SemanticGraph::load(&path).unwrap();
        assert_eq!(loaded, graph);
        assert_eq!(loaded.node("a").unwrap().kind, "document");

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["nodes"]["a"]["type"], "document");
        assert_eq!(raw["edges"][0]["source"], "a");
    }

    #[test]
    fn test_load_rejects_bad_weight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, r#"{"nodes": {}, "edges": [{"source": "a", "target": "b", "weight": 3.0}]}"#).unwrap();
        assert!(matches!(SemanticGraph::load(&path), Err(Error::CorruptIndex(_))));
    }
}
