//! Co-authorship graph built from catalog authorship records.
//!
//! Two kinds of edges are recorded: `Author` edges from an author to each
//! text they wrote, and `Coauthor` edges between every pair of authors that
//! share a text. Each co-author pair is recorded once, the first time it is
//! seen, with author IDs in sorted order.
//!
//! Views are either the whole graph or a breadth-first neighbourhood of a
//! start vertex, and can be rendered to JSON or to a standalone HTML page.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::Authorship;

/// Default breadth-first depth bound.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Errors that can occur while building graph views.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The start vertex is not part of the graph
    #[error("Unknown vertex: {0}")]
    UnknownVertex(Uuid),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Edge kinds in the co-authorship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeKind {
    /// Author to text
    #[serde(alias = "author")]
    Author,

    /// Author to author
    #[default]
    #[serde(alias = "coauthor")]
    Coauthor,
}

/// A directed edge as recorded from the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: Uuid,
    pub kind: EdgeKind,
    pub to: Uuid,
    pub year: Option<i32>,
}

/// A vertex in a rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewNode {
    pub id: Uuid,

    /// Author weight, present only when weights were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<usize>,
}

/// A directed edge in a rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewEdge {
    pub from: Uuid,
    pub to: Uuid,
}

/// The result of [`CoauthorGraph::view`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

/// Graph over authors and texts.
#[derive(Debug, Clone, Default)]
pub struct CoauthorGraph {
    edges: Vec<GraphEdge>,

    /// Number of texts per author, in first-seen order
    author_weights: IndexMap<Uuid, usize>,

    texts: IndexSet<Uuid>,

    /// Undirected adjacency per edge kind
    adjacency: HashMap<EdgeKind, HashMap<Uuid, Vec<Uuid>>>,
}

impl CoauthorGraph {
    /// Build the graph from authorship records.
    pub fn from_authorship(records: &[Authorship]) -> Self {
        let mut graph = Self::default();
        let mut seen_pairs: HashSet<(Uuid, Uuid)> = HashSet::new();

        for record in records {
            let authors: Vec<Uuid> = record
                .author_ids
                .iter()
                .copied()
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();

            graph.texts.insert(record.text_id);

            for &author in &authors {
                *graph.author_weights.entry(author).or_insert(0) += 1;
                graph.push_edge(GraphEdge {
                    from: author,
                    kind: EdgeKind::Author,
                    to: record.text_id,
                    year: record.year,
                });
            }

            for (i, &first) in authors.iter().enumerate() {
                for &second in &authors[i + 1..] {
                    if seen_pairs.insert((first, second)) {
                        graph.push_edge(GraphEdge {
                            from: first,
                            kind: EdgeKind::Coauthor,
                            to: second,
                            year: record.year,
                        });
                    }
                }
            }
        }

        info!(
            "Built graph with {} authors, {} texts and {} edges",
            graph.author_weights.len(),
            graph.texts.len(),
            graph.edges.len()
        );
        graph
    }

    fn push_edge(&mut self, edge: GraphEdge) {
        let adjacency = self.adjacency.entry(edge.kind).or_default();
        adjacency.entry(edge.from).or_default().push(edge.to);
        adjacency.entry(edge.to).or_default().push(edge.from);
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Number of texts an author appears on.
    pub fn author_weight(&self, author: &Uuid) -> Option<usize> {
        self.author_weights.get(author).copied()
    }

    pub fn author_count(&self) -> usize {
        self.author_weights.len()
    }

    /// Whether `id` may appear in a view over `kind` edges.
    fn is_vertex(&self, kind: EdgeKind, id: &Uuid) -> bool {
        self.author_weights.contains_key(id)
            || (kind == EdgeKind::Author && self.texts.contains(id))
    }

    /// Build a view of the graph.
    ///
    /// # Arguments
    /// * `start` - Start vertex; `None` selects the whole graph
    /// * `kind` - Edge kind to traverse and draw
    /// * `max_depth` - A vertex at depth `d + 1` is admitted only while `d + 1 < max_depth`
    /// * `use_weights` - Attach author weights as node values
    ///
    /// # Errors
    /// Returns `GraphError::UnknownVertex` if `start` is not in the graph
    pub fn view(
        &self,
        start: Option<Uuid>,
        kind: EdgeKind,
        max_depth: usize,
        use_weights: bool,
    ) -> GraphResult<GraphView> {
        let vertices: IndexSet<Uuid> = match start {
            None => {
                let mut all: IndexSet<Uuid> = self.author_weights.keys().copied().collect();
                if kind == EdgeKind::Author {
                    all.extend(self.texts.iter().copied());
                }
                all
            }
            Some(start) => {
                if !self.is_vertex(kind, &start) {
                    return Err(GraphError::UnknownVertex(start));
                }
                self.breadth_first(start, kind, max_depth)
            }
        };

        let nodes = vertices
            .iter()
            .map(|id| ViewNode {
                id: *id,
                value: if use_weights {
                    self.author_weight(id)
                } else {
                    None
                },
            })
            .collect();

        let mut edges = Vec::new();
        for edge in self.edges.iter().filter(|e| e.kind == kind) {
            if vertices.contains(&edge.from) && vertices.contains(&edge.to) {
                edges.push(ViewEdge {
                    from: edge.from,
                    to: edge.to,
                });
                edges.push(ViewEdge {
                    from: edge.to,
                    to: edge.from,
                });
            }
        }

        debug!(
            "Graph view: {} nodes, {} edges",
            vertices.len(),
            edges.len()
        );
        Ok(GraphView { nodes, edges })
    }

    fn breadth_first(&self, start: Uuid, kind: EdgeKind, max_depth: usize) -> IndexSet<Uuid> {
        let mut used = IndexSet::new();
        used.insert(start);

        let Some(adjacency) = self.adjacency.get(&kind) else {
            return used;
        };

        let mut queue = VecDeque::from([(0usize, start)]);
        while let Some((depth, vertex)) = queue.pop_front() {
            let Some(neighbours) = adjacency.get(&vertex) else {
                continue;
            };
            for &next in neighbours {
                if depth + 1 < max_depth && !used.contains(&next) && self.is_vertex(kind, &next) {
                    used.insert(next);
                    queue.push_back((depth + 1, next));
                }
            }
        }
        used
    }
}

impl GraphView {
    /// Render the view as a standalone vis-network HTML page.
    pub fn to_html(&self) -> String {
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|node| {
                let mut value = serde_json::json!({
                    "id": node.id,
                    "label": node.id,
                });
                if let Some(weight) = node.value {
                    value["value"] = serde_json::json!(weight);
                }
                value
            })
            .collect();

        let nodes_json = script_safe(&serde_json::Value::Array(nodes).to_string());
        let edges_json = script_safe(&serde_json::json!(self.edges).to_string());

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Co-authorship graph</title>
<script src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
<style>#graph {{ width: 100%; height: 750px; border: 1px solid lightgray; }}</style>
</head>
<body>
<div id="graph"></div>
<script>
const nodes = new vis.DataSet({nodes});
const edges = new vis.DataSet({edges});
new vis.Network(document.getElementById("graph"), {{ nodes, edges }}, {{ physics: {{ enabled: true }} }});
</script>
</body>
</html>
"#,
            nodes = nodes_json,
            edges = edges_json,
        )
    }
}

/// Keep embedded JSON from closing the surrounding script element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}
