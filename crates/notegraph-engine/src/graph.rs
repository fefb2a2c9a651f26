//! Similarity graph over pages, built from pairwise chunk similarities.
//!
//! Every pair of chunks from different pages in a workspace contributes
//! its cosine similarity to the edge between their pages when it clears
//! the threshold; edge scores are the mean of their contributions.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::info;

use notegraph_core::vector::cosine_similarity;
use notegraph_core::{EngineConfig, Error, Result};
use notegraph_provider::PageProvider;
use notegraph_store::ChunkStore;

/// A page node in the similarity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: i64,
    pub label: String,
}

/// An undirected weighted edge between two pages, with `from < to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: i64,
    pub to: i64,
    pub score: f64,
}

/// The assembled node/edge graph for a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Accumulated pairwise scores for one page pair.
#[derive(Debug, Default)]
struct EdgeScores {
    total: f64,
    count: usize,
}

/// Builds the page similarity graph for a workspace.
pub struct GraphBuilder {
    store: Arc<ChunkStore>,
    pages: Arc<dyn PageProvider>,
    config: EngineConfig,
}

impl GraphBuilder {
    pub fn new(store: Arc<ChunkStore>, pages: Arc<dyn PageProvider>, config: EngineConfig) -> Self {
        Self {
            store,
            pages,
            config,
        }
    }

    /// Build the graph for `workspace_id`, keeping chunk pairs whose
    /// cosine similarity is at least the threshold (and strictly
    /// positive). `None` uses the configured default.
    pub async fn build(
        &self,
        workspace_id: i64,
        threshold: Option<f64>,
    ) -> Result<KnowledgeGraph> {
        let threshold = threshold.unwrap_or(self.config.graph_threshold);
        if !threshold.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "threshold must be finite, got {}",
                threshold
            )));
        }

        let chunks = self.store.find_all_by_workspace(workspace_id)?;
        if chunks.is_empty() {
            return Ok(KnowledgeGraph {
                nodes: Vec::new(),
                edges: Vec::new(),
            });
        }

        let mut graph: UnGraph<i64, EdgeScores> = UnGraph::new_undirected();
        let mut node_index: HashMap<i64, NodeIndex> = HashMap::new();
        for chunk in &chunks {
            node_index
                .entry(chunk.page_id)
                .or_insert_with(|| graph.add_node(chunk.page_id));
        }

        // O(n^2) scan over the workspace's chunks; pairs within the same
        // page are skipped, so the graph has no self-loops.
        for i in 0..chunks.len() {
            for j in (i + 1)..chunks.len() {
                let (a, b) = (&chunks[i], &chunks[j]);
                if a.page_id == b.page_id {
                    continue;
                }
                if a.vector.len() != b.vector.len() {
                    return Err(Error::DimensionMismatch {
                        expected: a.vector.len(),
                        actual: b.vector.len(),
                    });
                }

                let score = cosine_similarity(&a.vector, &b.vector);
                if score >= threshold && score > 0.0 {
                    let (na, nb) = (node_index[&a.page_id], node_index[&b.page_id]);
                    let edge = graph
                        .find_edge(na, nb)
                        .unwrap_or_else(|| graph.add_edge(na, nb, EdgeScores::default()));
                    let scores = &mut graph[edge];
                    scores.total += score;
                    scores.count += 1;
                }
            }
        }

        // Deterministic output: nodes by page id, edges by (from, to).
        let mut page_ids: Vec<i64> = node_index.keys().copied().collect();
        page_ids.sort_unstable();

        let mut nodes = Vec::with_capacity(page_ids.len());
        for page_id in page_ids {
            let label = match self.pages.page_by_id(page_id).await {
                Ok(page) => page.title,
                Err(_) => format!("Page {}", page_id),
            };
            nodes.push(GraphNode { id: page_id, label });
        }

        let mut edges: Vec<GraphEdge> = graph
            .edge_references()
            .map(|edge| {
                let a = graph[edge.source()];
                let b = graph[edge.target()];
                let scores = edge.weight();
                GraphEdge {
                    from: a.min(b),
                    to: a.max(b),
                    score: scores.total / scores.count as f64,
                }
            })
            .collect();
        edges.sort_by(|x, y| (x.from, x.to).cmp(&(y.from, y.to)));

        info!(
            "Built graph for workspace {}: {} nodes, {} edges ({} chunks scanned)",
            workspace_id,
            nodes.len(),
            edges.len(),
            chunks.len()
        );

        Ok(KnowledgeGraph { nodes, edges })
    }
}
