use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::types::{HistoryNode, LayoutPoint, RecommendationNode};

pub type NodeId = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    History,
    Current,
    Recommendation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Consecutive history entries, painted as arrows.
    Path,
    /// Current node to a recommendation, painted as a plain line.
    Recommendation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

// Visual attributes per role
const HISTORY_SIZE: f32 = 7.0;
const CURRENT_SIZE: f32 = 12.0;
const RECOMMENDATION_SIZE: f32 = 5.0;
const HISTORY_COLOR: Rgba = Rgba(99, 132, 200, 255);
const CURRENT_COLOR: Rgba = Rgba(255, 190, 60, 255);
const RECOMMENDATION_COLOR: Rgba = Rgba(20, 184, 166, 255);
const PATH_EDGE_COLOR: Rgba = Rgba(209, 213, 219, 255);
const RECOMMENDATION_EDGE_COLOR: Rgba = Rgba(20, 184, 166, 110);

impl NodeRole {
    pub fn size(self) -> f32 {
        match self {
            NodeRole::History => HISTORY_SIZE,
            NodeRole::Current => CURRENT_SIZE,
            NodeRole::Recommendation => RECOMMENDATION_SIZE,
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            NodeRole::History => HISTORY_COLOR,
            NodeRole::Current => CURRENT_COLOR,
            NodeRole::Recommendation => RECOMMENDATION_COLOR,
        }
    }

    // Only the current node keeps its label on regardless of zoom.
    pub fn always_labelled(self) -> bool {
        matches!(self, NodeRole::Current)
    }
}

impl EdgeKind {
    pub fn color(self) -> Rgba {
        match self {
            EdgeKind::Path => PATH_EDGE_COLOR,
            EdgeKind::Recommendation => RECOMMENDATION_EDGE_COLOR,
        }
    }

    pub fn width(self) -> f32 {
        match self {
            EdgeKind::Path => 2.0,
            EdgeKind::Recommendation => 1.0,
        }
    }

    pub fn is_arrow(self) -> bool {
        matches!(self, EdgeKind::Path)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub role: NodeRole,
    pub x: f64,
    pub y: f64,
    pub size: f32,
    pub color: Rgba,
    pub show_label: bool,
    pub title: Option<String>,
}

impl GraphNode {
    fn from_point(point: &LayoutPoint, role: NodeRole) -> Self {
        GraphNode {
            id: point.node_id.clone(),
            role,
            x: point.x,
            y: point.y,
            size: role.size(),
            color: role.color(),
            show_label: role.always_labelled(),
            title: point.title.clone(),
        }
    }

    fn set_role(&mut self, role: NodeRole) {
        self.role = role;
        self.size = role.size();
        self.color = role.color();
        self.show_label = role.always_labelled();
    }

    /// Title to show on hover; empty titles count as absent.
    pub fn hover_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub key: String,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub kind: EdgeKind,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 { self.max_x - self.min_x }
    pub fn height(&self) -> f64 { self.max_y - self.min_y }
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }
}

/// Directed node/edge structure handed to a renderer. Node insertion order is
/// kept so painting and iteration are deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    index: HashMap<NodeId, usize>,
    edges: Vec<GraphEdge>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one with the same id exists; first insertion wins.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    // Add an edge if both ends exist; returns the edge position
    pub fn add_edge(&mut self, key: String, from_node: &str, to_node: &str, kind: EdgeKind) -> Option<usize> {
        if self.contains(from_node) && self.contains(to_node) {
            self.edges.push(GraphEdge {
                key,
                from_node: from_node.to_string(),
                to_node: to_node.to_string(),
                kind,
            });
            Some(self.edges.len() - 1)
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool { self.index.contains_key(id) }
    pub fn get_node(&self, id: &str) -> Option<&GraphNode> { self.index.get(id).map(|&i| &self.nodes[i]) }
    pub fn nodes(&self) -> &[GraphNode] { &self.nodes }
    pub fn edges(&self) -> &[GraphEdge] { &self.edges }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn current(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.role == NodeRole::Current)
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.nodes.first()?;
        let init = Bounds { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
        Some(self.nodes.iter().fold(init, |b, n| Bounds {
            min_x: b.min_x.min(n.x),
            min_y: b.min_y.min(n.y),
            max_x: b.max_x.max(n.x),
            max_y: b.max_y.max(n.y),
        }))
    }
}

/// Build the render model from a history path and a recommendation set.
///
/// History nodes go in first so they win id collisions. The node matching
/// the last history entry becomes `Current`; path edges join consecutive
/// history ids in order, and recommendation edges run from the current node
/// to every recommendation node that survived deduplication. Coordinates are
/// taken verbatim.
pub fn build_graph_model(history: &[HistoryNode], recommendations: &[RecommendationNode]) -> GraphModel {
    let mut model = GraphModel::new();

    for point in history {
        model.add_node(GraphNode::from_point(point, NodeRole::History));
    }
    // A repeated id keeps its first position, so promote by id rather than
    // by the last inserted slot.
    let current_id = history.last().map(|p| p.node_id.clone());
    if let Some(id) = &current_id
        && let Some(&i) = model.index.get(id)
    {
        model.nodes[i].set_role(NodeRole::Current);
    }

    for point in recommendations {
        model.add_node(GraphNode::from_point(point, NodeRole::Recommendation));
    }

    for (i, pair) in history.windows(2).enumerate() {
        let (from, to) = (&pair[0].node_id, &pair[1].node_id);
        if from == to {
            continue;
        }
        model.add_edge(format!("path_{}", i), from, to, EdgeKind::Path);
    }

    if let Some(current) = current_id {
        let targets: Vec<NodeId> = model
            .nodes_with_role(NodeRole::Recommendation)
            .map(|n| n.id.clone())
            .collect();
        for target in targets {
            model.add_edge(format!("rec_{}", target), &current, &target, EdgeKind::Recommendation);
        }
    }

    model
}
